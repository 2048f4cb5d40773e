//! Provider adapters.
//!
//! | Adapter | Endpoints | Upstream |
//! |---------|-----------|----------|
//! | [`FixtureAdapter`] | all | none (deterministic) |
//! | [`RpcAdapter`] | contract read, token balance | Ethereum JSON-RPC |
//! | [`SubgraphAdapter`] | price series, holders, network totals | GraphQL |
//! | [`CoinMarketCapAdapter`] | market quote | CoinMarketCap REST |

mod coinmarketcap;
mod fixture;
mod rpc;
mod subgraph;

pub use coinmarketcap::CoinMarketCapAdapter;
pub use fixture::{
    FixtureAdapter, FIXTURE_ACTIVE_C_RATIO, FIXTURE_ISSUANCE_RATIO, FIXTURE_PERCENT_LOCKED,
    FIXTURE_SNX_HOLDERS, FIXTURE_SNX_PRICE, FIXTURE_SNX_TOTAL_SUPPLY, FIXTURE_SNX_VOLUME_24H,
    FIXTURE_SUSD_PRICE, FIXTURE_SUSD_TOTAL_SUPPLY, FIXTURE_TOTAL_ISSUED_SYNTHS,
};
pub use rpc::RpcAdapter;
pub use subgraph::SubgraphAdapter;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::debug;

use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest};

/// Sends a request and returns the body of a 2xx response.
///
/// Transport failures and non-success statuses become [`SourceError`]s
/// prefixed with the provider name.
pub(crate) async fn execute(
    http_client: &dyn HttpClient,
    provider: &str,
    request: HttpRequest,
) -> Result<String, SourceError> {
    debug!(provider, url = %request.url, "sending upstream request");

    let response = http_client.execute(request).await.map_err(|error| {
        if error.retryable() {
            SourceError::unavailable(format!("{provider} transport error: {}", error.message()))
        } else {
            SourceError::internal(format!("{provider} transport error: {}", error.message()))
        }
    })?;

    match response.status {
        _ if response.is_success() => Ok(response.body),
        429 => Err(SourceError::rate_limited(format!(
            "{provider} upstream returned status 429"
        ))),
        401 | 403 => Err(SourceError::invalid_request(format!(
            "{provider} upstream rejected credentials (status {})",
            response.status
        ))),
        status => Err(SourceError::unavailable(format!(
            "{provider} upstream returned status {status}"
        ))),
    }
}

/// Accepts a JSON number or a decimal string, as subgraphs and price APIs
/// encode large values as strings.
pub(crate) fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("'{text}' is not a decimal number"))),
    }
}
