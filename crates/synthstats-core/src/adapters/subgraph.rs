use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::adapters::{execute, number_or_string};
use crate::data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    Address, HolderBalance, MarketQuote, NetworkConfig, NetworkTotals, PricePoint, ProviderId,
    UtcDateTime, ValidationError,
};

const HOLDERS_QUERY: &str = "query Holders($synth: String!, $max: Int!) { \
    synthHolders(first: $max, orderBy: balanceOf, orderDirection: desc, where: { synth: $synth }) \
    { address balanceOf } }";

const TOTALS_QUERY: &str = "query Totals { \
    total(id: \"mainnet\") { snxHolders percentLocked activeCRatio } }";

const RATES_QUERY: &str = "query Rates($synth: String!, $after: Int!, $first: Int!) { \
    rateUpdates(first: $first, orderBy: timestamp, orderDirection: asc, \
    where: { synth: $synth, timestamp_gt: $after }) { timestamp rate } }";

/// Largest page the hosted subgraph serves.
const RATE_PAGE_SIZE: usize = 1_000;

/// Stop paging after this many requests; a year of updates fits well within it.
const MAX_RATE_PAGES: usize = 100;

/// GraphQL source for holders, network totals and historical rates.
#[derive(Clone)]
pub struct SubgraphAdapter {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout_ms: u64,
    rate_page_size: usize,
}

#[derive(Debug, Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoldersData {
    synth_holders: Vec<RawHolder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHolder {
    address: String,
    #[serde(deserialize_with = "number_or_string")]
    balance_of: f64,
}

#[derive(Debug, Deserialize)]
struct TotalsData {
    total: Option<RawTotals>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTotals {
    #[serde(deserialize_with = "number_or_string")]
    snx_holders: f64,
    #[serde(deserialize_with = "number_or_string")]
    percent_locked: f64,
    #[serde(rename = "activeCRatio", deserialize_with = "number_or_string")]
    active_c_ratio: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatesData {
    rate_updates: Vec<RawRate>,
}

#[derive(Debug, Deserialize)]
struct RawRate {
    #[serde(deserialize_with = "number_or_string")]
    timestamp: f64,
    #[serde(deserialize_with = "number_or_string")]
    rate: f64,
}

impl SubgraphAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
            rate_page_size: RATE_PAGE_SIZE,
        }
    }

    pub fn with_rate_page_size(mut self, page_size: usize) -> Self {
        self.rate_page_size = page_size.max(1);
        self
    }

    /// Builds the adapter from a config with a subgraph URL set.
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &NetworkConfig) -> Option<Self> {
        config.subgraph_url.as_ref().map(|url| Self {
            timeout_ms: config.timeout_ms,
            ..Self::new(http_client, url.clone())
        })
    }

    /// Rate updates newer than `since`, oldest first, following the
    /// timestamp cursor until a short page comes back.
    async fn rate_updates(&self, synth: &str, since: i64) -> Result<Vec<RawRate>, SourceError> {
        let mut updates: Vec<RawRate> = Vec::new();
        let mut after = since - 1;

        for _ in 0..MAX_RATE_PAGES {
            let page: RatesData = self
                .query(
                    RATES_QUERY,
                    json!({ "synth": synth, "after": after, "first": self.rate_page_size }),
                )
                .await?;
            let full = page.rate_updates.len() >= self.rate_page_size;
            let cursor = page.rate_updates.last().map(|rate| rate.timestamp as i64);
            updates.extend(page.rate_updates);

            match cursor {
                Some(cursor) if full && cursor > after => after = cursor,
                _ => return Ok(updates),
            }
        }

        warn!(synth, pages = MAX_RATE_PAGES, "rate history truncated at page limit");
        Ok(updates)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, SourceError> {
        let body = json!({ "query": query, "variables": variables });
        let request =
            HttpRequest::post_json(&self.endpoint, &body).with_timeout_ms(self.timeout_ms);

        let raw = execute(self.http_client.as_ref(), "subgraph", request).await?;
        let response: GraphResponse<T> = serde_json::from_str(&raw).map_err(|error| {
            SourceError::malformed_response(format!("subgraph response did not parse: {error}"))
        })?;

        if let Some(first) = response.errors.first() {
            return Err(SourceError::unavailable(format!(
                "subgraph query failed: {}",
                first.message
            )));
        }

        response
            .data
            .ok_or_else(|| SourceError::malformed_response("subgraph response has no data"))
    }
}

impl DataSource for SubgraphAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Subgraph
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none()
            .with(Endpoint::PriceSeries)
            .with(Endpoint::Holders)
            .with(Endpoint::NetworkTotals)
    }

    fn contract_read<'a>(&'a self, call: ContractCall) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            let _ = call;
            Err(SourceError::unsupported_endpoint(Endpoint::ContractRead))
        })
    }

    fn token_balance<'a>(&'a self, req: BalanceRequest) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::TokenBalance))
        })
    }

    fn market_quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, MarketQuote> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::MarketQuote))
        })
    }

    fn price_series<'a>(&'a self, req: PriceSeriesRequest) -> SourceFuture<'a, Vec<PricePoint>> {
        Box::pin(async move {
            let since = UtcDateTime::now()
                .before(req.period.window())
                .map_err(validation_to_error)?;

            let updates = self
                .rate_updates(req.symbol.as_str(), since.unix_seconds())
                .await?;

            let step = req.granularity.step().as_secs() as i64;
            let raw = updates
                .into_iter()
                .map(|rate| (rate.timestamp as i64, rate.rate))
                .collect::<Vec<_>>();

            bucket_last(&raw, step)
                .into_iter()
                .map(|(seconds, value)| {
                    PricePoint::new(UtcDateTime::from_unix_seconds(seconds)?, value)
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(validation_to_error)
        })
    }

    fn holders<'a>(&'a self, req: HoldersRequest) -> SourceFuture<'a, Vec<HolderBalance>> {
        Box::pin(async move {
            let data: HoldersData = self
                .query(
                    HOLDERS_QUERY,
                    json!({ "synth": req.synth.as_str(), "max": req.max }),
                )
                .await?;

            data.synth_holders
                .into_iter()
                .take(req.max)
                .map(|raw| HolderBalance::new(Address::parse(&raw.address)?, raw.balance_of))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| SourceError::malformed_response(error.to_string()))
        })
    }

    fn network_totals<'a>(&'a self) -> SourceFuture<'a, NetworkTotals> {
        Box::pin(async move {
            let data: TotalsData = self.query(TOTALS_QUERY, json!({})).await?;
            let totals = data
                .total
                .ok_or_else(|| SourceError::malformed_response("subgraph has no network totals"))?;

            NetworkTotals::new(
                totals.snx_holders.max(0.0) as u64,
                totals.percent_locked,
                totals.active_c_ratio,
            )
            .map_err(|error| SourceError::malformed_response(error.to_string()))
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy(80) })
    }
}

/// Keeps the last sample of each `step`-second bucket, in time order.
///
/// Buckets are aligned to the unix epoch and each kept point is stamped with
/// its bucket start.
fn bucket_last(samples: &[(i64, f64)], step: i64) -> Vec<(i64, f64)> {
    let step = step.max(1);
    let mut buckets: Vec<(i64, f64)> = Vec::new();

    for &(seconds, value) in samples {
        let start = seconds - seconds.rem_euclid(step);
        match buckets.last_mut() {
            Some(last) if last.0 == start => last.1 = value,
            _ => buckets.push((start, value)),
        }
    }

    buckets
}

fn validation_to_error(error: ValidationError) -> SourceError {
    SourceError::internal(error.to_string())
}
