use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{execute, number_or_string};
use crate::data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthState, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::{RateBudget, RatePolicy};
use crate::{
    AssetSymbol, HolderBalance, MarketQuote, NetworkConfig, NetworkTotals, PricePoint, ProviderId,
    UtcDateTime,
};

/// CoinMarketCap quotes for SNX and sUSD.
#[derive(Clone)]
pub struct CoinMarketCapAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
    budget: RateBudget,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, QuoteEntry>,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    quote: HashMap<String, UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    #[serde(deserialize_with = "number_or_string")]
    price: f64,
    volume_24h: Option<f64>,
    last_updated: Option<String>,
}

impl CoinMarketCapAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
            budget: RateBudget::new(RatePolicy::coinmarketcap_basic()),
        }
    }

    /// Builds the adapter from a config with an API key set.
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &NetworkConfig) -> Option<Self> {
        config.cmc_api_key.as_ref().map(|key| Self {
            timeout_ms: config.timeout_ms,
            ..Self::new(http_client, key.clone(), config.cmc_base_url.clone())
        })
    }

    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.budget = RateBudget::new(policy);
        self
    }

    fn quote_url(&self, symbol: &AssetSymbol) -> String {
        format!(
            "{}/v1/cryptocurrency/quotes/latest?symbol={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&symbol.ticker())
        )
    }
}

impl DataSource for CoinMarketCapAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Cmc
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none().with(Endpoint::MarketQuote)
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
            if !self.budget.try_acquire() {
                return Err(SourceError::rate_limited(
                    "coinmarketcap request budget is spent for this window",
                ));
            }

            let request = HttpRequest::get(self.quote_url(&req.symbol))
                .with_header("X-CMC_PRO_API_KEY", self.api_key.as_str())
                .with_header("accept", "application/json")
                .with_timeout_ms(self.timeout_ms);

            let raw = execute(self.http_client.as_ref(), "coinmarketcap", request).await?;
            let response: QuotesResponse = serde_json::from_str(&raw).map_err(|error| {
                SourceError::malformed_response(format!(
                    "coinmarketcap response did not parse: {error}"
                ))
            })?;

            // Keys come back upper-cased ("SUSD" for sUSD).
            let entry = response
                .data
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(req.symbol.as_str()))
                .map(|(_, entry)| entry)
                .ok_or_else(|| {
                    SourceError::malformed_response(format!(
                        "coinmarketcap returned no data for '{}'",
                        req.symbol
                    ))
                })?;
            let usd = entry.quote.get("USD").ok_or_else(|| {
                SourceError::malformed_response("coinmarketcap quote has no USD conversion")
            })?;

            let as_of = usd
                .last_updated
                .as_deref()
                .and_then(|raw| UtcDateTime::parse(raw).ok())
                .unwrap_or_else(UtcDateTime::now);

            MarketQuote::new(req.symbol, usd.price, usd.volume_24h, as_of)
                .map_err(|error| SourceError::malformed_response(error.to_string()))
        })
    }

    fn price_series<'a>(&'a self, req: PriceSeriesRequest) -> SourceFuture<'a, Vec<PricePoint>> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::PriceSeries))
        })
    }

    fn holders<'a>(&'a self, req: HoldersRequest) -> SourceFuture<'a, Vec<HolderBalance>> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported_endpoint(Endpoint::Holders))
        })
    }

    fn network_totals<'a>(&'a self) -> SourceFuture<'a, NetworkTotals> {
        Box::pin(async move { Err(SourceError::unsupported_endpoint(Endpoint::NetworkTotals)) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            let rate_available = self.budget.available();
            let state = if rate_available {
                HealthState::Healthy
            } else {
                HealthState::Degraded
            };
            HealthStatus::new(state, rate_available, 85)
        })
    }
}
