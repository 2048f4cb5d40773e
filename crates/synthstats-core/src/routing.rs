use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapters::{CoinMarketCapAdapter, FixtureAdapter, RpcAdapter, SubgraphAdapter};
use crate::data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthState, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError,
};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::query::QueryFailure;
use crate::{
    EnvelopeError, HolderBalance, MarketQuote, NetworkConfig, NetworkTotals, PricePoint,
    ProviderId,
};

/// Source selection strategy for routing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceStrategy {
    #[default]
    Auto,
    Priority(Vec<ProviderId>),
    Strict(ProviderId),
}

impl SourceStrategy {
    fn is_strict(&self) -> bool {
        matches!(self, Self::Strict(_))
    }
}

/// Successful routed call.
#[derive(Debug, Clone)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_source: ProviderId,
    pub source_chain: Vec<ProviderId>,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
}

/// Failed routed call after exhausting candidates.
#[derive(Debug, Clone)]
pub struct RouteFailure {
    pub source_chain: Vec<ProviderId>,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
}

impl From<RouteFailure> for QueryFailure {
    /// The last candidate's error is the one reported for the slot.
    fn from(failure: RouteFailure) -> Self {
        match failure.errors.last() {
            Some(error) => QueryFailure::new(error.code.clone(), error.message.clone()),
            None => QueryFailure::new("source.no_candidate", "no source produced a value"),
        }
    }
}

pub type RouteResult<T> = Result<RouteSuccess<T>, RouteFailure>;

/// Source snapshot used by the `sources` CLI command.
#[derive(Debug, Clone, Copy)]
pub struct SourceSnapshot {
    pub id: ProviderId,
    pub capabilities: CapabilitySet,
    pub health: HealthStatus,
}

impl SourceSnapshot {
    pub fn available(self) -> bool {
        self.health.state != HealthState::Unhealthy
    }

    pub fn status_label(self) -> &'static str {
        if !self.health.rate_available {
            return "rate_limited";
        }

        match self.health.state {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// Adapter registry and routing engine.
pub struct SourceRouter {
    adapters: HashMap<ProviderId, Arc<dyn DataSource>>,
}

type InvokeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new(vec![Arc::new(FixtureAdapter::default())])
    }
}

/// Builder for a [`SourceRouter`] wired from a [`NetworkConfig`].
///
/// Live adapters are registered for each upstream the config names:
///
/// | Adapter | Registered when |
/// |---------|-----------------|
/// | JSON-RPC | `rpc_url` is set |
/// | Subgraph | `subgraph_url` is set |
/// | CoinMarketCap | `cmc_api_key` is set |
///
/// With none of them configured, or in mock mode, the router serves
/// fixture data only.
///
/// # Example
///
/// ```rust,ignore
/// use synthstats_core::{NetworkConfig, SourceRouterBuilder};
///
/// let router = SourceRouterBuilder::new()
///     .with_config(NetworkConfig::load(None)?)
///     .build();
///
/// let offline = SourceRouterBuilder::new().with_mock_mode().build();
/// ```
#[derive(Default)]
pub struct SourceRouterBuilder {
    use_mock: bool,
    config: NetworkConfig,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl SourceRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve fixture data only; no network traffic.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the transport shared by all live adapters.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn build(self) -> SourceRouter {
        if self.use_mock {
            return SourceRouter::default();
        }

        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let config = Arc::new(self.config);
        let mut adapters: Vec<Arc<dyn DataSource>> = Vec::new();

        if let Some(rpc_url) = &config.rpc_url {
            adapters.push(Arc::new(RpcAdapter::new(
                Arc::clone(&http_client),
                rpc_url.clone(),
                Arc::clone(&config),
            )));
        }

        if let Some(adapter) = SubgraphAdapter::from_config(Arc::clone(&http_client), &config) {
            adapters.push(Arc::new(adapter));
        }

        if let Some(adapter) = CoinMarketCapAdapter::from_config(Arc::clone(&http_client), &config)
        {
            adapters.push(Arc::new(adapter));
        }

        if adapters.is_empty() {
            warn!("no live upstream configured; serving fixture data");
            SourceRouter::default()
        } else {
            SourceRouter::new(adapters)
        }
    }
}

impl SourceRouter {
    pub fn new(adapters: Vec<Arc<dyn DataSource>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self { adapters }
    }

    /// Whether every registered adapter is the fixture source.
    pub fn is_fixture_only(&self) -> bool {
        self.adapters.keys().all(|id| *id == ProviderId::Fixture)
    }

    pub fn registered_sources(&self) -> Vec<ProviderId> {
        self.sorted_registered_sources()
    }

    pub async fn source_chain_for_strategy(
        &self,
        endpoint: Endpoint,
        strategy: &SourceStrategy,
    ) -> Vec<ProviderId> {
        let mut chain = self.plan_sources(endpoint, strategy).await;
        if chain.is_empty() {
            chain = self.sorted_registered_sources();
        }
        chain
    }

    pub async fn snapshot(&self, provider: ProviderId) -> Option<SourceSnapshot> {
        let adapter = self.adapters.get(&provider)?;
        Some(SourceSnapshot {
            id: provider,
            capabilities: adapter.capabilities(),
            health: adapter.health().await,
        })
    }

    pub async fn route_contract_read(
        &self,
        call: &ContractCall,
        strategy: SourceStrategy,
    ) -> RouteResult<f64> {
        let call = call.clone();
        self.route_endpoint(Endpoint::ContractRead, strategy, move |source| {
            source.contract_read(call.clone())
        })
        .await
    }

    pub async fn route_token_balance(
        &self,
        req: &BalanceRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<f64> {
        let req = req.clone();
        self.route_endpoint(Endpoint::TokenBalance, strategy, move |source| {
            source.token_balance(req.clone())
        })
        .await
    }

    pub async fn route_market_quote(
        &self,
        req: &QuoteRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<MarketQuote> {
        let req = req.clone();
        self.route_endpoint(Endpoint::MarketQuote, strategy, move |source| {
            source.market_quote(req.clone())
        })
        .await
    }

    pub async fn route_price_series(
        &self,
        req: &PriceSeriesRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<Vec<PricePoint>> {
        let req = req.clone();
        self.route_endpoint(Endpoint::PriceSeries, strategy, move |source| {
            source.price_series(req.clone())
        })
        .await
    }

    pub async fn route_holders(
        &self,
        req: &HoldersRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<Vec<HolderBalance>> {
        let req = req.clone();
        self.route_endpoint(Endpoint::Holders, strategy, move |source| {
            source.holders(req.clone())
        })
        .await
    }

    pub async fn route_network_totals(
        &self,
        strategy: SourceStrategy,
    ) -> RouteResult<NetworkTotals> {
        self.route_endpoint(Endpoint::NetworkTotals, strategy, |source| {
            source.network_totals()
        })
        .await
    }

    async fn route_endpoint<T, F>(
        &self,
        endpoint: Endpoint,
        strategy: SourceStrategy,
        mut invoke: F,
    ) -> RouteResult<T>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> InvokeFuture<'a, T>,
    {
        let started = Instant::now();
        let planned_chain = self.plan_sources(endpoint, &strategy).await;
        let mut source_chain = Vec::with_capacity(planned_chain.len());
        let mut errors = Vec::new();

        for provider in planned_chain {
            source_chain.push(provider);
            let Some(adapter) = self.adapters.get(&provider) else {
                errors.push(EnvelopeError::from_source(
                    &SourceError::adapter_not_registered(provider),
                    Some(provider),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            };

            if !adapter.capabilities().supports(endpoint) {
                errors.push(EnvelopeError::from_source(
                    &SourceError::unsupported_endpoint(endpoint),
                    Some(provider),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            }

            let health = adapter.health().await;
            if health.state == HealthState::Unhealthy {
                errors.push(EnvelopeError::from_source(
                    &SourceError::unavailable("source health check reported unhealthy"),
                    Some(provider),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            }

            if !health.rate_available {
                errors.push(EnvelopeError::from_source(
                    &SourceError::rate_limited("source has no rate budget available"),
                    Some(provider),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            }

            match invoke(adapter.as_ref()).await {
                Ok(data) => {
                    let mut warnings = Vec::new();
                    if !errors.is_empty() {
                        warnings.push(format!(
                            "source fallback succeeded with '{}' after {} failed attempt(s)",
                            provider.as_str(),
                            errors.len()
                        ));
                    }

                    debug!(%endpoint, source = %provider, "routed call succeeded");
                    return Ok(RouteSuccess {
                        data,
                        selected_source: provider,
                        source_chain,
                        warnings,
                        errors,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    warn!(%endpoint, source = %provider, error = %error, "source call failed");
                    errors.push(EnvelopeError::from_source(&error, Some(provider)));
                    if strategy.is_strict() {
                        break;
                    }
                }
            }
        }

        if source_chain.is_empty() {
            source_chain = self.sorted_registered_sources();
        }

        if errors.is_empty() {
            errors.push(
                EnvelopeError::new(
                    "source.no_candidate",
                    format!("no source candidates available for endpoint '{endpoint}'"),
                )
                .with_retryable(false),
            );
        }

        Err(RouteFailure {
            source_chain,
            warnings: vec![format!("all sources failed for endpoint '{endpoint}'")],
            errors,
            latency_ms: elapsed_ms(started),
        })
    }

    async fn plan_sources(&self, endpoint: Endpoint, strategy: &SourceStrategy) -> Vec<ProviderId> {
        match strategy {
            SourceStrategy::Auto => self.auto_chain(endpoint).await,
            SourceStrategy::Priority(priority) => dedupe_chain(priority),
            SourceStrategy::Strict(provider) => vec![*provider],
        }
    }

    async fn auto_chain(&self, endpoint: Endpoint) -> Vec<ProviderId> {
        let mut scored = Vec::with_capacity(self.adapters.len());
        for (provider, source) in &self.adapters {
            if !source.capabilities().supports(endpoint) {
                continue;
            }

            let health = source.health().await;
            let health_score = match health.state {
                HealthState::Healthy => 250,
                HealthState::Degraded => 100,
                HealthState::Unhealthy => 0,
            };
            let rate_score = if health.rate_available { 150 } else { 0 };
            let total_score = 1_000 + health_score + rate_score + i32::from(health.score);

            scored.push((*provider, total_score));
        }

        scored.sort_by(|left, right| {
            right
                .1
                .cmp(&left.1)
                .then_with(|| left.0.as_str().cmp(right.0.as_str()))
        });

        scored.into_iter().map(|(provider, _)| provider).collect()
    }

    fn sorted_registered_sources(&self) -> Vec<ProviderId> {
        let mut providers = self.adapters.keys().copied().collect::<Vec<_>>();
        providers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        providers
    }
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(chain.len());

    for provider in chain {
        if seen.insert(*provider) {
            output.push(*provider);
        }
    }

    output
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
