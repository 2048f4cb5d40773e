use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthState, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError, SourceFuture, TokenRef,
};
use crate::{
    Address, HolderBalance, MarketQuote, NetworkTotals, PricePoint, ProviderId, UtcDateTime,
    ValidationError,
};

/// Deterministic offline source serving every endpoint.
///
/// Backs `--mock` runs, demos and tests. Figures are fixed so derived
/// metrics can be asserted exactly.
#[derive(Clone)]
pub struct FixtureAdapter {
    health_state: HealthState,
    rate_available: bool,
    score: u16,
    latency: Duration,
    failing: Arc<HashSet<Endpoint>>,
}

impl Default for FixtureAdapter {
    fn default() -> Self {
        Self {
            health_state: HealthState::Healthy,
            rate_available: true,
            score: 10,
            latency: Duration::ZERO,
            failing: Arc::new(HashSet::new()),
        }
    }
}

pub const FIXTURE_SNX_PRICE: f64 = 3.25;
pub const FIXTURE_SNX_VOLUME_24H: f64 = 45_000_000.0;
pub const FIXTURE_SUSD_PRICE: f64 = 0.998;
pub const FIXTURE_SNX_TOTAL_SUPPLY: f64 = 215_000_000.0;
pub const FIXTURE_ISSUANCE_RATIO: f64 = 0.125;
pub const FIXTURE_TOTAL_ISSUED_SYNTHS: f64 = 180_000_000.0;
pub const FIXTURE_SUSD_TOTAL_SUPPLY: f64 = 95_000_000.0;
pub const FIXTURE_SNX_HOLDERS: u64 = 68_000;
pub const FIXTURE_PERCENT_LOCKED: f64 = 0.82;
pub const FIXTURE_ACTIVE_C_RATIO: f64 = 5.1;

impl FixtureAdapter {
    pub fn with_health(health_state: HealthState, rate_available: bool) -> Self {
        Self {
            health_state,
            rate_available,
            ..Self::default()
        }
    }

    /// Delays every response, to exercise incremental rendering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the listed endpoints fail with an unavailable error.
    pub fn failing(mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        self.failing = Arc::new(endpoints.into_iter().collect());
        self
    }

    async fn simulate(&self, endpoint: Endpoint) -> Result<(), SourceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&endpoint) {
            return Err(SourceError::unavailable(format!(
                "fixture endpoint '{endpoint}' is configured to fail"
            )));
        }
        Ok(())
    }
}

impl DataSource for FixtureAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Fixture
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn contract_read<'a>(&'a self, call: ContractCall) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            self.simulate(Endpoint::ContractRead).await?;
            match (call.contract.as_str(), call.method.as_str()) {
                ("Synthetix", "totalSupply") => Ok(FIXTURE_SNX_TOTAL_SUPPLY),
                ("Synthetix", "totalIssuedSynths") => Ok(FIXTURE_TOTAL_ISSUED_SYNTHS),
                ("SystemSettings", "issuanceRatio") => Ok(FIXTURE_ISSUANCE_RATIO),
                ("SynthsUSD", "totalSupply") => Ok(FIXTURE_SUSD_TOTAL_SUPPLY),
                _ => Err(SourceError::invalid_request(format!(
                    "fixture has no value for '{call}'"
                ))),
            }
        })
    }

    fn token_balance<'a>(&'a self, req: BalanceRequest) -> SourceFuture<'a, f64> {
        Box::pin(async move {
            self.simulate(Endpoint::TokenBalance).await?;
            let balance = match (&req.token, req.holder.as_str()) {
                (TokenRef::Native, "EtherCollateralsUSD") => 1_250.5,
                (TokenRef::Native, "EtherCollateral") => 3_400.25,
                (TokenRef::Native, "CollateralEth") => 12_800.0,
                (TokenRef::Contract(token), "CollateralErc20") if token == "renBTC" => 42.125,
                (TokenRef::Contract(token), "CollateralShort") if token == "SynthsUSD" => {
                    8_500_000.0
                }
                _ => {
                    return Err(SourceError::invalid_request(format!(
                        "fixture has no balance of '{}' for '{}'",
                        req.token, req.holder
                    )))
                }
            };
            Ok(balance)
        })
    }

    fn market_quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, MarketQuote> {
        Box::pin(async move {
            self.simulate(Endpoint::MarketQuote).await?;
            let (price, volume) = match req.symbol.as_str() {
                "SNX" => (FIXTURE_SNX_PRICE, Some(FIXTURE_SNX_VOLUME_24H)),
                "sUSD" => (FIXTURE_SUSD_PRICE, Some(12_000_000.0)),
                other => {
                    return Err(SourceError::invalid_request(format!(
                        "fixture has no quote for '{other}'"
                    )))
                }
            };
            MarketQuote::new(req.symbol, price, volume, UtcDateTime::now())
                .map_err(validation_to_error)
        })
    }

    fn price_series<'a>(&'a self, req: PriceSeriesRequest) -> SourceFuture<'a, Vec<PricePoint>> {
        Box::pin(async move {
            self.simulate(Endpoint::PriceSeries).await?;

            let count = req.period.sample_count();
            let step = req.granularity.step();
            let now = UtcDateTime::now();
            let mut points = Vec::with_capacity(count);

            for index in 0..count {
                let steps_back = count.saturating_sub(index + 1) as u32;
                let timestamp = now.before(step * steps_back).map_err(validation_to_error)?;
                let point = PricePoint::new(timestamp, fixture_price(index, count))
                    .map_err(validation_to_error)?;
                points.push(point);
            }

            Ok(points)
        })
    }

    fn holders<'a>(&'a self, req: HoldersRequest) -> SourceFuture<'a, Vec<HolderBalance>> {
        Box::pin(async move {
            self.simulate(Endpoint::Holders).await?;
            (0..req.max)
                .map(|rank| {
                    let address =
                        Address::parse(&format!("0x{:040x}", 0xa11ce_u64 + rank as u64))?;
                    HolderBalance::new(address, 9_000_000.0 / (rank as f64 + 1.0))
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(validation_to_error)
        })
    }

    fn network_totals<'a>(&'a self) -> SourceFuture<'a, NetworkTotals> {
        Box::pin(async move {
            self.simulate(Endpoint::NetworkTotals).await?;
            NetworkTotals::new(
                FIXTURE_SNX_HOLDERS,
                FIXTURE_PERCENT_LOCKED,
                FIXTURE_ACTIVE_C_RATIO,
            )
            .map_err(validation_to_error)
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            HealthStatus::new(self.health_state, self.rate_available, self.score)
        })
    }
}

/// Gentle upward drift with a deterministic ripple, starting at 3.00.
fn fixture_price(index: usize, count: usize) -> f64 {
    let drift = 0.25 * index as f64 / count.max(1) as f64;
    let ripple = ((index * 37) % 11) as f64 / 100.0;
    3.0 + drift + ripple
}

fn validation_to_error(error: ValidationError) -> SourceError {
    SourceError::internal(error.to_string())
}
