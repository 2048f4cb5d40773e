//! Data source trait and request/response types.
//!
//! This module defines the adapter contract (`DataSource`) that every
//! provider implementation follows, along with the request types for each
//! endpoint.
//!
//! # Endpoints
//!
//! | Endpoint | Request | Response | Description |
//! |----------|---------|----------|-------------|
//! | Contract read | [`ContractCall`] | `f64` | View call with an optional key, scaled by 1e18 |
//! | Token balance | [`BalanceRequest`] | `f64` | Token or ETH balance held by a contract |
//! | Market quote | [`QuoteRequest`] | [`MarketQuote`] | Price and 24h volume |
//! | Price series | [`PriceSeriesRequest`] | `Vec<PricePoint>` | Chart samples, oldest first |
//! | Holders | [`HoldersRequest`] | `Vec<HolderBalance>` | Largest holders of a synth |
//! | Network totals | - | [`NetworkTotals`] | Holder count and staking aggregates |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{
    AssetSymbol, ChartPeriod, Granularity, HolderBalance, MarketQuote, NetworkTotals, PricePoint,
    ProviderId,
};

/// Boxed future returned by every adapter endpoint.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    ContractRead,
    TokenBalance,
    MarketQuote,
    PriceSeries,
    Holders,
    NetworkTotals,
}

impl Endpoint {
    pub const ALL: [Self; 6] = [
        Self::ContractRead,
        Self::TokenBalance,
        Self::MarketQuote,
        Self::PriceSeries,
        Self::Holders,
        Self::NetworkTotals,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContractRead => "contract_read",
            Self::TokenBalance => "token_balance",
            Self::MarketQuote => "market_quote",
            Self::PriceSeries => "price_series",
            Self::Holders => "holders",
            Self::NetworkTotals => "network_totals",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub contract_read: bool,
    pub token_balance: bool,
    pub market_quote: bool,
    pub price_series: bool,
    pub holders: bool,
    pub network_totals: bool,
}

impl CapabilitySet {
    pub const fn full() -> Self {
        Self {
            contract_read: true,
            token_balance: true,
            market_quote: true,
            price_series: true,
            holders: true,
            network_totals: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            contract_read: false,
            token_balance: false,
            market_quote: false,
            price_series: false,
            holders: false,
            network_totals: false,
        }
    }

    pub const fn with(mut self, endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::ContractRead => self.contract_read = true,
            Endpoint::TokenBalance => self.token_balance = true,
            Endpoint::MarketQuote => self.market_quote = true,
            Endpoint::PriceSeries => self.price_series = true,
            Endpoint::Holders => self.holders = true,
            Endpoint::NetworkTotals => self.network_totals = true,
        }
        self
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::ContractRead => self.contract_read,
            Endpoint::TokenBalance => self.token_balance,
            Endpoint::MarketQuote => self.market_quote,
            Endpoint::PriceSeries => self.price_series,
            Endpoint::Holders => self.holders,
            Endpoint::NetworkTotals => self.network_totals,
        }
    }

    pub fn supported_endpoints(self) -> Vec<&'static str> {
        Endpoint::ALL
            .into_iter()
            .filter(|endpoint| self.supports(*endpoint))
            .map(Endpoint::as_str)
            .collect()
    }
}

/// Health state used by source scoring and `sources` command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime source health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
    /// Provider score component used by `auto` routing.
    pub score: u16,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool, score: u16) -> Self {
        Self {
            state,
            rate_available,
            score,
        }
    }

    pub const fn healthy(score: u16) -> Self {
        Self::new(HealthState::Healthy, true, score)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    UnsupportedEndpoint,
    Unavailable,
    RateLimited,
    InvalidRequest,
    MalformedResponse,
    AdapterNotRegistered,
    Internal,
}

/// Structured source error used by router fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unsupported_endpoint(endpoint: Endpoint) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedEndpoint,
            message: format!("endpoint '{endpoint}' is not supported by this source"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn adapter_not_registered(provider: ProviderId) -> Self {
        Self {
            kind: SourceErrorKind::AdapterNotRegistered,
            message: format!("source adapter '{provider}' is not registered"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnsupportedEndpoint => "source.unsupported_endpoint",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::AdapterNotRegistered => "source.adapter_not_registered",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// View call on a named protocol contract, with at most one `bytes32` key
/// argument such as a currency key.
///
/// Contract names resolve through the adapter's contract registry
/// (`Synthetix`, `SynthsUSD`, `SystemSettings`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractCall {
    pub contract: String,
    pub method: String,
    pub key: Option<String>,
}

impl ContractCall {
    pub fn new(
        contract: impl Into<String>,
        method: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let contract = contract.into();
        let method = method.into();
        if contract.trim().is_empty() || method.trim().is_empty() {
            return Err(SourceError::invalid_request(
                "contract call requires a contract name and a method name",
            ));
        }
        Ok(Self {
            contract,
            method,
            key: None,
        })
    }

    /// Passes `key` as the call's `bytes32` argument. Keys are ASCII and
    /// at most 32 bytes.
    pub fn with_key(mut self, key: impl Into<String>) -> Result<Self, SourceError> {
        let key = key.into();
        if key.is_empty() || key.len() > 32 || !key.is_ascii() {
            return Err(SourceError::invalid_request(format!(
                "'{key}' does not fit a bytes32 key"
            )));
        }
        self.key = Some(key);
        Ok(self)
    }
}

impl Display for ContractCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}.{}({key})", self.contract, self.method),
            None => write!(f, "{}.{}", self.contract, self.method),
        }
    }
}

/// Asset whose balance is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenRef {
    /// The chain's native currency (ETH).
    Native,
    /// An ERC-20 token, by contract registry name.
    Contract(String),
}

impl Display for TokenRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("ETH"),
            Self::Contract(name) => f.write_str(name),
        }
    }
}

pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Balance of `token` held by the `holder` contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceRequest {
    pub token: TokenRef,
    pub holder: String,
    pub decimals: u8,
}

impl BalanceRequest {
    pub fn new(token: TokenRef, holder: impl Into<String>) -> Result<Self, SourceError> {
        let holder = holder.into();
        if holder.trim().is_empty() {
            return Err(SourceError::invalid_request(
                "balance request requires a holder contract name",
            ));
        }
        Ok(Self {
            token,
            holder,
            decimals: DEFAULT_TOKEN_DECIMALS,
        })
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }
}

/// Request payload for market quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    pub symbol: AssetSymbol,
}

impl QuoteRequest {
    pub fn new(symbol: AssetSymbol) -> Self {
        Self { symbol }
    }
}

/// Request payload for chart series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceSeriesRequest {
    pub symbol: AssetSymbol,
    pub period: ChartPeriod,
    pub granularity: Granularity,
}

impl PriceSeriesRequest {
    /// Sampling granularity follows the period.
    pub fn new(symbol: AssetSymbol, period: ChartPeriod) -> Self {
        Self {
            symbol,
            period,
            granularity: period.granularity(),
        }
    }
}

/// Request payload for ranked holder lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HoldersRequest {
    pub synth: AssetSymbol,
    pub max: usize,
}

impl HoldersRequest {
    pub fn new(synth: AssetSymbol, max: usize) -> Result<Self, SourceError> {
        if max == 0 {
            return Err(SourceError::invalid_request(
                "holders request max must be greater than zero",
            ));
        }
        Ok(Self { synth, max })
    }
}

/// Source adapter contract.
///
/// Every provider implements this trait to be used with the router.
/// Endpoints the provider does not serve return
/// [`SourceError::unsupported_endpoint`] and are left out of
/// [`capabilities`](DataSource::capabilities).
///
/// Implementations must be `Send + Sync`; the section shares them across
/// fetch tasks.
pub trait DataSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Returns the set of supported endpoints.
    fn capabilities(&self) -> CapabilitySet;

    /// Reads a zero-argument view method, scaled from 18-decimal fixed point.
    fn contract_read<'a>(&'a self, call: ContractCall) -> SourceFuture<'a, f64>;

    /// Reads a token balance held by a protocol contract, scaled by `decimals`.
    fn token_balance<'a>(&'a self, req: BalanceRequest) -> SourceFuture<'a, f64>;

    /// Fetches the latest market quote for an asset.
    fn market_quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, MarketQuote>;

    /// Fetches price samples for the requested window, oldest first.
    fn price_series<'a>(&'a self, req: PriceSeriesRequest) -> SourceFuture<'a, Vec<PricePoint>>;

    /// Fetches the largest holders of a synth, largest first.
    fn holders<'a>(&'a self, req: HoldersRequest) -> SourceFuture<'a, Vec<HolderBalance>>;

    /// Fetches network-wide staking aggregates.
    fn network_totals<'a>(&'a self) -> SourceFuture<'a, NetworkTotals>;

    /// Returns the current health status of this source.
    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}
