//! # Synthstats Core
//!
//! Data sources, derived metrics and section composition for the network
//! section of a synthetic-asset protocol dashboard.
//!
//! ## Overview
//!
//! - **Data source trait** for contract reads, token balances, market quotes,
//!   price series, holder lists and network totals
//! - **Routing logic** for source selection and fallback
//! - **Tri-state query results** where a failed fetch reads like a pending one
//! - **Derived metrics** that stay `None` until every input is known
//! - **Section controller** with generation-guarded slots and a period-driven
//!   price chart
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Fixture, JSON-RPC, subgraph and CoinMarketCap adapters |
//! | [`config`] | Endpoints, contract registry and holder labels |
//! | [`data_source`] | Data source trait and request types |
//! | [`domain`] | Domain models (PricePoint, MarketQuote, Address, ...) |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`metrics`] | Derived metric calculator |
//! | [`query`] | `MetricQueryResult` |
//! | [`routing`] | Source routing and selection |
//! | [`section`] | Network section and chart controller |
//! | [`slot`] | Generation-guarded result slots |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Request budgets |
//! | [`view`] | Panel layout and number formatting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use synthstats_core::{ChartPeriod, NetworkConfig, NetworkSection, SourceRouterBuilder, SourceStrategy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NetworkConfig::load(None)?;
//!     let router = SourceRouterBuilder::new().with_config(config.clone()).build();
//!     let section = NetworkSection::new(Arc::new(router), Arc::new(config), SourceStrategy::Auto);
//!
//!     section.start(ChartPeriod::Week).await;
//!     section.wait_until_settled(Duration::from_secs(10)).await;
//!
//!     let view = section.view().await;
//!     println!("{:?}", view.panel("SNXMKTCAP").and_then(|panel| panel.display.clone()));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / User     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Network Section │────▶│ View / Metrics   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Source Router  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters return [`SourceError`]; the section stores failures as
//! [`MetricQueryResult::Error`]. Derived metrics never error:
//!
//! ```rust
//! use synthstats_core::{market_cap, MetricQueryResult, QueryFailure};
//!
//! let price = MetricQueryResult::Success(3.0);
//! let supply = MetricQueryResult::Error(QueryFailure::new("source.unavailable", "down"));
//! assert_eq!(market_cap(&price, &supply), None);
//! ```
//!
//! ## Security
//!
//! - The CoinMarketCap key is read from config or environment and never serialized
//! - All HTTP requests use TLS via rustls

pub mod adapters;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod metrics;
pub mod query;
pub mod routing;
pub mod section;
pub mod slot;
pub mod source;
pub mod throttling;
pub mod view;

// Adapter implementations
pub use adapters::{CoinMarketCapAdapter, FixtureAdapter, RpcAdapter, SubgraphAdapter};

// Configuration
pub use config::{MethodSelector, NetworkConfig};

// Data source trait and types
pub use data_source::{
    BalanceRequest, CapabilitySet, ContractCall, DataSource, Endpoint, HealthState, HealthStatus,
    HoldersRequest, PriceSeriesRequest, QuoteRequest, SourceError, SourceErrorKind, TokenRef,
};

// Domain models
pub use domain::{
    Address, AssetSymbol, ChartPeriod, Granularity, HolderBalance, MarketQuote, NetworkTotals,
    PricePoint, UtcDateTime,
};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Derived metrics
pub use metrics::{
    collateral_sum, inverse, locked_value, market_cap, network_collateral_ratio, percent_change,
    DerivedMetric,
};

// Query results
pub use query::{MetricQueryResult, QueryFailure};

// Routing types
pub use routing::{
    RouteFailure, RouteResult, RouteSuccess, SourceRouter, SourceRouterBuilder, SourceSnapshot,
    SourceStrategy,
};

// Section
pub use section::{ChartController, NetworkSection, NetworkSnapshot};
pub use slot::{QuerySlot, SlotKey, SlotOutcome, SlotState, SlotTicket};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::{RateBudget, RatePolicy};

// View
pub use view::{
    compose, AreaChartView, HolderDistribution, HolderEntry, NetworkView, NumberStyle,
    PanelColor, StatPanel, StatsRow,
};
