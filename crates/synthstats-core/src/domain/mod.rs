//! # Domain Models
//!
//! Strongly-typed values exchanged between data sources, the metrics
//! calculator and the section view.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Address`] | 20-byte account or contract address |
//! | [`AssetSymbol`] | Ticker such as `SNX` or `sUSD` |
//! | [`ChartPeriod`] | Price chart window (D, W, M, Y) |
//! | [`Granularity`] | Price series sampling step (15m, 1d) |
//! | [`PricePoint`] | One price sample |
//! | [`MarketQuote`] | Price and 24h volume |
//! | [`HolderBalance`] | Ranked holder entry |
//! | [`NetworkTotals`] | Staking aggregates |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction validates invariants; invalid values return
//! [`ValidationError`](crate::ValidationError).

mod address;
mod models;
mod period;
mod symbol;
mod timestamp;

pub use address::Address;
pub use models::{HolderBalance, MarketQuote, NetworkTotals, PricePoint};
pub use period::{ChartPeriod, Granularity};
pub use symbol::AssetSymbol;
pub use timestamp::UtcDateTime;
