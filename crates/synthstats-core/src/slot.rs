//! Generation-guarded result slots.
//!
//! A [`QuerySlot`] owns the [`MetricQueryResult`] of one fetch. Every
//! request takes a [`SlotTicket`] from [`QuerySlot::begin`], which bumps the
//! slot's generation and resets it to `Loading`. A response is applied only
//! while its ticket is still current, so a late answer to a superseded
//! request never overwrites a newer one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::data_source::SourceError;
use crate::query::{MetricQueryResult, QueryFailure};
use crate::routing::RouteResult;
use crate::{EnvelopeError, ProviderId};

/// Names of the network section's fetch slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    SnxQuote,
    SusdQuote,
    SnxTotalSupply,
    IssuanceRatio,
    TotalIssuedSynths,
    SusdTotalSupply,
    EthSusdCollateral,
    EthCollateral,
    MultiCollateralEth,
    BtcLocked,
    SusdShortLocked,
    NetworkTotals,
    SusdHolders,
    PriceChart,
}

impl SlotKey {
    pub const ALL: [Self; 14] = [
        Self::SnxQuote,
        Self::SusdQuote,
        Self::SnxTotalSupply,
        Self::IssuanceRatio,
        Self::TotalIssuedSynths,
        Self::SusdTotalSupply,
        Self::EthSusdCollateral,
        Self::EthCollateral,
        Self::MultiCollateralEth,
        Self::BtcLocked,
        Self::SusdShortLocked,
        Self::NetworkTotals,
        Self::SusdHolders,
        Self::PriceChart,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SnxQuote => "snx_quote",
            Self::SusdQuote => "susd_quote",
            Self::SnxTotalSupply => "snx_total_supply",
            Self::IssuanceRatio => "issuance_ratio",
            Self::TotalIssuedSynths => "total_issued_synths",
            Self::SusdTotalSupply => "susd_total_supply",
            Self::EthSusdCollateral => "eth_susd_collateral",
            Self::EthCollateral => "eth_collateral",
            Self::MultiCollateralEth => "multi_collateral_eth",
            Self::BtcLocked => "btc_locked",
            Self::SusdShortLocked => "susd_short_locked",
            Self::NetworkTotals => "network_totals",
            Self::SusdHolders => "susd_holders",
            Self::PriceChart => "price_chart",
        }
    }
}

/// Proof of which request a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    generation: u64,
}

impl SlotTicket {
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// Resolved fetch plus the routing details the envelope reports.
#[derive(Debug, Clone)]
pub struct SlotOutcome<T> {
    pub result: MetricQueryResult<T>,
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<EnvelopeError>,
    pub warnings: Vec<String>,
}

impl<T> SlotOutcome<T> {
    pub fn from_route(route: RouteResult<T>) -> Self {
        match route {
            Ok(success) => Self {
                result: MetricQueryResult::Success(success.data),
                source_chain: success.source_chain,
                errors: success.errors,
                warnings: success.warnings,
            },
            Err(failure) => Self {
                source_chain: failure.source_chain.clone(),
                errors: failure.errors.clone(),
                warnings: failure.warnings.clone(),
                result: MetricQueryResult::Error(QueryFailure::from(failure)),
            },
        }
    }

    /// A request that could not be built, so no source was tried.
    pub fn rejected(error: SourceError) -> Self {
        let envelope_error = EnvelopeError::from_source(&error, None);
        Self {
            result: MetricQueryResult::Error(QueryFailure::from(error)),
            source_chain: Vec::new(),
            errors: vec![envelope_error],
            warnings: Vec::new(),
        }
    }
}

/// Snapshot of one slot at a point in time.
#[derive(Debug, Clone)]
pub struct SlotState<T> {
    pub generation: u64,
    pub result: MetricQueryResult<T>,
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<EnvelopeError>,
    pub warnings: Vec<String>,
}

impl<T> Default for SlotState<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            result: MetricQueryResult::Loading,
            source_chain: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Shared, cloneable handle to one fetch result.
///
/// Every applied change bumps the shared `changes` counter so section
/// consumers can wait for the next update.
#[derive(Debug)]
pub struct QuerySlot<T> {
    key: SlotKey,
    state: Arc<Mutex<SlotState<T>>>,
    changes: Arc<watch::Sender<u64>>,
}

impl<T> Clone for QuerySlot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            state: Arc::clone(&self.state),
            changes: Arc::clone(&self.changes),
        }
    }
}

impl<T: Clone> QuerySlot<T> {
    pub fn new(key: SlotKey, changes: Arc<watch::Sender<u64>>) -> Self {
        Self {
            key,
            state: Arc::new(Mutex::new(SlotState::default())),
            changes,
        }
    }

    pub const fn key(&self) -> SlotKey {
        self.key
    }

    /// Starts a new request: bumps the generation and resets to `Loading`.
    pub async fn begin(&self) -> SlotTicket {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.result = MetricQueryResult::Loading;
        state.source_chain.clear();
        state.errors.clear();
        state.warnings.clear();
        let ticket = SlotTicket {
            generation: state.generation,
        };
        drop(state);

        self.notify();
        ticket
    }

    /// Applies `outcome` if `ticket` is still current. Returns whether it was applied.
    pub async fn resolve(&self, ticket: SlotTicket, outcome: SlotOutcome<T>) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != ticket.generation {
            debug!(
                slot = self.key.as_str(),
                stale = ticket.generation,
                current = state.generation,
                "ignoring superseded response"
            );
            return false;
        }

        let slot_name = self.key.as_str();
        state.result = outcome.result;
        state.source_chain = outcome.source_chain;
        state.errors = outcome
            .errors
            .into_iter()
            .map(|error| error.with_slot(slot_name))
            .collect();
        state.warnings = outcome.warnings;
        drop(state);

        self.notify();
        true
    }

    pub async fn snapshot(&self) -> SlotState<T> {
        self.state.lock().await.clone()
    }

    pub async fn result(&self) -> MetricQueryResult<T> {
        self.state.lock().await.result.clone()
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}
