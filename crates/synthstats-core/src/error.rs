use thiserror::Error;

/// Validation and contract errors exposed by `synthstats-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("address must be 0x followed by 40 hex digits: '{value}'")]
    InvalidAddress { value: String },
    #[error("method selector must be 0x followed by 8 hex digits: '{value}'")]
    InvalidSelector { value: String },

    #[error("invalid chart period '{value}', expected one of D, W, M, Y")]
    InvalidPeriod { value: String },
    #[error("invalid granularity '{value}', expected one of 15m, 1d")]
    InvalidGranularity { value: String },
    #[error("invalid source '{value}', expected one of fixture, rpc, subgraph, cmc")]
    InvalidSource { value: String },

    #[error("timestamp is not a valid RFC3339 instant: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("source_chain must contain at least one source")]
    EmptySourceChain,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config file '{path}' could not be read: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
