//! Tri-state result of a single metric fetch.
//!
//! Every data slot of the network section holds one [`MetricQueryResult`].
//! Consumers only ask "did it succeed?"; a failed fetch renders exactly like
//! one that is still in flight.

use serde::{Deserialize, Serialize};

use crate::data_source::SourceError;

/// Failure details kept for logs and envelope errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub code: String,
    pub message: String,
}

impl QueryFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<SourceError> for QueryFailure {
    fn from(error: SourceError) -> Self {
        Self::new(error.code(), error.message())
    }
}

/// State of one fetch: in flight, resolved, or failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricQueryResult<T> {
    #[default]
    Loading,
    Success(T),
    Error(QueryFailure),
}

impl<T> MetricQueryResult<T> {
    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: Into<QueryFailure>,
    {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Error(error.into()),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Success or Error; the fetch will not change this slot again.
    pub const fn is_settled(&self) -> bool {
        !self.is_loading()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Loading | Self::Error(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            Self::Loading | Self::Success(_) => None,
        }
    }

    pub fn as_ref(&self) -> MetricQueryResult<&T> {
        match self {
            Self::Loading => MetricQueryResult::Loading,
            Self::Success(value) => MetricQueryResult::Success(value),
            Self::Error(failure) => MetricQueryResult::Error(failure.clone()),
        }
    }

    pub fn map<U, F>(self, f: F) -> MetricQueryResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Loading => MetricQueryResult::Loading,
            Self::Success(value) => MetricQueryResult::Success(f(value)),
            Self::Error(failure) => MetricQueryResult::Error(failure),
        }
    }

    /// Like [`map`](Self::map) but a `None` projection turns Success into Loading.
    ///
    /// Used when the value needed is optional inside a successful payload,
    /// e.g. the first point of a possibly-empty series.
    pub fn and_then_some<U, F>(self, f: F) -> MetricQueryResult<U>
    where
        F: FnOnce(T) -> Option<U>,
    {
        match self {
            Self::Loading => MetricQueryResult::Loading,
            Self::Success(value) => match f(value) {
                Some(projected) => MetricQueryResult::Success(projected),
                None => MetricQueryResult::Loading,
            },
            Self::Error(failure) => MetricQueryResult::Error(failure),
        }
    }
}

impl<T: Copy> MetricQueryResult<T> {
    pub fn success(&self) -> Option<T> {
        self.value().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_and_loading_both_have_no_value() {
        let loading: MetricQueryResult<f64> = MetricQueryResult::Loading;
        let failed: MetricQueryResult<f64> =
            MetricQueryResult::Error(QueryFailure::new("source.unavailable", "down"));

        assert_eq!(loading.success(), None);
        assert_eq!(failed.success(), None);
        assert!(!loading.is_settled());
        assert!(failed.is_settled());
    }

    #[test]
    fn map_preserves_state() {
        let ok = MetricQueryResult::Success(2.0).map(|value: f64| value * 3.0);
        assert_eq!(ok.success(), Some(6.0));

        let failed: MetricQueryResult<f64> =
            MetricQueryResult::Error(QueryFailure::new("source.internal", "boom"));
        assert!(failed.map(|value| value + 1.0).failure().is_some());
    }

    #[test]
    fn empty_projection_reads_as_loading() {
        let series: MetricQueryResult<Vec<f64>> = MetricQueryResult::Success(Vec::new());
        let first = series.and_then_some(|points| points.first().copied());
        assert!(first.is_loading());
    }

    #[test]
    fn from_source_error_keeps_code() {
        let result: MetricQueryResult<f64> =
            MetricQueryResult::from_result(Err(SourceError::rate_limited("slow down")));
        let failure = result.failure().expect("must be an error");
        assert_eq!(failure.code, "source.rate_limited");
        assert_eq!(failure.message, "slow down");
    }
}
