use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Instant on a price series or quote, held at UTC.
///
/// Serialized as RFC3339. Inputs with another offset are shifted to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcDateTime(#[serde(with = "rfc3339_utc")] OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parses an RFC3339 string such as CoinMarketCap's `last_updated`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(|value| Self(value.to_offset(UtcOffset::UTC)))
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    /// Subgraph entities carry unix seconds.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: seconds.to_string(),
            })
    }

    /// The instant `span` earlier, used to anchor chart windows.
    pub fn before(self, span: Duration) -> Result<Self, ValidationError> {
        time::Duration::try_from(span)
            .ok()
            .and_then(|span| self.0.checked_sub(span))
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: format!("{self} - {}s", span.as_secs()),
            })
    }

    pub fn unix_seconds(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.unix_seconds().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

mod rfc3339_utc {
    use serde::Deserializer;
    use time::{OffsetDateTime, UtcOffset};

    pub use time::serde::rfc3339::serialize;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        time::serde::rfc3339::deserialize(deserializer).map(|value| value.to_offset(UtcOffset::UTC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_shifted_to_utc() {
        let parsed = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_rfc3339_input() {
        let err = UtcDateTime::parse("01/01/2024").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn converts_subgraph_unix_seconds() {
        let parsed = UtcDateTime::from_unix_seconds(1_704_067_200).expect("must convert");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn steps_back_by_a_chart_window() {
        let end = UtcDateTime::from_unix_seconds(1_704_067_200).expect("must convert");
        let start = end.before(Duration::from_secs(86_400)).expect("in range");
        assert_eq!(start.unix_seconds(), 1_703_980_800);
    }

    #[test]
    fn serializes_as_a_utc_string() {
        let value = UtcDateTime::from_unix_seconds(0).expect("epoch");
        let json = serde_json::to_string(&value).expect("serializes");
        assert_eq!(json, "\"1970-01-01T00:00:00Z\"");
        let back: UtcDateTime = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, value);
    }
}
