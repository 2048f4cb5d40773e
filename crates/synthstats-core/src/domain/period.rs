use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Window shown by the price chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[default]
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Y")]
    Year,
}

impl ChartPeriod {
    pub const ALL: [Self; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "D",
            Self::Week => "W",
            Self::Month => "M",
            Self::Year => "Y",
        }
    }

    /// Intraday sampling for the day view, daily sampling otherwise.
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Day => Granularity::FifteenMinutes,
            Self::Week | Self::Month | Self::Year => Granularity::OneDay,
        }
    }

    pub const fn window(self) -> Duration {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            Self::Day => Duration::from_secs(DAY),
            Self::Week => Duration::from_secs(7 * DAY),
            Self::Month => Duration::from_secs(30 * DAY),
            Self::Year => Duration::from_secs(365 * DAY),
        }
    }

    /// Number of samples the window holds at this period's granularity.
    pub const fn sample_count(self) -> usize {
        (self.window().as_secs() / self.granularity().step().as_secs()) as usize
    }
}

impl Display for ChartPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "D" | "DAY" => Ok(Self::Day),
            "W" | "WEEK" => Ok(Self::Week),
            "M" | "MONTH" => Ok(Self::Month),
            "Y" | "YEAR" => Ok(Self::Year),
            _ => Err(ValidationError::InvalidPeriod {
                value: value.trim().to_owned(),
            }),
        }
    }
}

/// Sampling step of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1d")]
    OneDay,
}

impl Granularity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15m",
            Self::OneDay => "1d",
        }
    }

    pub const fn step(self) -> Duration {
        match self {
            Self::FifteenMinutes => Duration::from_secs(15 * 60),
            Self::OneDay => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "15m" => Ok(Self::FifteenMinutes),
            "1d" => Ok(Self::OneDay),
            other => Err(ValidationError::InvalidGranularity {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_uses_intraday_sampling() {
        assert_eq!(ChartPeriod::Day.granularity(), Granularity::FifteenMinutes);
        assert_eq!(ChartPeriod::Day.sample_count(), 96);
    }

    #[test]
    fn longer_windows_use_daily_sampling() {
        for period in [ChartPeriod::Week, ChartPeriod::Month, ChartPeriod::Year] {
            assert_eq!(period.granularity(), Granularity::OneDay);
        }
        assert_eq!(ChartPeriod::Year.sample_count(), 365);
    }

    #[test]
    fn parses_letters_and_words() {
        assert_eq!(ChartPeriod::from_str("w"), Ok(ChartPeriod::Week));
        assert_eq!(ChartPeriod::from_str("Month"), Ok(ChartPeriod::Month));
    }

    #[test]
    fn rejects_invalid_period() {
        let err = ChartPeriod::from_str("Q").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidPeriod { .. }));
    }

    #[test]
    fn serializes_as_single_letter() {
        let json = serde_json::to_string(&ChartPeriod::Year).expect("serializes");
        assert_eq!(json, "\"Y\"");
    }
}
