use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in metadata and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Fixture,
    Rpc,
    Subgraph,
    Cmc,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [Self::Fixture, Self::Rpc, Self::Subgraph, Self::Cmc];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixture => "fixture",
            Self::Rpc => "rpc",
            Self::Subgraph => "subgraph",
            Self::Cmc => "cmc",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixture" => Ok(Self::Fixture),
            "rpc" => Ok(Self::Rpc),
            "subgraph" => Ok(Self::Subgraph),
            "cmc" | "coinmarketcap" => Ok(Self::Cmc),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
