//! Runtime configuration: endpoints, credentials, contract registry and
//! holder labels.
//!
//! Values come from an optional JSON file overlaid with environment
//! variables. Environment variables only fill fields the file left unset.
//!
//! | Field | Primary env var | Fallback env var |
//! |-------|-----------------|------------------|
//! | `rpc_url` | `SYNTHSTATS_RPC_URL` | `ETH_RPC_URL` |
//! | `subgraph_url` | `SYNTHSTATS_SUBGRAPH_URL` | - |
//! | `cmc_api_key` | `SYNTHSTATS_CMC_API_KEY` | `CMC_PRO_API_KEY` |

use std::collections::BTreeMap;
use std::env;
use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Address, CoreError, ValidationError};

pub const DEFAULT_CMC_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_HOLDERS_MAX: usize = 10;

/// Registry name of the on-chain name service used for unlisted contracts.
pub const ADDRESS_RESOLVER: &str = "AddressResolver";

/// 4-byte function selector, `0x` + 8 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodSelector(String);

impl MethodSelector {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let valid = trimmed
            .strip_prefix("0x")
            .is_some_and(|digits| {
                digits.len() == 8 && digits.chars().all(|ch| ch.is_ascii_hexdigit())
            });
        if !valid {
            return Err(ValidationError::InvalidSelector {
                value: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Hex digits without the `0x` prefix.
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }
}

impl Display for MethodSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MethodSelector {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MethodSelector> for String {
    fn from(value: MethodSelector) -> Self {
        value.0
    }
}

/// Everything the live adapters need to reach their upstreams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: Option<String>,
    pub subgraph_url: Option<String>,
    #[serde(skip_serializing)]
    pub cmc_api_key: Option<String>,
    pub cmc_base_url: String,
    pub timeout_ms: u64,
    pub holders_max: usize,
    /// Contract registry: protocol name to deployed address.
    pub contracts: BTreeMap<String, Address>,
    /// View method selectors callable over JSON-RPC, by method name.
    pub selectors: BTreeMap<String, MethodSelector>,
    /// Display names for well-known holder addresses.
    pub holder_labels: BTreeMap<Address, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Mainnet deployments. Contracts missing here, such as SystemSettings
        // which moves with each release, resolve through AddressResolver.
        let mut contracts = BTreeMap::new();
        for (name, address) in [
            (ADDRESS_RESOLVER, "0x4E3b31eB0E5CB73641EE1E65E7dCEFe520bA3ef2"),
            ("Synthetix", "0xC011a73ee8576Fb46F5E1c5751cA3B9Fe0af2a6F"),
            ("SynthsUSD", "0x57Ab1ec28D129707052df4dF418D58a2D46d5f51"),
            ("renBTC", "0xEB4C2781e4ebA804CE9a9803C67d0893436bB27D"),
            ("EtherCollateralsUSD", "0xfED77055B40d63DCf17ab250FFD6948FBFF57B82"),
            ("EtherCollateral", "0x5c8344bcdC38F1aB5EB5C1d4a35DdEeA522B5DfA"),
            ("CollateralEth", "0x3FF5c0A14121Ca39211C95f6cEB221b86A90729E"),
            ("CollateralErc20", "0x3B3812BB9f6151bEb6fa10783F1ae848a77a0d46"),
            ("CollateralShort", "0x1F2c3a1046c32729862fcB038369696e3273a516"),
        ] {
            if let Ok(address) = Address::parse(address) {
                contracts.insert(name.to_owned(), address);
            }
        }

        let mut selectors = BTreeMap::new();
        for (method, selector) in [
            ("totalSupply", "0x18160ddd"),
            ("issuanceRatio", "0xb410a034"),
            ("totalIssuedSynths", "0x83d625d4"),
        ] {
            if let Ok(selector) = MethodSelector::parse(selector) {
                selectors.insert(method.to_owned(), selector);
            }
        }

        Self {
            rpc_url: None,
            subgraph_url: None,
            cmc_api_key: None,
            cmc_base_url: String::from(DEFAULT_CMC_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            holders_max: DEFAULT_HOLDERS_MAX,
            contracts,
            selectors,
            holder_labels: BTreeMap::new(),
        }
    }
}

impl NetworkConfig {
    /// Loads the optional JSON file and overlays environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw)?;

        // File entries extend the built-in registry rather than replace it.
        let defaults = Self::default();
        for (name, address) in defaults.contracts {
            config.contracts.entry(name).or_insert(address);
        }
        for (method, selector) in defaults.selectors {
            config.selectors.entry(method).or_insert(selector);
        }

        Ok(config)
    }

    /// Fills unset endpoints and credentials from the environment.
    pub fn with_env(mut self) -> Self {
        if self.rpc_url.is_none() {
            self.rpc_url = env_var("SYNTHSTATS_RPC_URL", Some("ETH_RPC_URL"));
        }
        if self.subgraph_url.is_none() {
            self.subgraph_url = env_var("SYNTHSTATS_SUBGRAPH_URL", None);
        }
        if self.cmc_api_key.is_none() {
            self.cmc_api_key = env_var("SYNTHSTATS_CMC_API_KEY", Some("CMC_PRO_API_KEY"));
        }
        self
    }

    pub fn contract_address(&self, name: &str) -> Option<&Address> {
        self.contracts.get(name)
    }

    pub fn selector(&self, method: &str) -> Option<&MethodSelector> {
        self.selectors.get(method)
    }

    /// Known label for a holder, or the shortened address.
    pub fn holder_label(&self, address: &Address) -> String {
        self.holder_labels
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.shortened())
    }
}

fn env_var(primary: &str, fallback: Option<&str>) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| fallback.and_then(|name| env::var(name).ok()))
        .filter(|value| !value.trim().is_empty())
}
