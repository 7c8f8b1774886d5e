//! Network registry.
//!
//! Maps a [`NetworkId`] to its RPC endpoint, gas parameters and the per-network
//! projection of the address and constant tables. Resolution is pure: it does
//! not touch the network.

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    constants::{AddressBook, AddressTable, ConstantBook, ConstantTable},
    error::{Error, Result},
};

/// Default bound on how long a submitted transaction may stay unconfirmed.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// EIP-155 chain id selecting a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NetworkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for NetworkId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// Table files key networks by chain id, and map keys arrive as strings.
impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(Self(id)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Static parameters of one network, as written in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The chain id the endpoint must report.
    pub chain_id: NetworkId,
    /// JSON-RPC endpoint. May be empty in the shipped table and filled from the environment.
    #[serde(default)]
    pub rpc_url: String,
    /// Default gas price in wei.
    pub gas_price: u64,
    /// Default gas limit for deployments.
    pub gas_limit: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Gas parameters attached to every transaction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasParams {
    pub gas_price: u64,
    pub gas_limit: u64,
}

impl GasParams {
    /// Same price, different limit.
    pub fn with_limit(self, gas_limit: Option<u64>) -> Self {
        Self {
            gas_limit: gas_limit.unwrap_or(self.gas_limit),
            ..self
        }
    }
}

/// How long to wait for a receipt and how often to ask for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Everything a recipe run needs to know about one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub id: NetworkId,
    pub name: String,
    pub endpoint: String,
    pub gas: GasParams,
    pub confirmation: ConfirmationPolicy,
    pub addresses: AddressBook,
    pub constants: ConstantBook,
}

/// Read-only registry of networks and their tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkRegistry {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub addresses: AddressTable,
    #[serde(default)]
    pub constants: ConstantTable,
}

impl NetworkRegistry {
    pub fn new(
        networks: BTreeMap<String, NetworkConfig>,
        addresses: AddressTable,
        constants: ConstantTable,
    ) -> Self {
        Self {
            networks,
            addresses,
            constants,
        }
    }

    /// Parse a registry from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse registry as TOML")
    }

    /// Load a registry from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry from {}", path.display()))?;
        let registry = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), networks = registry.networks.len(), "Registry loaded");
        Ok(registry)
    }

    /// Find a network by registry name or by chain id.
    pub fn lookup(&self, selector: &str) -> Result<NetworkId> {
        if let Some(config) = self.networks.get(selector) {
            return Ok(config.chain_id);
        }

        let id: NetworkId = selector
            .parse()
            .map_err(|_| Error::UnknownNetwork(selector.to_string()))?;

        self.entry(id)
            .map(|_| id)
            .ok_or_else(|| Error::UnknownNetwork(selector.to_string()))
    }

    fn entry(&self, id: NetworkId) -> Option<(&String, &NetworkConfig)> {
        self.networks.iter().find(|(_, config)| config.chain_id == id)
    }

    /// Resolve the full parameter set of a network.
    pub fn resolve(&self, id: NetworkId) -> Result<ResolvedNetwork> {
        let (name, config) = self
            .entry(id)
            .ok_or_else(|| Error::UnknownNetwork(id.to_string()))?;

        Ok(ResolvedNetwork {
            id,
            name: name.clone(),
            endpoint: config.rpc_url.clone(),
            gas: GasParams {
                gas_price: config.gas_price,
                gas_limit: config.gas_limit,
            },
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(config.confirmation_timeout_secs),
                poll_interval: Duration::from_millis(config.poll_interval_ms),
            },
            addresses: self.addresses.for_network(id),
            constants: self.constants.for_network(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    use crate::constants::{ConstantValue, Resolved};

    const REGISTRY: &str = r#"
[networks.bsc_testnet]
chain_id = 97
rpc_url = "https://data-seed-prebsc-1-s1.binance.org:8545"
gas_price = 20000000000
gas_limit = 2100000

[networks.rinkeby]
chain_id = 4
gas_price = 5000000000
gas_limit = 2100000
confirmation_timeout_secs = 30

[addresses.helixToken]
4 = "0x0600D5569E3011233BF1df7fc84de595Ef13f4B6"
56 = ""
97 = "0xC232Ce0b83b3B320CdA3ec78c57A0D101A4Ac5cD"

[constants.MASTERCHEF_STAKING_PERCENT]
97 = { percent = 900000 }

[constants.MASTERCHEF_START_BLOCK]
97 = 100
4 = ""
"#;

    #[test]
    fn test_lookup_by_name_and_chain_id() {
        let registry = NetworkRegistry::from_toml_str(REGISTRY).unwrap();
        assert_eq!(registry.lookup("bsc_testnet").unwrap(), NetworkId(97));
        assert_eq!(registry.lookup("97").unwrap(), NetworkId(97));
        assert_eq!(registry.lookup("4").unwrap(), NetworkId(4));
    }

    #[test]
    fn test_unknown_network() {
        let registry = NetworkRegistry::from_toml_str(REGISTRY).unwrap();
        assert!(matches!(registry.lookup("56"), Err(Error::UnknownNetwork(_))));
        assert!(matches!(registry.lookup("polygon"), Err(Error::UnknownNetwork(_))));
        assert!(matches!(
            registry.resolve(NetworkId(1)),
            Err(Error::UnknownNetwork(_))
        ));
    }

    #[test]
    fn test_resolve_projects_tables() {
        let registry = NetworkRegistry::from_toml_str(REGISTRY).unwrap();
        let network = registry.resolve(NetworkId(97)).unwrap();

        assert_eq!(network.name, "bsc_testnet");
        assert_eq!(network.gas.gas_price, 20_000_000_000);
        assert_eq!(network.gas.gas_limit, 2_100_000);
        assert_eq!(
            network.confirmation.timeout,
            Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS)
        );
        assert_eq!(
            network.addresses.get("helixToken"),
            Resolved::Set(address!("0xC232Ce0b83b3B320CdA3ec78c57A0D101A4Ac5cD"))
        );
        assert_eq!(
            network.constants.get("MASTERCHEF_STAKING_PERCENT"),
            Resolved::Set(ConstantValue::Percent(900_000))
        );

        let rinkeby = registry.resolve(NetworkId(4)).unwrap();
        assert_eq!(rinkeby.endpoint, "");
        assert_eq!(rinkeby.confirmation.timeout, Duration::from_secs(30));
        assert_eq!(rinkeby.constants.get("MASTERCHEF_START_BLOCK"), Resolved::Unset);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = NetworkRegistry::from_toml_str(REGISTRY).unwrap();
        let first = registry.resolve(NetworkId(97)).unwrap();
        let second = registry.resolve(NetworkId(97)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gas_limit_override() {
        let gas = GasParams {
            gas_price: 1,
            gas_limit: 2_100_000,
        };
        assert_eq!(gas.with_limit(Some(3_000_000)).gas_limit, 3_000_000);
        assert_eq!(gas.with_limit(None), gas);
    }
}
