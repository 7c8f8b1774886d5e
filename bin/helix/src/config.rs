//! Run settings and the network registry, layered with `figment`.
//!
//! Built-in defaults < registry file < `HELIX_*` environment < CLI flags.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use helix_deploy::NetworkRegistry;
use serde::Deserialize;

use crate::cli::Cli;

/// Registry file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "Helix.toml";

const DEFAULTS: &str = r#"
artifacts_dir = "artifacts"
lock_dir = ".helix/locks"
output_dir = "deployments"
"#;

/// Environment keys that belong to the CLI, not to the settings.
const CLI_ONLY_ENV: &[&str] = &["verbosity", "network", "config"];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub artifacts_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Overrides every network's confirmation timeout.
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub registry: NetworkRegistry,
}

impl Settings {
    /// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Toml::string(DEFAULTS));

        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Registry file does not exist: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
            }
        }

        let settings: Self = figment
            .merge(Env::prefixed("HELIX_").split("__").ignore(CLI_ONLY_ENV))
            .extract()
            .context("Failed to load configuration")?;

        tracing::debug!(
            networks = settings.registry.networks.len(),
            artifacts = %settings.artifacts_dir.display(),
            "Configuration loaded"
        );

        Ok(settings)
    }

    /// Apply the flags given on the command line.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(artifacts) = &cli.artifacts {
            self.artifacts_dir = artifacts.clone();
        }
        if let Some(output) = &cli.output {
            self.output_dir = output.clone();
        }
        if let Some(timeout) = cli.timeout {
            self.confirmation_timeout_secs = Some(timeout);
        }
        self
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::U256;
    use helix_deploy::{ConstantValue, NetworkId, Resolved};
    use tempdir::TempDir;

    #[test]
    fn test_load_registry_file() {
        let dir = TempDir::new("helix-config").unwrap();
        let path = dir.path().join("Helix.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "records"

[networks.bsc_testnet]
chain_id = 97
rpc_url = "https://data-seed-prebsc-1-s1.binance.org:8545"
gas_price = 20000000000
gas_limit = 2100000

[addresses.helixToken]
97 = "0xC232Ce0b83b3B320CdA3ec78c57A0D101A4Ac5cD"

[constants.MASTERCHEF_STAKING_PERCENT]
97 = 900000
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("records"));
        assert_eq!(settings.artifacts_dir, PathBuf::from("artifacts"));

        let network = settings.registry.resolve(NetworkId(97)).unwrap();
        assert_eq!(network.name, "bsc_testnet");
        assert!(network.addresses.get("helixToken").is_set());
        assert_eq!(
            network.constants.get("MASTERCHEF_STAKING_PERCENT"),
            Resolved::Set(ConstantValue::Integer(U256::from(900_000u64)))
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new("helix-config").unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_shipped_registry_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_FILE);
        let settings = Settings::load(Some(&path)).unwrap();

        let id = settings.registry.lookup("bsc_testnet").unwrap();
        assert_eq!(id, NetworkId(97));
        let network = settings.registry.resolve(id).unwrap();
        assert!(network.addresses.get("masterChef").is_set());
        assert!(!network.addresses.get("auraNFT").is_set());
    }
}
