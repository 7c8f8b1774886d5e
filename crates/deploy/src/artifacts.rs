//! Compiled contract artifacts.
//!
//! Artifacts are Hardhat JSON files (`contractName`, `abi`, `bytecode`), usually
//! found under `artifacts/contracts/<File>.sol/<Contract>.json`.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    abi::{ArgValue, encode_params},
    error::{Error, Result},
};

/// Name of a deployable contract, e.g. `MasterChef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractKind(pub String);

impl ContractKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Number of constructor parameters.
    pub fn constructor_arity(&self) -> usize {
        self.abi
            .constructor
            .as_ref()
            .map_or(0, |ctor| ctor.inputs.len())
    }

    /// Creation code: bytecode followed by the encoded constructor arguments.
    pub fn creation_code(&self, args: &[ArgValue]) -> Result<Bytes> {
        if self.bytecode.is_empty() {
            return Err(Error::artifact(format!(
                "`{}` has no bytecode (abstract contract or interface?)",
                self.contract_name
            )));
        }

        let params = self
            .abi
            .constructor
            .as_ref()
            .map(|ctor| ctor.inputs.as_slice())
            .unwrap_or_default();

        let encoded = encode_params(params, args).map_err(|e| {
            Error::invalid_arguments(format!("constructor of `{}`: {e}", self.contract_name))
        })?;

        let mut code = self.bytecode.to_vec();
        code.extend(encoded);
        Ok(code.into())
    }
}

/// In-memory collection of artifacts keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<ContractKind, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(ContractKind::new(artifact.contract_name.clone()), artifact);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn get(&self, kind: &ContractKind) -> Result<&Artifact> {
        self.artifacts
            .get(kind)
            .ok_or_else(|| Error::artifact(format!("no artifact for contract `{kind}`")))
    }

    /// Recursively load every Hardhat artifact under `dir`.
    ///
    /// Debug files (`*.dbg.json`) and JSON that is not a contract artifact
    /// (build-info, interfaces without bytecode field) are skipped.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut store = Self::new();
        let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let entries = std::fs::read_dir(&current)
                .with_context(|| format!("Failed to read artifacts directory {}", current.display()))?;

            for entry in entries {
                let path = entry
                    .with_context(|| format!("Failed to list {}", current.display()))?
                    .path();

                if path.is_dir() {
                    pending.push(path);
                    continue;
                }

                let is_artifact = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".json") && !n.ends_with(".dbg.json"));
                if !is_artifact {
                    continue;
                }

                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                match serde_json::from_str::<Artifact>(&content) {
                    Ok(artifact) => {
                        tracing::trace!(contract = %artifact.contract_name, path = %path.display(), "Loaded artifact");
                        store.insert(artifact);
                    }
                    Err(e) => {
                        tracing::trace!(path = %path.display(), error = %e, "Skipping non-artifact JSON");
                    }
                }
            }
        }

        tracing::debug!(dir = %dir.display(), count = store.len(), "Artifacts loaded");
        Ok(store)
    }
}

impl FromIterator<Artifact> for ArtifactStore {
    fn from_iter<I: IntoIterator<Item = Artifact>>(iter: I) -> Self {
        let mut store = Self::new();
        for artifact in iter {
            store.insert(artifact);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{U256, address};
    use tempdir::TempDir;

    const BRIDGE_ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "AuraNFTBridge",
        "sourceName": "contracts/bridge/AuraNFTBridge.sol",
        "abi": [
            {
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [{ "name": "_auraNFT", "type": "address", "internalType": "address" }]
            }
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080"
    }"#;

    #[test]
    fn test_creation_code_appends_constructor_args() {
        let artifact: Artifact = serde_json::from_str(BRIDGE_ARTIFACT).unwrap();
        assert_eq!(artifact.constructor_arity(), 1);

        let nft = address!("0x27D056ACc52033D0680dA1932497F70A3Ee1f51f");
        let code = artifact.creation_code(&[ArgValue::Address(nft)]).unwrap();

        assert_eq!(code.len(), 5 + 32);
        assert_eq!(&code[..5], &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(&code[5 + 12..], nft.as_slice());
    }

    #[test]
    fn test_creation_code_rejects_wrong_arity() {
        let artifact: Artifact = serde_json::from_str(BRIDGE_ARTIFACT).unwrap();
        assert!(matches!(
            artifact.creation_code(&[ArgValue::Uint(U256::ZERO), ArgValue::Bool(true)]),
            Err(Error::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_load_dir_walks_hardhat_layout() {
        let temp_dir = TempDir::new("helix-artifacts").expect("Failed to create temp dir");
        let nested = temp_dir.path().join("contracts/bridge/AuraNFTBridge.sol");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("AuraNFTBridge.json"), BRIDGE_ARTIFACT).unwrap();
        std::fs::write(nested.join("AuraNFTBridge.dbg.json"), r#"{"buildInfo": "x"}"#).unwrap();
        std::fs::write(temp_dir.path().join("random.json"), r#"{"foo": 1}"#).unwrap();

        let store = ArtifactStore::load_dir(temp_dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&ContractKind::new("AuraNFTBridge")).is_ok());
        assert!(matches!(
            store.get(&ContractKind::new("MasterChef")),
            Err(Error::Artifact(_))
        ));
    }
}
