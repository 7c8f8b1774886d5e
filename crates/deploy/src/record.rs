//! Persisted run records.
//!
//! Every run, completed or aborted, is written to
//! `{output}/{network}/{recipe}-{timestamp}.json` so the operator can see what
//! was confirmed and where a failed run stopped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    network::NetworkId,
    report::{RunResult, RunStatus},
};

/// A [`RunResult`] with the metadata needed to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// RFC 3339 time at which the record was written.
    pub recorded_at: String,
    pub helix_version: String,
    pub result: RunResult,
}

impl RunRecord {
    pub fn new(result: RunResult) -> Self {
        Self {
            recorded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            helix_version: env!("CARGO_PKG_VERSION").to_string(),
            result,
        }
    }

    /// Write the record under `dir`, returning the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let network_dir = dir.join(self.result.network.to_string());
        std::fs::create_dir_all(&network_dir).context(format!(
            "Failed to create record directory {}",
            network_dir.display()
        ))?;

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let path = network_dir.join(format!("{}-{stamp}.json", self.result.recipe));

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run record")?;
        std::fs::write(&path, json)
            .context(format!("Failed to write run record to {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Run record saved");
        Ok(path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read run record from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse run record {}", path.display()))
    }
}

/// One line of run history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub path: PathBuf,
    pub recorded_at: String,
    pub recipe: String,
    pub status: RunStatus,
    pub confirmed: usize,
    pub total: usize,
    pub last_confirmed: Option<String>,
}

/// Summaries of every record saved for `network` under `dir`, oldest first.
///
/// Files that fail to parse are skipped with a warning.
pub fn list(dir: &Path, network: NetworkId) -> Result<Vec<RecordSummary>> {
    let network_dir = dir.join(network.to_string());
    if !network_dir.exists() {
        return Ok(Vec::new());
    }

    let mut summaries = Vec::new();
    for entry in std::fs::read_dir(&network_dir)
        .context(format!("Failed to read {}", network_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let record = match RunRecord::load_from_file(&path) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable run record");
                continue;
            }
        };

        let result = &record.result;
        summaries.push(RecordSummary {
            recorded_at: record.recorded_at.clone(),
            recipe: result.recipe.clone(),
            status: result.status,
            confirmed: result
                .steps
                .iter()
                .filter(|s| s.state == crate::report::StepState::Confirmed)
                .count(),
            total: result.steps.len(),
            last_confirmed: result.last_confirmed().map(str::to_string),
            path,
        });
    }

    summaries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.path.cmp(&b.path)));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{NonceUsage, StepReport, StepState};
    use alloy_core::primitives::Address;
    use tempdir::TempDir;

    fn result(status: RunStatus) -> RunResult {
        let mut first = StepReport::pending(0, "chef", "deploy MasterChef".to_string(), false);
        first.state = StepState::Confirmed;
        first.nonce = Some(4);
        first.address = Some(Address::repeat_byte(0x11));
        let second =
            StepReport::pending(1, "add-minter", "helixToken.addMinter".to_string(), false);

        RunResult {
            recipe: "deploy-master-chef".to_string(),
            fingerprint: "ab".repeat(32),
            network: NetworkId(97),
            account: Address::repeat_byte(0x22),
            status,
            abort: None,
            nonces: NonceUsage { start: 4, next: 5 },
            steps: vec![first, second],
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new("helix-record").unwrap();
        let record = RunRecord::new(result(RunStatus::Aborted));

        let path = record.save(dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join("97")));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("deploy-master-chef-")
        );

        let loaded = RunRecord::load_from_file(&path).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_list_summarises_records() {
        let dir = TempDir::new("helix-record").unwrap();
        RunRecord::new(result(RunStatus::Aborted))
            .save(dir.path())
            .unwrap();
        std::fs::write(dir.path().join("97").join("garbage.json"), "{").unwrap();

        let summaries = list(dir.path(), NetworkId(97)).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, RunStatus::Aborted);
        assert_eq!(summaries[0].confirmed, 1);
        assert_eq!(summaries[0].total, 2);
        assert_eq!(summaries[0].last_confirmed.as_deref(), Some("chef"));

        assert!(list(dir.path(), NetworkId(56)).unwrap().is_empty());
    }
}
