//! Structured outcome of a recipe run.

use alloy_core::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::{
    abi::ArgValue,
    error::{Error, ErrorKind},
    network::NetworkId,
};

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum StepState {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum RunStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub revert_reason: Option<String>,
}

impl From<&Error> for StepFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            revert_reason: err.revert_reason().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub action: String,
    pub state: StepState,
    pub retry_safe: bool,
    pub nonce: Option<u64>,
    /// Call target, for wiring steps.
    pub target: Option<Address>,
    /// Arguments as submitted, with every reference substituted.
    pub args: Vec<ArgValue>,
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// Address created by a deployment step.
    pub address: Option<Address>,
    pub failure: Option<StepFailure>,
}

impl StepReport {
    pub fn pending(index: usize, label: &str, action: String, retry_safe: bool) -> Self {
        Self {
            index,
            label: label.to_string(),
            action,
            state: StepState::Pending,
            retry_safe,
            nonce: None,
            target: None,
            args: Vec::new(),
            tx_hash: None,
            block_number: None,
            gas_used: None,
            address: None,
            failure: None,
        }
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    pub step: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// Nonces handed out during the run. `next` is where a follow-up run on the
/// same account starts, even if the last transaction never landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceUsage {
    pub start: u64,
    pub next: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub recipe: String,
    pub fingerprint: String,
    pub network: NetworkId,
    pub account: Address,
    pub status: RunStatus,
    pub abort: Option<AbortReason>,
    pub nonces: NonceUsage,
    pub steps: Vec<StepReport>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Address produced by the step with `label`, if it was confirmed.
    pub fn produced(&self, label: &str) -> Option<Address> {
        self.steps
            .iter()
            .find(|s| s.label == label && s.state == StepState::Confirmed)
            .and_then(|s| s.address)
    }

    /// The step that failed, if any.
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.state == StepState::Failed)
    }

    /// Label of the last confirmed step: a resumed run starts after it.
    pub fn last_confirmed(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.state == StepState::Confirmed)
            .map(|s| s.label.as_str())
    }
}
