//! Error taxonomy shared by every stage of a recipe run.

use std::time::Duration;

use alloy_core::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::network::NetworkId;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stable, serializable classification of an [`Error`].
///
/// This is what a [`crate::RunResult`] carries for a failed step, so that
/// records stay readable after the original error value is gone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum ErrorKind {
    UnknownNetwork,
    UnresolvedDependency,
    InvalidConstantInvariant,
    CyclicOrUnorderedDependency,
    DuplicateStep,
    InvalidArguments,
    Artifact,
    SubmissionError,
    ConfirmationError,
    ConfirmationTimeout,
    Signing,
    Rpc,
    AccountBusy,
    Io,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unresolved dependency `{name}` on network {network}")]
    UnresolvedDependency { name: String, network: NetworkId },

    #[error("constant invariant violated: {0}")]
    InvalidConstantInvariant(String),

    #[error("step `{step}` references `{reference}`, which no earlier step produces")]
    CyclicOrUnorderedDependency { step: String, reference: String },

    #[error("step label `{0}` is used more than once")]
    DuplicateStep(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("transaction with nonce {nonce} rejected before inclusion: {message}")]
    SubmissionError { nonce: u64, message: String },

    #[error("transaction {tx_hash} failed on-chain: {}", .reason.as_deref().unwrap_or("no revert reason"))]
    ConfirmationError {
        tx_hash: TxHash,
        reason: Option<String>,
    },

    #[error("transaction {tx_hash} not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx_hash: TxHash, timeout: Duration },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("account {account} on network {network} is locked by another run")]
    AccountBusy { network: NetworkId, account: Address },

    #[error("io error: {0}")]
    Io(String),

    #[error("run cancelled before submission")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownNetwork(_) => ErrorKind::UnknownNetwork,
            Self::UnresolvedDependency { .. } => ErrorKind::UnresolvedDependency,
            Self::InvalidConstantInvariant(_) => ErrorKind::InvalidConstantInvariant,
            Self::CyclicOrUnorderedDependency { .. } => ErrorKind::CyclicOrUnorderedDependency,
            Self::DuplicateStep(_) => ErrorKind::DuplicateStep,
            Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::Artifact(_) => ErrorKind::Artifact,
            Self::SubmissionError { .. } => ErrorKind::SubmissionError,
            Self::ConfirmationError { .. } => ErrorKind::ConfirmationError,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Rpc(_) => ErrorKind::Rpc,
            Self::AccountBusy { .. } => ErrorKind::AccountBusy,
            Self::Io(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The on-chain revert reason, if this error carries one.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::ConfirmationError { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Whether the transaction's nonce counts as used on-chain.
    ///
    /// True once the transaction may have reached the network, whatever
    /// became of it afterwards.
    pub fn consumes_nonce(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SubmissionError | ErrorKind::ConfirmationError | ErrorKind::ConfirmationTimeout
        )
    }

    /// Whether the error was raised before anything reached the network.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnknownNetwork
                | ErrorKind::UnresolvedDependency
                | ErrorKind::InvalidConstantInvariant
                | ErrorKind::CyclicOrUnorderedDependency
                | ErrorKind::DuplicateStep
                | ErrorKind::InvalidArguments
                | ErrorKind::Artifact
        )
    }

    pub fn rpc(e: impl std::fmt::Display) -> Self {
        Self::Rpc(e.to_string())
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    pub fn io(e: impl std::fmt::Display) -> Self {
        Self::Io(e.to_string())
    }
}
