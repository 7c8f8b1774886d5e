//! helix-deploy - Deployment orchestration for the Helix contract suite.
//!
//! This crate resolves per-network addresses and constants, deploys contracts
//! in dependency order and wires them together with nonce-sequenced calls,
//! reporting exactly which steps were confirmed when a run stops early.

pub mod abi;
pub mod artifacts;
pub mod chain;
pub mod constants;
pub mod deployer;
pub mod error;
pub mod lock;
pub mod network;
pub mod nonce;
pub mod recipe;
pub mod recipes;
pub mod record;
pub mod report;
pub mod rpc;
pub mod runner;
mod submit;
pub mod wiring;

pub use abi::ArgValue;
pub use artifacts::{Artifact, ArtifactStore, ContractKind};
pub use chain::{ChainClient, Receipt, SendError, SignedTx, TxRequest, TxSigner};
pub use constants::{
    AddressBook, AddressTable, ConstantBook, ConstantTable, ConstantValue, Resolved, SumInvariant,
};
pub use deployer::{DeployedUnit, UnitDeployer};
pub use error::{Error, ErrorKind, Result};
pub use lock::AccountLock;
pub use network::{
    ConfirmationPolicy, GasParams, NetworkConfig, NetworkId, NetworkRegistry, ResolvedNetwork,
};
pub use nonce::NonceCursor;
pub use recipe::{Arg, DeploymentStep, Recipe, RecipeBuilder, StepOptions};
pub use record::{RecordSummary, RunRecord};
pub use report::{AbortReason, NonceUsage, RunResult, RunStatus, StepFailure, StepReport, StepState};
pub use rpc::RpcClient;
pub use runner::{CancelHandle, CancelToken, RecipeRunner, cancellation};
pub use wiring::WiringExecutor;
