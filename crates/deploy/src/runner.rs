//! Recipe runner.
//!
//! Executes a [`Recipe`] strictly in order against one network with one
//! signer:
//!
//! 1. Preflight, with no network I/O: constant invariants, registry
//!    references, artifacts, and a dry encoding of every step. Any failure
//!    here returns `Err` and nothing is sent.
//! 2. Nonce cursor initialised from the account's pending transaction count.
//! 3. Steps run one at a time (`Pending -> Submitted -> Confirmed | Failed`).
//!    The first failure aborts the run and leaves later steps `Pending`.
//!    Confirmed effects stay on-chain; nothing is rolled back or retried.

use std::{collections::HashMap, time::Duration};

use alloy_core::primitives::Address;
use tokio::sync::watch;

use crate::{
    abi::{ArgValue, encode_call},
    artifacts::{Artifact, ArtifactStore},
    chain::{ChainClient, TxSigner},
    constants::ConstantValue,
    deployer::UnitDeployer,
    error::{Error, Result},
    lock::AccountLock,
    network::{ConfirmationPolicy, ResolvedNetwork},
    nonce::NonceCursor,
    recipe::{Arg, DeploymentStep, Recipe},
    report::{AbortReason, NonceUsage, RunResult, RunStatus, StepFailure, StepReport, StepState},
    wiring::WiringExecutor,
};

/// Create a linked cancellation handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

/// Requests cancellation of a run.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Honoured before the next submission; an in-flight transaction is still
    /// waited for.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// An argument after preflight: either known, or waiting on a prior step.
#[derive(Debug, Clone)]
enum Slot {
    Ready(ArgValue),
    Produced(String),
}

impl Slot {
    fn placeholder(&self) -> ArgValue {
        match self {
            Self::Ready(value) => value.clone(),
            Self::Produced(_) => ArgValue::Address(Address::ZERO),
        }
    }
}

enum PlannedAction<'r> {
    Deploy {
        artifact: &'r Artifact,
    },
    Call {
        target: Slot,
        method: &'r str,
    },
}

struct PlannedStep<'r> {
    step: &'r DeploymentStep,
    action: PlannedAction<'r>,
    args: Vec<Slot>,
}

pub struct RecipeRunner<'a, C, S> {
    client: &'a C,
    signer: &'a S,
    network: &'a ResolvedNetwork,
    artifacts: &'a ArtifactStore,
    _lock: AccountLock,
    cancel: Option<CancelToken>,
    confirmation_timeout: Option<Duration>,
}

impl<'a, C, S> RecipeRunner<'a, C, S>
where
    C: ChainClient,
    S: TxSigner,
{
    /// The lock must cover this network and the signer's account.
    pub fn new(
        client: &'a C,
        signer: &'a S,
        network: &'a ResolvedNetwork,
        artifacts: &'a ArtifactStore,
        lock: AccountLock,
    ) -> Result<Self> {
        if lock.network() != network.id || lock.account() != signer.address() {
            return Err(Error::invalid_arguments(format!(
                "lock covers {}@{}, run needs {}@{}",
                lock.account(),
                lock.network(),
                signer.address(),
                network.id
            )));
        }

        Ok(Self {
            client,
            signer,
            network,
            artifacts,
            _lock: lock,
            cancel: None,
            confirmation_timeout: None,
        })
    }

    pub fn with_cancellation(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Override the network's confirmation timeout for every step that does
    /// not set its own.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = Some(timeout);
        self
    }

    /// Run `recipe` to completion or to its first failure.
    ///
    /// `Err` is only returned for failures that happen before any transaction
    /// is sent. Once submission starts, the outcome is reported in the
    /// [`RunResult`].
    pub async fn run(&mut self, recipe: &Recipe) -> Result<RunResult> {
        let account = self.signer.address();

        tracing::info!(
            recipe = recipe.name(),
            network = %self.network.id,
            %account,
            steps = recipe.steps().len(),
            "Starting recipe run..."
        );

        let plan = self.preflight(recipe)?;
        let mut cursor = NonceCursor::init(self.client, self.network.id, account).await?;

        let mut reports: Vec<StepReport> = recipe
            .steps()
            .iter()
            .enumerate()
            .map(|(i, step)| {
                StepReport::pending(i, step.label(), step.describe(), step.options().retry_safe)
            })
            .collect();

        let mut produced: HashMap<String, Address> = HashMap::new();
        let mut abort = None;

        for (index, planned) in plan.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                tracing::warn!(step = index, "Cancellation requested, stopping before submission");
                abort = Some(AbortReason {
                    step: index,
                    kind: Error::Cancelled.kind(),
                    message: Error::Cancelled.to_string(),
                });
                break;
            }

            let report = &mut reports[index];
            if let Err(e) = self
                .execute(planned, report, &mut cursor, &mut produced)
                .await
            {
                tracing::warn!(
                    step = %report.label,
                    error = %e,
                    "Step failed, aborting recipe"
                );
                if let Some(nonce) = report.nonce.filter(|_| !e.consumes_nonce()) {
                    cursor.release(nonce);
                    report.nonce = None;
                }
                report.state = StepState::Failed;
                report.tx_hash = report.tx_hash.or(failed_tx_hash(&e));
                report.failure = Some(StepFailure::from(&e));
                abort = Some(AbortReason {
                    step: index,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                break;
            }
        }

        let status = if abort.is_none() {
            RunStatus::Completed
        } else {
            RunStatus::Aborted
        };

        tracing::info!(
            recipe = recipe.name(),
            %status,
            confirmed = reports.iter().filter(|r| r.state == StepState::Confirmed).count(),
            nonces_used = cursor.consumed(),
            "Recipe run finished"
        );

        Ok(RunResult {
            recipe: recipe.name().to_string(),
            fingerprint: recipe.fingerprint().to_string(),
            network: self.network.id,
            account,
            status,
            abort,
            nonces: NonceUsage {
                start: cursor.start(),
                next: cursor.peek(),
            },
            steps: reports,
        })
    }

    async fn execute(
        &self,
        planned: &PlannedStep<'_>,
        report: &mut StepReport,
        cursor: &mut NonceCursor,
        produced: &mut HashMap<String, Address>,
    ) -> Result<()> {
        let args = planned
            .args
            .iter()
            .map(|slot| substitute(slot, produced))
            .collect::<Result<Vec<_>>>()?;
        report.args = args.clone();

        let options = planned.step.options();
        let gas = self.network.gas.with_limit(options.gas_limit);
        let policy = self.policy(options.timeout);

        match &planned.action {
            PlannedAction::Deploy { artifact } => {
                let nonce = cursor.next();
                report.nonce = Some(nonce);
                report.state = StepState::Submitted;
                tracing::debug!(step = %report.label, nonce, state = %report.state, "Step submitted");

                let unit = UnitDeployer::new(self.client, self.signer, self.network.id)
                    .deploy(artifact, &args, nonce, gas, policy)
                    .await?;

                report.state = StepState::Confirmed;
                report.address = Some(unit.address);
                report.tx_hash = Some(unit.receipt.tx_hash);
                report.block_number = Some(unit.receipt.block_number);
                report.gas_used = Some(unit.receipt.gas_used);
                produced.insert(report.label.clone(), unit.address);
            }
            PlannedAction::Call { target, method } => {
                let target = substitute(target, produced)?
                    .as_address()
                    .ok_or_else(|| Error::invalid_arguments("call target is not an address"))?;
                report.target = Some(target);

                let nonce = cursor.next();
                report.nonce = Some(nonce);
                report.state = StepState::Submitted;
                tracing::debug!(step = %report.label, nonce, state = %report.state, "Step submitted");

                let receipt = WiringExecutor::new(self.client, self.signer, self.network.id)
                    .call(target, method, &args, nonce, gas, policy)
                    .await?;

                report.state = StepState::Confirmed;
                report.tx_hash = Some(receipt.tx_hash);
                report.block_number = Some(receipt.block_number);
                report.gas_used = Some(receipt.gas_used);
            }
        }

        tracing::info!(step = %report.label, action = %report.action, "Step confirmed");
        Ok(())
    }

    fn policy(&self, step_timeout: Option<Duration>) -> ConfirmationPolicy {
        let mut policy = self.network.confirmation;
        if let Some(timeout) = step_timeout.or(self.confirmation_timeout) {
            policy.timeout = timeout;
        }
        policy
    }

    /// Resolve everything that does not depend on earlier steps and encode
    /// each step once with placeholder addresses.
    fn preflight<'r>(&self, recipe: &'r Recipe) -> Result<Vec<PlannedStep<'r>>>
    where
        'a: 'r,
    {
        for invariant in recipe.invariants() {
            invariant.check(&self.network.constants)?;
        }

        let plan = recipe
            .steps()
            .iter()
            .map(|step| self.plan_step(step))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(recipe = recipe.name(), steps = plan.len(), "Preflight passed");
        Ok(plan)
    }

    fn plan_step<'r>(&self, step: &'r DeploymentStep) -> Result<PlannedStep<'r>>
    where
        'a: 'r,
    {
        match step {
            DeploymentStep::DeployUnit { kind, args, .. } => {
                let artifact = self.artifacts.get(kind)?;
                let args = self.resolve_args(args)?;
                let placeholders: Vec<_> = args.iter().map(Slot::placeholder).collect();
                artifact.creation_code(&placeholders)?;

                Ok(PlannedStep {
                    step,
                    action: PlannedAction::Deploy { artifact },
                    args,
                })
            }
            DeploymentStep::WireCall {
                label,
                target,
                method,
                args,
                ..
            } => {
                let target = self.resolve(target)?;
                if target.placeholder().as_address().is_none() {
                    return Err(Error::invalid_arguments(format!(
                        "step `{label}`: call target is not an address"
                    )));
                }

                let args = self.resolve_args(args)?;
                let placeholders: Vec<_> = args.iter().map(Slot::placeholder).collect();
                encode_call(method, &placeholders)
                    .map_err(|e| Error::invalid_arguments(format!("step `{label}`: {e}")))?;

                Ok(PlannedStep {
                    step,
                    action: PlannedAction::Call { target, method },
                    args,
                })
            }
        }
    }

    fn resolve_args(&self, args: &[Arg]) -> Result<Vec<Slot>> {
        args.iter().map(|arg| self.resolve(arg)).collect()
    }

    fn resolve(&self, arg: &Arg) -> Result<Slot> {
        let value = match arg {
            Arg::Literal(value) => value.clone(),
            Arg::Constant(name) => match self.network.constants.require(name)? {
                ConstantValue::Integer(v) => ArgValue::Uint(v),
                ConstantValue::Percent(p) => ArgValue::uint(u64::from(p)),
                ConstantValue::Address(addr) => ArgValue::Address(addr),
            },
            Arg::Contract(name) => ArgValue::Address(self.network.addresses.require(name)?),
            Arg::Signer => ArgValue::Address(self.signer.address()),
            Arg::Output(label) => return Ok(Slot::Produced(label.clone())),
        };
        Ok(Slot::Ready(value))
    }
}

fn substitute(slot: &Slot, produced: &HashMap<String, Address>) -> Result<ArgValue> {
    match slot {
        Slot::Ready(value) => Ok(value.clone()),
        Slot::Produced(label) => produced
            .get(label)
            .map(|addr| ArgValue::Address(*addr))
            .ok_or_else(|| Error::CyclicOrUnorderedDependency {
                step: label.clone(),
                reference: label.clone(),
            }),
    }
}

fn failed_tx_hash(err: &Error) -> Option<alloy_core::primitives::TxHash> {
    match err {
        Error::ConfirmationError { tx_hash, .. } | Error::ConfirmationTimeout { tx_hash, .. } => {
            Some(*tx_hash)
        }
        _ => None,
    }
}
