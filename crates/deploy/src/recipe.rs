//! Recipes: ordered, dependency-checked lists of deployment steps.
//!
//! A step's arguments are [`Arg`]s, which may point at a registry entry or at
//! the address produced by an earlier step. Ordering is checked when the
//! recipe is built, so a recipe that exists is always in a valid order.

use std::{collections::HashSet, fmt, time::Duration};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    abi::{ArgValue, parse_method},
    artifacts::ContractKind,
    constants::SumInvariant,
    error::{Error, Result},
    report::RunResult,
};

/// Where a step argument comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    /// A fixed value.
    Literal(ArgValue),
    /// A named entry of the network's constant table.
    Constant(String),
    /// A named entry of the network's address table.
    Contract(String),
    /// The address produced by the earlier step with this label.
    Output(String),
    /// The signing account.
    Signer,
}

impl Arg {
    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant(name.into())
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self::Contract(name.into())
    }

    pub fn output(label: impl Into<String>) -> Self {
        Self::Output(label.into())
    }

    pub fn address(addr: Address) -> Self {
        Self::Literal(ArgValue::Address(addr))
    }

    pub fn uint(v: u64) -> Self {
        Self::Literal(ArgValue::uint(v))
    }

    pub fn bool(b: bool) -> Self {
        Self::Literal(ArgValue::Bool(b))
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Constant(name) => write!(f, "const:{name}"),
            Self::Contract(name) => write!(f, "contract:{name}"),
            Self::Output(label) => write!(f, "step:{label}"),
            Self::Signer => write!(f, "signer"),
        }
    }
}

/// Per-step knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOptions {
    /// Overrides the network's default gas limit.
    pub gas_limit: Option<u64>,
    /// Overrides the network's confirmation timeout.
    pub timeout: Option<Duration>,
    /// Declared by the recipe author: re-running this step after a failure
    /// leaves the target in the same state.
    pub retry_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum DeploymentStep {
    DeployUnit {
        label: String,
        kind: ContractKind,
        args: Vec<Arg>,
        #[serde(default)]
        options: StepOptions,
    },
    WireCall {
        label: String,
        target: Arg,
        method: String,
        args: Vec<Arg>,
        #[serde(default)]
        options: StepOptions,
    },
}

impl DeploymentStep {
    pub fn label(&self) -> &str {
        match self {
            Self::DeployUnit { label, .. } | Self::WireCall { label, .. } => label,
        }
    }

    pub fn options(&self) -> &StepOptions {
        match self {
            Self::DeployUnit { options, .. } | Self::WireCall { options, .. } => options,
        }
    }

    fn options_mut(&mut self) -> &mut StepOptions {
        match self {
            Self::DeployUnit { options, .. } | Self::WireCall { options, .. } => options,
        }
    }

    fn inputs_mut(&mut self) -> impl Iterator<Item = &mut Arg> {
        let (target, args) = match self {
            Self::DeployUnit { args, .. } => (None, args),
            Self::WireCall { target, args, .. } => (Some(target), args),
        };
        target.into_iter().chain(args.iter_mut())
    }

    /// Only deployments produce an address later steps can consume.
    pub fn produces_address(&self) -> bool {
        matches!(self, Self::DeployUnit { .. })
    }

    /// Every argument of the step, call target included.
    pub fn inputs(&self) -> impl Iterator<Item = &Arg> {
        let (target, args) = match self {
            Self::DeployUnit { args, .. } => (None, args),
            Self::WireCall { target, args, .. } => (Some(target), args),
        };
        target.into_iter().chain(args.iter())
    }

    /// Short human description, e.g. `deploy MasterChef` or `helixToken.addMinter(address)`.
    pub fn describe(&self) -> String {
        match self {
            Self::DeployUnit { kind, .. } => format!("deploy {kind}"),
            Self::WireCall { target, method, .. } => match target {
                Arg::Contract(name) | Arg::Output(name) => format!("{name}.{method}"),
                other => format!("{other}.{method}"),
            },
        }
    }
}

/// An immutable, validated sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    name: String,
    invariants: Vec<SumInvariant>,
    steps: Vec<DeploymentStep>,
    fingerprint: String,
}

impl Recipe {
    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder {
            name: name.into(),
            invariants: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn invariants(&self) -> &[SumInvariant] {
        &self.invariants
    }

    /// SHA-256 over the recipe definition; equal recipes share a fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// A recipe made of the steps after `label`. References to the skipped
    /// steps are left as they are, so a step consuming one of them makes the
    /// narrowed recipe invalid; [`Recipe::resume`] pins them instead.
    pub fn after(&self, label: &str) -> Result<Recipe> {
        let position = self.position(label)?;
        self.narrowed(position + 1, format!("{}-after-{label}", self.name), |_| None)
    }

    /// The rest of this recipe after an aborted run of it.
    ///
    /// Starts after the last confirmed step of `result`, and replaces every
    /// reference to a confirmed deployment with the address it produced.
    pub fn resume(&self, result: &RunResult) -> Result<Recipe> {
        if result.fingerprint != self.fingerprint {
            return Err(Error::invalid_arguments(format!(
                "run of `{}` was recorded for a different definition of `{}`",
                result.recipe, self.name
            )));
        }
        if result.is_completed() {
            return Err(Error::invalid_arguments(format!(
                "run of `{}` already completed",
                self.name
            )));
        }

        let (start, name) = match result.last_confirmed() {
            Some(label) => (self.position(label)? + 1, format!("{}-after-{label}", self.name)),
            None => (0, self.name.clone()),
        };

        self.narrowed(start, name, |label| result.produced(label))
    }

    fn position(&self, label: &str) -> Result<usize> {
        self.steps
            .iter()
            .position(|s| s.label() == label)
            .ok_or_else(|| Error::invalid_arguments(format!("no step labelled `{label}`")))
    }

    fn narrowed(
        &self,
        start: usize,
        name: String,
        produced: impl Fn(&str) -> Option<Address>,
    ) -> Result<Recipe> {
        let mut steps = self.steps[start..].to_vec();
        for input in steps.iter_mut().flat_map(|step| step.inputs_mut()) {
            let pinned = match input {
                Arg::Output(label) => produced(label),
                _ => None,
            };
            if let Some(address) = pinned {
                *input = Arg::address(address);
            }
        }

        RecipeBuilder {
            name,
            invariants: self.invariants.clone(),
            steps,
        }
        .build()
    }
}

pub struct RecipeBuilder {
    name: String,
    invariants: Vec<SumInvariant>,
    steps: Vec<DeploymentStep>,
}

impl RecipeBuilder {
    /// Require constants to sum to `total` before anything is submitted.
    pub fn require_sum<I, S>(mut self, parts: I, total: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invariants.push(SumInvariant::new(parts, total));
        self
    }

    pub fn deploy(
        mut self,
        label: impl Into<String>,
        kind: impl Into<ContractKind>,
        args: Vec<Arg>,
    ) -> Self {
        self.steps.push(DeploymentStep::DeployUnit {
            label: label.into(),
            kind: kind.into(),
            args,
            options: StepOptions::default(),
        });
        self
    }

    pub fn call(
        mut self,
        label: impl Into<String>,
        target: Arg,
        method: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        self.steps.push(DeploymentStep::WireCall {
            label: label.into(),
            target,
            method: method.into(),
            args,
            options: StepOptions::default(),
        });
        self
    }

    /// Gas limit of the most recently added step.
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.options_mut().gas_limit = Some(gas_limit);
        }
        self
    }

    /// Confirmation timeout of the most recently added step.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.options_mut().timeout = Some(timeout);
        }
        self
    }

    /// Mark the most recently added step as safe to re-run.
    pub fn retry_safe(mut self) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.options_mut().retry_safe = true;
        }
        self
    }

    /// Validate labels, ordering and method signatures.
    pub fn build(self) -> Result<Recipe> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut producers: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            let label = step.label();

            for input in step.inputs() {
                if let Arg::Output(reference) = input {
                    if !producers.contains(reference.as_str()) {
                        return Err(Error::CyclicOrUnorderedDependency {
                            step: label.to_string(),
                            reference: reference.clone(),
                        });
                    }
                }
            }

            if let DeploymentStep::WireCall { method, args, .. } = step {
                let function = parse_method(method)?;
                if function.inputs.len() != args.len() {
                    return Err(Error::invalid_arguments(format!(
                        "step `{label}`: `{method}` takes {} arguments, {} given",
                        function.inputs.len(),
                        args.len()
                    )));
                }
            }

            if !seen.insert(label) {
                return Err(Error::DuplicateStep(label.to_string()));
            }
            if step.produces_address() {
                producers.insert(label);
            }
        }

        let fingerprint = fingerprint(&self.name, &self.invariants, &self.steps)?;

        Ok(Recipe {
            name: self.name,
            invariants: self.invariants,
            steps: self.steps,
            fingerprint,
        })
    }
}

fn fingerprint(name: &str, invariants: &[SumInvariant], steps: &[DeploymentStep]) -> Result<String> {
    let json = serde_json::to_string(&(name, invariants, steps))
        .map_err(|e| Error::invalid_arguments(format!("recipe is not serializable: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
