//! Argument contract checking.
//!
//! Every step's arguments are compared against the [`ParamContract`] of the
//! transformation it names. Missing and unexpected arguments are collected
//! together so one pass reports everything wrong with a step.

use super::spec::Step;
use crate::registry::Registry;
use crate::transform::ParamContract;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// When argument contracts are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Check every step when the config is loaded.
    #[default]
    Strict,
    /// Defer name resolution and contract checks to execution.
    Lenient,
}

/// Arguments of a step that do not match its transformation's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    pub transformation: String,
    /// Required parameters absent from the step, in contract order.
    pub missing: Vec<String>,
    /// Step arguments the contract does not declare, in step order.
    pub extra: Vec<String>,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.transformation;
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing required arguments for {name}: {:?}", self.missing));
        }
        if !self.extra.is_empty() {
            parts.push(format!("Unexpected arguments for {name}: {:?}", self.extra));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ContractViolation {}

/// Check `args` against `contract`.
///
/// # Errors
///
/// Returns a [`ContractViolation`] listing every missing and every unexpected
/// argument.
pub fn check_arguments(
    transformation: &str,
    contract: &ParamContract,
    args: &Map<String, Value>,
) -> Result<(), ContractViolation> {
    let missing: Vec<String> = contract
        .required()
        .filter(|param| !args.contains_key(*param))
        .map(str::to_owned)
        .collect();
    let extra: Vec<String> = args
        .keys()
        .filter(|key| !contract.accepts(key))
        .cloned()
        .collect();

    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(ContractViolation {
            transformation: transformation.to_owned(),
            missing,
            extra,
        })
    }
}

/// A problem with one step of a pipeline config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepProblem {
    #[error("step {}: {detail}", .index + 1)]
    Malformed { index: usize, detail: String },

    #[error("step {}: unknown transformation '{name}'", .index + 1)]
    UnknownTransformation { index: usize, name: String },

    #[error("step {}: {violation}", .index + 1)]
    Contract {
        index: usize,
        violation: ContractViolation,
    },
}

impl StepProblem {
    /// Zero-based position of the offending step.
    pub fn index(&self) -> usize {
        match self {
            Self::Malformed { index, .. }
            | Self::UnknownTransformation { index, .. }
            | Self::Contract { index, .. } => *index,
        }
    }
}

/// Resolve one step and check its arguments.
pub fn check_step(index: usize, step: &Step, registry: &Registry) -> Option<StepProblem> {
    let Some(spec) = registry.resolve(step.name()) else {
        return Some(StepProblem::UnknownTransformation {
            index,
            name: step.name().to_owned(),
        });
    };
    check_arguments(spec.name(), spec.contract(), step.args())
        .err()
        .map(|violation| StepProblem::Contract { index, violation })
}

/// Resolve and contract-check every step.
///
/// In [`ValidationMode::Lenient`] nothing is checked here; the engine checks
/// each step as it reaches it.
pub fn validate_steps(steps: &[Step], registry: &Registry, mode: ValidationMode) -> Vec<StepProblem> {
    if mode == ValidationMode::Lenient {
        return Vec::new();
    }
    steps
        .iter()
        .enumerate()
        .filter_map(|(index, step)| check_step(index, step, registry))
        .collect()
}
