//! Centralized error types for datamorph.
//!
//! Errors are split by the phase that raises them:
//!
//! - [`ConfigError`]: loading a pipeline config. Always fatal to the load call.
//! - [`StepError`]: a single step failing at run time. What happens next is
//!   decided by the engine's [`FailurePolicy`](crate::pipeline::FailurePolicy).
//! - [`RunError`]: a run that was aborted.
//! - [`TableError`]: reading, writing or converting tables.
//!
//! Transformation implementations themselves return [`anyhow::Result`]; the
//! engine wraps those causes into [`StepError`] together with the step name.

use crate::pipeline::validation::{ContractViolation, StepProblem};
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incomplete pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise runtime variable '{name}': {source}")]
    Variable {
        name: String,
        #[source]
        source: TableError,
    },

    #[error("runtime variable '{name}' refers back to itself")]
    RecursiveVariable { name: String },

    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("pipeline config must be a mapping of pipeline names to step lists")]
    NotAMapping,

    #[error("pipeline '{name}' not found in config (available: {})", available.join(", "))]
    MissingPipeline { name: String, available: Vec<String> },

    #[error("pipeline '{name}' must be a sequence of steps")]
    MalformedPipeline { name: String },

    #[error("invalid pipeline '{pipeline}':\n{}", render_problems(problems))]
    InvalidSteps {
        pipeline: String,
        problems: Vec<StepProblem>,
    },
}

impl ConfigError {
    /// Step problems carried by this error, empty for every other variant.
    pub fn problems(&self) -> &[StepProblem] {
        match self {
            Self::InvalidSteps { problems, .. } => problems,
            _ => &[],
        }
    }
}

fn render_problems(problems: &[StepProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failure of a single pipeline step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown transformation '{0}'")]
    UnknownTransformation(String),

    #[error(transparent)]
    Contract(ContractViolation),

    #[error("failed to instantiate {name}: {cause:#}")]
    Instantiate { name: String, cause: anyhow::Error },

    #[error("{name} failed: {cause:#}")]
    Apply { name: String, cause: anyhow::Error },
}

/// A step failure tagged with its position in the pipeline.
#[derive(Debug, Error)]
#[error("step {} ({name}): {error}", .index + 1)]
pub struct StepFailure {
    /// Zero-based position of the step.
    pub index: usize,
    /// Transformation name as written in the config.
    pub name: String,
    pub error: StepError,
}

/// A pipeline run that did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("pipeline '{pipeline}' aborted at {failure}")]
    StepFailed {
        pipeline: String,
        failure: StepFailure,
    },
}

impl RunError {
    /// The step failure that aborted the run.
    pub fn failure(&self) -> &StepFailure {
        match self {
            Self::StepFailed { failure, .. } => failure,
        }
    }
}

/// Table I/O and conversion errors.
#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("unsupported table format '{0}' (expected csv, parquet or json)")]
    UnsupportedFormat(String),

    #[error("inline table must be a JSON array of records")]
    NotRecords,
}
