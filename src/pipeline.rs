//! Pipeline configuration and execution.
//!
//! A pipeline is an ordered list of named transformation steps read from a
//! YAML config. Loading resolves every name against a
//! [`Registry`](crate::registry::Registry) and checks each step's arguments;
//! running applies the steps to a table one after another.
//!
//! # Example
//!
//! ```no_run
//! use datamorph::pipeline::{
//!     AuxiliaryTables, RuntimeVariables, ValidationMode, load_pipeline_config, run_pipeline,
//! };
//! use datamorph::registry::Registry;
//! use datamorph::table::read_table;
//! use std::path::Path;
//!
//! let registry = Registry::with_builtins();
//! let mut vars = RuntimeVariables::new();
//! vars.insert("rate".to_owned(), 0.92.into());
//!
//! let definition = load_pipeline_config(
//!     "pipelines.yaml",
//!     "to_eur",
//!     &vars,
//!     &registry,
//!     ValidationMode::Strict,
//! )?;
//! let input = read_table(Path::new("prices.csv"))?;
//! let output = run_pipeline(input, &definition, &AuxiliaryTables::new(), &registry)?;
//! println!("{output}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod executor;
pub mod loader;
pub mod spec;
pub mod validation;

pub use executor::{
    Engine, EngineState, FailurePolicy, RunReport, StepOutcome, run_pipeline,
};
pub use loader::{
    load_pipeline_config, log_pipeline_config, parse_pipeline_config, substitute_variables,
};
pub use spec::{AuxiliaryTables, PipelineDefinition, RuntimeValue, RuntimeVariables, Step};
pub use validation::{
    ContractViolation, StepProblem, ValidationMode, check_arguments, validate_steps,
};
