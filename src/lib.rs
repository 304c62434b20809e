//! # datamorph - declarative table transformation pipelines
//!
//! Pipelines are described in YAML as ordered lists of named transformation
//! steps and applied to a polars [`DataFrame`](polars::prelude::DataFrame):
//!
//! ```yaml
//! pipeline_food:
//!   - CreateColumn:
//!       column_name: food
//!       value: ${food}
//!   - MathOperator:
//!       column_name: price
//!       logic: mul
//!       value: 1.2
//!       output_column: price_with_tax
//!   - SaveDataFrame:
//!       file_name: checkpoint
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use datamorph::pipeline::{AuxiliaryTables, Engine, RuntimeVariables};
//! use datamorph::registry::Registry;
//! use polars::prelude::*;
//!
//! let registry = Registry::with_builtins();
//! let mut vars = RuntimeVariables::new();
//! vars.insert("food".to_owned(), "pizza".into());
//!
//! let mut engine = Engine::new(&registry);
//! let definition = engine.load("pipelines.yaml", "pipeline_food", &vars)?;
//! let input = df!("price" => [10.0, 12.5])?;
//! let report = engine.run(input, &definition, &AuxiliaryTables::new())?;
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`pipeline`]: config loading, argument checking and the execution engine
//! - [`registry`]: name lookup over built-in and extension transformations
//! - [`transform`]: the [`Transformation`](transform::Transformation) trait and
//!   parameter contracts
//! - [`transformations`]: the built-in transformations
//! - [`table`]: reading and writing tables, JSON records conversion
//! - [`error`]: error types
//! - [`config`], [`logging`]: settings and `tracing` setup for the binary
//!
//! ## Extensions
//!
//! Any [`TransformationSpec`](transform::TransformationSpec) can be registered
//! with [`Registry::register_extension`](registry::Registry::register_extension).
//! An extension named like a built-in replaces it for validation and execution.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod table;
pub mod transform;
pub mod transformations;
