//! # datamorph command line
//!
//! ```text
//! datamorph run --config pipelines.yaml --pipeline clean --input in.csv --output out.parquet
//! datamorph validate --config pipelines.yaml --pipeline clean
//! datamorph list
//! ```
//!
//! Settings are read from `datamorph.json` (or `--settings`) when present and
//! can be overridden with `DATAMORPH_FAILURE_POLICY` and `DATAMORPH_LOG_LEVEL`.
//! `RUST_LOG` takes precedence over the configured log level.

#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let settings = cli::load_settings(&cli.settings)?;
    let _guard = datamorph::logging::init(&settings)?;

    cli::run_command(cli.command, &settings)
}
