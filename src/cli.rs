use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use datamorph::config::Settings;
use datamorph::pipeline::{
    AuxiliaryTables, Engine, FailurePolicy, RuntimeValue, RuntimeVariables, ValidationMode,
};
use datamorph::registry::Registry;
use datamorph::table::{read_table, write_table};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "datamorph", about = "Run declarative table transformation pipelines")]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, default_value = "datamorph.json")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline on a table
    Run {
        /// YAML pipeline config
        #[arg(short, long)]
        config: PathBuf,

        /// Name of the pipeline in the config
        #[arg(short, long)]
        pipeline: String,

        /// Input table (CSV, Parquet, JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output table. Format follows the extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Runtime variable substituted for `${NAME}`, as NAME=VALUE
        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<(String, RuntimeValue)>,

        /// Auxiliary table available to steps by name, as NAME=FILE
        #[arg(long = "table", value_parser = parse_key_path)]
        tables: Vec<(String, PathBuf)>,

        /// Skip failing steps instead of aborting
        #[arg(long)]
        best_effort: bool,

        /// Check step arguments only when each step runs
        #[arg(long)]
        lenient: bool,
    },
    /// Load and validate a pipeline without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        pipeline: String,

        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<(String, RuntimeValue)>,
    },
    /// List the available transformations
    List,
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut settings = Settings::load_or_default(path)?;
    settings.apply_env()?;
    Ok(settings)
}

pub fn run_command(command: Commands, settings: &Settings) -> Result<()> {
    let registry = Registry::with_builtins();
    match command {
        Commands::Run {
            config,
            pipeline,
            input,
            output,
            vars,
            tables,
            best_effort,
            lenient,
        } => {
            let policy = if best_effort {
                FailurePolicy::BestEffort
            } else {
                settings.failure_policy
            };
            let mode = if lenient {
                ValidationMode::Lenient
            } else {
                settings.validation_mode
            };
            let mut engine = Engine::new(&registry)
                .with_policy(policy)
                .with_validation_mode(mode);
            handle_run(
                &mut engine,
                &config,
                &pipeline,
                &input,
                output.as_deref(),
                vars,
                tables,
            )
        }
        Commands::Validate {
            config,
            pipeline,
            vars,
        } => {
            let mut engine = Engine::new(&registry).with_validation_mode(settings.validation_mode);
            let definition = engine.load(&config, &pipeline, &vars.into_iter().collect())?;
            println!("{}", definition.describe());
            println!("OK");
            Ok(())
        }
        Commands::List => {
            for spec in registry.specs() {
                let contract = spec.contract();
                let mut params: Vec<String> = contract.required().map(str::to_owned).collect();
                params.extend(contract.optional().map(|(name, default)| format!("{name}={default}")));
                println!("{:<18} {:<60} {}", spec.name(), params.join(", "), spec.description());
            }
            Ok(())
        }
    }
}

fn handle_run(
    engine: &mut Engine<'_>,
    config: &Path,
    pipeline: &str,
    input: &Path,
    output: Option<&Path>,
    vars: Vec<(String, RuntimeValue)>,
    tables: Vec<(String, PathBuf)>,
) -> Result<()> {
    let vars: RuntimeVariables = vars.into_iter().collect();
    let definition = engine.load(config, pipeline, &vars)?;

    let mut aux = AuxiliaryTables::new();
    for (name, path) in tables {
        let table = read_table(&path)
            .with_context(|| format!("Failed to load auxiliary table '{name}'"))?;
        aux.insert(name, table);
    }

    let df = read_table(input).context("Failed to load input file")?;
    let mut report = engine.run(df, &definition, &aux)?;

    for failure in report.failures() {
        println!("Skipped {failure}");
    }
    println!("{}", report.summary());

    match output {
        Some(path) => {
            write_table(&mut report.table, path)?;
            println!("Output written to: {}", path.display());
        }
        None => println!("{}", report.table),
    }
    Ok(())
}

fn split_pair(s: &str) -> Result<(&str, &str)> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("expected NAME=VALUE, got '{s}'"),
    }
}

/// `NAME=VALUE`, with VALUE read as an integer, float or boolean when it
/// looks like one.
fn parse_variable(s: &str) -> Result<(String, RuntimeValue)> {
    let (key, value) = split_pair(s)?;
    let value = if let Ok(i) = value.parse::<i64>() {
        RuntimeValue::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        RuntimeValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        RuntimeValue::Bool(b)
    } else {
        RuntimeValue::from(value)
    };
    Ok((key.to_owned(), value))
}

fn parse_key_path(s: &str) -> Result<(String, PathBuf)> {
    let (key, path) = split_pair(s)?;
    Ok((key.to_owned(), PathBuf::from(path)))
}
