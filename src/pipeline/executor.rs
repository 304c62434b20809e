//! Pipeline execution engine.
//!
//! Applies the steps of a [`PipelineDefinition`] to a table in order. Each
//! step name is resolved again at execution time, so an extension registered
//! after loading still takes effect. What happens when a step fails is decided
//! by the engine's [`FailurePolicy`].

use super::loader::{load_pipeline_config, log_pipeline_config, parse_pipeline_config};
use super::spec::{AuxiliaryTables, PipelineDefinition, RuntimeVariables, Step};
use super::validation::{ValidationMode, check_arguments};
use crate::error::{ConfigError, RunError, StepError, StepFailure};
use crate::registry::Registry;
use crate::table::records_to_table;
use crate::transform::{Arguments, TransformationSpec};
use anyhow::{Context as _, bail};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};

/// What the engine does when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run and return the failure. No partial table is returned.
    #[default]
    FailFast,
    /// Record the failure, keep the table from before the step and continue.
    BestEffort,
}

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Validating,
    Running,
    Completed,
    Failed,
}

/// Result of a single step.
#[derive(Debug)]
pub enum StepOutcome {
    Applied {
        name: String,
        /// `(rows, columns)` after the step.
        shape: (usize, usize),
    },
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Report generated after a pipeline run
#[derive(Debug)]
pub struct RunReport {
    pub pipeline: String,

    /// Final working table
    pub table: DataFrame,

    /// One outcome per step, in execution order
    pub outcomes: Vec<StepOutcome>,

    /// `(rows, columns)` of the input table
    pub shape_before: (usize, usize),

    /// `(rows, columns)` of the final table
    pub shape_after: (usize, usize),

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    pub fn steps_applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    /// Failures recorded under [`FailurePolicy::BestEffort`].
    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            StepOutcome::Failed(failure) => Some(failure),
            StepOutcome::Applied { .. } => None,
        })
    }

    pub fn into_table(self) -> DataFrame {
        self.table
    }

    /// Create a summary message
    pub fn summary(&self) -> String {
        let failed = self.outcomes.len() - self.steps_applied();
        let mut summary = format!(
            "Pipeline '{}' completed: rows {} → {}, columns {} → {}, {}/{} steps applied, {:.2}s",
            self.pipeline,
            self.shape_before.0,
            self.shape_after.0,
            self.shape_before.1,
            self.shape_after.1,
            self.steps_applied(),
            self.outcomes.len(),
            self.duration.as_secs_f64()
        );
        if failed > 0 {
            summary.push_str(&format!(" ({failed} failed)"));
        }
        summary
    }
}

/// Runs pipelines against a registry.
///
/// ```no_run
/// use datamorph::pipeline::{AuxiliaryTables, Engine, RuntimeVariables};
/// use datamorph::registry::Registry;
/// use polars::prelude::*;
///
/// let registry = Registry::with_builtins();
/// let mut engine = Engine::new(&registry);
/// let definition = engine.load("pipelines.yaml", "clean", &RuntimeVariables::new())?;
/// let input = df!("price" => [Some(1.0), None])?;
/// let report = engine.run(input, &definition, &AuxiliaryTables::new())?;
/// println!("{}", report.summary());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Engine<'r> {
    registry: &'r Registry,
    policy: FailurePolicy,
    mode: ValidationMode,
    state: EngineState,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            policy: FailurePolicy::default(),
            mode: ValidationMode::default(),
            state: EngineState::Idle,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.mode
    }

    /// Load and validate a pipeline from a YAML file.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; the engine is then [`EngineState::Failed`].
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        pipeline_name: &str,
        vars: &RuntimeVariables,
    ) -> Result<PipelineDefinition, ConfigError> {
        self.state = EngineState::Validating;
        let loaded = load_pipeline_config(path, pipeline_name, vars, self.registry, self.mode);
        self.finish_load(loaded)
    }

    /// Load and validate a pipeline from YAML text.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; the engine is then [`EngineState::Failed`].
    pub fn load_str(
        &mut self,
        text: &str,
        pipeline_name: &str,
        vars: &RuntimeVariables,
    ) -> Result<PipelineDefinition, ConfigError> {
        self.state = EngineState::Validating;
        let loaded = parse_pipeline_config(text, pipeline_name, vars, self.registry, self.mode);
        self.finish_load(loaded)
    }

    fn finish_load(
        &mut self,
        loaded: Result<PipelineDefinition, ConfigError>,
    ) -> Result<PipelineDefinition, ConfigError> {
        match &loaded {
            Ok(_) => self.state = EngineState::Running,
            Err(e) => {
                tracing::error!("{e}");
                self.state = EngineState::Failed;
            }
        }
        loaded
    }

    /// Apply every step of `definition` to `table`.
    ///
    /// Every step is resolved and contract-checked again as it is reached, so
    /// definitions built by hand rather than loaded are accepted too.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::FailFast`], the first failing step.
    pub fn run(
        &mut self,
        table: DataFrame,
        definition: &PipelineDefinition,
        aux: &AuxiliaryTables,
    ) -> Result<RunReport, RunError> {
        let start = Instant::now();
        self.state = EngineState::Running;
        log_pipeline_config(definition);

        let shape_before = table.shape();
        let mut table = table;
        let mut outcomes = Vec::with_capacity(definition.len());

        for (index, step) in definition.steps().iter().enumerate() {
            match self.execute_step(step, &table, aux) {
                Ok(next) => {
                    let shape = next.shape();
                    tracing::debug!("Step {} ({}) applied, shape {shape:?}", index + 1, step.name());
                    table = next;
                    outcomes.push(StepOutcome::Applied {
                        name: step.name().to_owned(),
                        shape,
                    });
                }
                Err(error) => {
                    let failure = StepFailure {
                        index,
                        name: step.name().to_owned(),
                        error,
                    };
                    tracing::error!("Step {} ({}) failed: {}", index + 1, step.name(), failure.error);
                    match self.policy {
                        FailurePolicy::FailFast => {
                            self.state = EngineState::Failed;
                            return Err(RunError::StepFailed {
                                pipeline: definition.name().to_owned(),
                                failure,
                            });
                        }
                        FailurePolicy::BestEffort => {
                            tracing::warn!("Skipping step {} ({})", index + 1, step.name());
                            outcomes.push(StepOutcome::Failed(failure));
                        }
                    }
                }
            }
        }

        self.state = EngineState::Completed;
        let report = RunReport {
            pipeline: definition.name().to_owned(),
            shape_after: table.shape(),
            table,
            outcomes,
            shape_before,
            duration: start.elapsed(),
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    fn execute_step(
        &self,
        step: &Step,
        table: &DataFrame,
        aux: &AuxiliaryTables,
    ) -> Result<DataFrame, StepError> {
        let spec = self
            .registry
            .resolve(step.name())
            .ok_or_else(|| StepError::UnknownTransformation(step.name().to_owned()))?;

        check_arguments(spec.name(), spec.contract(), step.args()).map_err(StepError::Contract)?;

        let instantiate = |cause| StepError::Instantiate {
            name: step.name().to_owned(),
            cause,
        };
        let args = build_arguments(spec, step, aux).map_err(instantiate)?;
        let transformation = spec.construct(&args).map_err(instantiate)?;
        tracing::trace!("Applying {} to shape {:?}", transformation.name(), table.shape());

        transformation
            .apply(table.clone())
            .map_err(|cause| StepError::Apply {
                name: step.name().to_owned(),
                cause,
            })
    }
}

/// Step arguments with contract defaults filled in and table parameters
/// resolved.
///
/// A table parameter holds either the name of an auxiliary table or an inline
/// array of JSON records.
fn build_arguments(
    spec: &TransformationSpec,
    step: &Step,
    aux: &AuxiliaryTables,
) -> anyhow::Result<Arguments> {
    let mut values = step.args().clone();
    for (name, default) in spec.contract().optional() {
        if !values.contains_key(name) {
            values.insert(name.to_owned(), default.clone());
        }
    }

    let mut tables = Vec::new();
    for param in spec.contract().table_params() {
        let table = match values.get(param) {
            None => continue,
            Some(Value::String(name)) => aux
                .get(name)
                .cloned()
                .with_context(|| format!("auxiliary table '{name}' was not supplied"))?,
            Some(records @ Value::Array(_)) => records_to_table(records)
                .with_context(|| format!("argument '{param}' is not a valid records table"))?,
            Some(other) => {
                bail!("argument '{param}' must name an auxiliary table, got {other}")
            }
        };
        tables.push((param, table));
    }

    Ok(tables
        .into_iter()
        .fold(Arguments::new(values), |args, (param, table)| args.with_table(param, table)))
}

/// Run a pipeline fail-fast and return the final table.
///
/// # Errors
///
/// The first failing step.
pub fn run_pipeline(
    table: DataFrame,
    definition: &PipelineDefinition,
    aux: &AuxiliaryTables,
    registry: &Registry,
) -> Result<DataFrame, RunError> {
    Engine::new(registry)
        .run(table, definition, aux)
        .map(RunReport::into_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ParamContract, Transformation};
    use serde_json::json;

    const CONFIG: &str = r"
zero: []
double:
  - MathOperator:
      column_name: A
      logic: mul
      value: 2
      output_column: A
broken:
  - RemoveColumns:
      columns_name: [Z]
  - CreateColumn:
      column_name: C
      value: 1
merge:
  - MergeDataFrames:
      df_to_join: lookup
      join_cols: [A]
      how: left
      suffixes: [_l, _r]
";

    fn sample() -> DataFrame {
        df!("A" => [1i64, 2, 3], "B" => [4i64, 5, 6]).unwrap()
    }

    fn load(engine: &mut Engine<'_>, name: &str) -> PipelineDefinition {
        engine.load_str(CONFIG, name, &RuntimeVariables::new()).unwrap()
    }

    /// Adds a constant `tag` column.
    struct Tag {
        tag: String,
    }

    impl Transformation for Tag {
        fn name(&self) -> &'static str {
            "CreateColumn"
        }

        fn apply(&self, df: DataFrame) -> anyhow::Result<DataFrame> {
            Ok(df.lazy().with_column(lit(self.tag.as_str()).alias("tag")).collect()?)
        }
    }

    fn tag_from_arguments(args: &Arguments) -> anyhow::Result<Box<dyn Transformation>> {
        Ok(Box::new(Tag {
            tag: args.string("tag")?,
        }))
    }

    fn tag_spec() -> TransformationSpec {
        TransformationSpec::new(
            "CreateColumn",
            "test extension",
            ParamContract::new(Vec::<String>::new()).with_optional("tag", json!("extension")),
            tag_from_arguments,
        )
    }

    #[test]
    fn test_load_moves_to_running() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        assert_eq!(engine.state(), EngineState::Idle);
        load(&mut engine, "zero");
        assert_eq!(engine.state(), EngineState::Running);

        assert!(engine.load_str(CONFIG, "missing", &RuntimeVariables::new()).is_err());
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_zero_steps_is_identity() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        let definition = load(&mut engine, "zero");
        let report = engine.run(sample(), &definition, &AuxiliaryTables::new()).unwrap();
        assert!(report.table.equals(&sample()));
        assert_eq!(engine.state(), EngineState::Completed);
    }

    #[test]
    fn test_fail_fast_names_the_step() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        let definition = load(&mut engine, "broken");
        let err = engine.run(sample(), &definition, &AuxiliaryTables::new()).unwrap_err();
        assert_eq!(err.failure().index, 0);
        assert_eq!(err.failure().name, "RemoveColumns");
        assert!(matches!(err.failure().error, StepError::Apply { .. }));
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_best_effort_keeps_previous_table() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry).with_policy(FailurePolicy::BestEffort);
        let definition = load(&mut engine, "broken");
        let report = engine.run(sample(), &definition, &AuxiliaryTables::new()).unwrap();
        assert_eq!(report.steps_applied(), 1);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.shape_after, (3, 3));
        assert!(report.summary().contains("(1 failed)"));
        assert_eq!(engine.state(), EngineState::Completed);
    }

    #[test]
    fn test_unknown_name_fails_at_execution_when_lenient() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry).with_validation_mode(ValidationMode::Lenient);
        let definition = engine
            .load_str("p:\n  - Teleport\n", "p", &RuntimeVariables::new())
            .unwrap();
        let err = engine.run(sample(), &definition, &AuxiliaryTables::new()).unwrap_err();
        assert!(matches!(
            &err.failure().error,
            StepError::UnknownTransformation(name) if name == "Teleport"
        ));
    }

    #[test]
    fn test_extension_registered_after_load_is_used() {
        let mut registry = Registry::with_builtins();
        let definition = PipelineDefinition::new("p", vec![Step::new("CreateColumn", serde_json::Map::new())]);
        registry.register_extension(tag_spec());

        let out = run_pipeline(sample(), &definition, &AuxiliaryTables::new(), &registry).unwrap();
        let tag = out.column("tag").unwrap().as_materialized_series().str().unwrap().get(0);
        assert_eq!(tag, Some("extension"));
    }

    #[test]
    fn test_auxiliary_table_is_injected() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        let definition = load(&mut engine, "merge");
        let mut aux = AuxiliaryTables::new();
        aux.insert("lookup".to_owned(), df!("A" => [1i64], "B" => [40i64]).unwrap());

        let report = engine.run(sample(), &definition, &aux).unwrap();
        assert_eq!(report.shape_after, (3, 3));
        assert!(report.table.column("B_r").is_ok());
    }

    #[test]
    fn test_missing_auxiliary_table_is_an_instantiation_error() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        let definition = load(&mut engine, "merge");
        let err = engine.run(sample(), &definition, &AuxiliaryTables::new()).unwrap_err();
        let StepError::Instantiate { cause, .. } = &err.failure().error else {
            panic!("expected an instantiation error, got {err}");
        };
        assert!(cause.to_string().contains("lookup"));
    }

    #[test]
    fn test_two_step_math() {
        let registry = Registry::with_builtins();
        let mut engine = Engine::new(&registry);
        let definition = load(&mut engine, "double");
        let twice = PipelineDefinition::new(
            "twice",
            [definition.steps(), definition.steps()].concat(),
        );
        let out = engine.run(sample(), &twice, &AuxiliaryTables::new()).unwrap().into_table();
        let a: Vec<Option<i64>> = out
            .column("A")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(a, [Some(4), Some(8), Some(12)]);
    }
}
