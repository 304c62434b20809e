//! Loading pipeline configs.
//!
//! Loading happens in this order:
//!
//! 1. `${name}` placeholders in the raw text are replaced with the values of
//!    the runtime variables (tables become JSON records);
//! 2. the text is parsed as YAML;
//! 3. the requested pipeline is picked out and every step is parsed;
//! 4. in [`ValidationMode::Strict`] every step is resolved and its arguments
//!    are checked.
//!
//! Every step problem is reported together in one [`ConfigError::InvalidSteps`].

use super::spec::{PipelineDefinition, RuntimeVariables, Step};
use super::validation::{StepProblem, ValidationMode, check_step};
use crate::error::ConfigError;
use crate::registry::Registry;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Replace `${name}` with the rendered value of each known variable.
///
/// A value may itself contain placeholders; replacement repeats until no
/// placeholder naming a known variable is left. Placeholders without a
/// matching variable are left untouched.
///
/// # Errors
///
/// Fails if a table variable cannot be serialised, or if variables refer to
/// each other in a cycle.
pub fn substitute_variables(text: &str, vars: &RuntimeVariables) -> Result<String, ConfigError> {
    if vars.is_empty() {
        return Ok(text.to_owned());
    }

    let rendered = vars
        .iter()
        .map(|(name, value)| {
            value
                .render()
                .map(|text| (name.as_str(), text))
                .map_err(|source| ConfigError::Variable {
                    name: name.clone(),
                    source,
                })
        })
        .collect::<Result<HashMap<&str, String>, _>>()?;

    // A chain of references is at most one pass per variable long.
    let mut text = text.to_owned();
    for _ in 0..=rendered.len() {
        if first_known_placeholder(&text, &rendered).is_none() {
            return Ok(text);
        }
        text = PLACEHOLDER
            .replace_all(&text, |caps: &Captures<'_>| {
                rendered
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned();
    }
    match first_known_placeholder(&text, &rendered) {
        Some(name) => Err(ConfigError::RecursiveVariable { name }),
        None => Ok(text),
    }
}

fn first_known_placeholder(text: &str, rendered: &HashMap<&str, String>) -> Option<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_owned())
        .find(|name| rendered.contains_key(name.as_str()))
}

/// Load `pipeline_name` from a YAML config file.
///
/// # Errors
///
/// See [`parse_pipeline_config`]; also fails if the file cannot be read.
pub fn load_pipeline_config(
    path: impl AsRef<Path>,
    pipeline_name: &str,
    vars: &RuntimeVariables,
    registry: &Registry,
    mode: ValidationMode,
) -> Result<PipelineDefinition, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Loading pipeline '{pipeline_name}' from {}", path.display());
    parse_pipeline_config(&text, pipeline_name, vars, registry, mode)
}

/// Load `pipeline_name` from YAML config text.
///
/// # Errors
///
/// Fails if substitution or YAML parsing fails, the pipeline is missing or
/// not a list, or (see [`ValidationMode`]) any step is malformed, unknown or
/// breaks its argument contract.
pub fn parse_pipeline_config(
    text: &str,
    pipeline_name: &str,
    vars: &RuntimeVariables,
    registry: &Registry,
    mode: ValidationMode,
) -> Result<PipelineDefinition, ConfigError> {
    let text = substitute_variables(text, vars)?;
    let config: Value = serde_yaml::from_str(&text)?;
    let Value::Object(pipelines) = config else {
        return Err(ConfigError::NotAMapping);
    };

    let Some(raw_steps) = pipelines.get(pipeline_name) else {
        return Err(ConfigError::MissingPipeline {
            name: pipeline_name.to_owned(),
            available: pipelines.keys().cloned().collect(),
        });
    };
    let raw_steps: &[Value] = match raw_steps {
        Value::Array(items) => items,
        Value::Null => &[],
        _ => {
            return Err(ConfigError::MalformedPipeline {
                name: pipeline_name.to_owned(),
            });
        }
    };

    let mut steps = Vec::with_capacity(raw_steps.len());
    let mut problems = Vec::new();
    for (index, raw) in raw_steps.iter().enumerate() {
        match Step::from_value(raw) {
            Ok(step) => {
                if mode == ValidationMode::Strict
                    && let Some(problem) = check_step(index, &step, registry)
                {
                    problems.push(problem);
                }
                steps.push(step);
            }
            Err(detail) => problems.push(StepProblem::Malformed { index, detail }),
        }
    }
    if !problems.is_empty() {
        return Err(ConfigError::InvalidSteps {
            pipeline: pipeline_name.to_owned(),
            problems,
        });
    }

    Ok(PipelineDefinition::new(pipeline_name, steps))
}

/// Log the pipeline and each of its steps at `info` level.
pub fn log_pipeline_config(definition: &PipelineDefinition) {
    tracing::info!(
        "Loading pipeline '{}' with {} step(s)",
        definition.name(),
        definition.len()
    );
    for (idx, step) in definition.steps().iter().enumerate() {
        tracing::info!("  {}. {step}", idx + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::spec::RuntimeValue;
    use polars::prelude::*;

    const CONFIG: &str = r"
pipeline_a:
  - CreateColumn:
      column_name: C
      value: ${constant}
  - DropNA:
      column_name: C
pipeline_empty:
pipeline_bad: 3
";

    fn vars(pairs: &[(&str, RuntimeValue)]) -> RuntimeVariables {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitution_replaces_known_and_keeps_unknown() {
        let out = substitute_variables(
            "a: ${x}\nb: ${y}\nc: ${x}",
            &vars(&[("x", RuntimeValue::from(5i64))]),
        )
        .unwrap();
        assert_eq!(out, "a: 5\nb: ${y}\nc: 5");
    }

    #[test]
    fn test_substitution_resolves_nested_variables() {
        let out = substitute_variables(
            "v: ${a}",
            &vars(&[
                ("a", RuntimeValue::from("${b}-${c}")),
                ("b", RuntimeValue::from("${c}")),
                ("c", RuntimeValue::from("x")),
            ]),
        )
        .unwrap();
        assert_eq!(out, "v: x-x");
    }

    #[test]
    fn test_cyclic_variables_are_rejected() {
        let err = substitute_variables(
            "v: ${a}",
            &vars(&[("a", RuntimeValue::from("${b}")), ("b", RuntimeValue::from("[${a}]"))]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::RecursiveVariable { .. }), "{err}");
    }

    #[test]
    fn test_table_variable_becomes_records() {
        let table = df!("A" => [1i64, 2]).unwrap();
        let out = substitute_variables("t: ${t}", &vars(&[("t", RuntimeValue::from(table))])).unwrap();
        assert_eq!(out, r#"t: [{"A":1},{"A":2}]"#);
    }

    #[test]
    fn test_parse_named_pipeline() {
        let registry = Registry::with_builtins();
        let def = parse_pipeline_config(
            CONFIG,
            "pipeline_a",
            &vars(&[("constant", RuntimeValue::from(7i64))]),
            &registry,
            ValidationMode::Strict,
        )
        .unwrap();
        assert_eq!(def.name(), "pipeline_a");
        assert_eq!(def.len(), 2);
        assert_eq!(def.steps()[0].args()["value"], Value::from(7));
    }

    #[test]
    fn test_whole_float_variable_stays_float() {
        let registry = Registry::with_builtins();
        let def = parse_pipeline_config(
            CONFIG,
            "pipeline_a",
            &vars(&[("constant", RuntimeValue::from(2.0))]),
            &registry,
            ValidationMode::Strict,
        )
        .unwrap();
        let value = &def.steps()[0].args()["value"];
        assert!(value.is_f64(), "{value}");
        assert_eq!(value.as_f64(), Some(2.0));
    }

    #[test]
    fn test_null_pipeline_has_no_steps() {
        let registry = Registry::with_builtins();
        let def = parse_pipeline_config(
            CONFIG,
            "pipeline_empty",
            &RuntimeVariables::new(),
            &registry,
            ValidationMode::Strict,
        )
        .unwrap();
        assert!(def.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_pipelines() {
        let registry = Registry::with_builtins();
        let none = RuntimeVariables::new();
        let missing =
            parse_pipeline_config(CONFIG, "nope", &none, &registry, ValidationMode::Strict)
                .unwrap_err();
        assert!(
            matches!(&missing, ConfigError::MissingPipeline { available, .. } if available.len() == 3)
        );
        let bad = parse_pipeline_config(CONFIG, "pipeline_bad", &none, &registry, ValidationMode::Strict)
            .unwrap_err();
        assert!(matches!(bad, ConfigError::MalformedPipeline { .. }));
        assert!(matches!(
            parse_pipeline_config("- a\n- b", "x", &none, &registry, ValidationMode::Strict),
            Err(ConfigError::NotAMapping)
        ));
    }

    #[test]
    fn test_malformed_step_is_reported() {
        let registry = Registry::with_builtins();
        let err = parse_pipeline_config(
            "p:\n  - 12\n",
            "p",
            &RuntimeVariables::new(),
            &registry,
            ValidationMode::Lenient,
        )
        .unwrap_err();
        assert!(matches!(
            err.problems(),
            [StepProblem::Malformed { index: 0, .. }]
        ));
    }

    #[test]
    fn test_lenient_mode_defers_contract_checks() {
        let registry = Registry::with_builtins();
        let text = "p:\n  - Teleport:\n      to: mars\n";
        let none = RuntimeVariables::new();
        assert!(parse_pipeline_config(text, "p", &none, &registry, ValidationMode::Strict).is_err());
        let def = parse_pipeline_config(text, "p", &none, &registry, ValidationMode::Lenient).unwrap();
        assert_eq!(def.steps()[0].name(), "Teleport");
    }
}
