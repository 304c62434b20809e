//! Pipeline data structures.
//!
//! A pipeline config is a YAML mapping of pipeline names to step lists. Each
//! step is either a bare transformation name or a single-key mapping from the
//! name to its arguments:
//!
//! ```yaml
//! clean:
//!   - DropNA:
//!       column_name: price
//!   - MathOperator:
//!       column_name: price
//!       logic: mul
//!       value: ${rate}
//!       output_column: price_eur
//! ```

use crate::error::TableError;
use crate::table::table_to_records_json;
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Tables available to steps by name for the duration of one run.
pub type AuxiliaryTables = HashMap<String, DataFrame>;

/// Values substituted into `${name}` placeholders when a config is loaded.
pub type RuntimeVariables = BTreeMap<String, RuntimeValue>;

/// One transformation invocation as written in a config.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    args: Map<String, Value>,
}

impl Step {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parse the config form of a step.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `value` is neither a string nor
    /// a single-key mapping whose value is a mapping or null.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(name) => Ok(Self::new(name.clone(), Map::new())),
            Value::Object(map) if map.len() == 1 => {
                let Some((name, args)) = map.iter().next() else {
                    return Err("empty step mapping".to_owned());
                };
                match args {
                    Value::Object(args) => Ok(Self::new(name.clone(), args.clone())),
                    Value::Null => Ok(Self::new(name.clone(), Map::new())),
                    other => Err(format!(
                        "arguments of '{name}' must be a mapping, got {}",
                        kind(other)
                    )),
                }
            }
            Value::Object(map) => Err(format!(
                "a step must have exactly one transformation name, got {}",
                map.len()
            )),
            other => Err(format!(
                "a step must be a name or a mapping, got {}",
                kind(other)
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, Value::Object(self.args.clone()))
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// A named, ordered list of steps.
///
/// Built by the loader once every step has been checked, so the step list
/// cannot change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    name: String,
    steps: Vec<Step>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Multi-line listing of the pipeline and its steps.
    pub fn describe(&self) -> String {
        let mut out = format!("Pipeline '{}' ({} steps)", self.name, self.steps.len());
        for (idx, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("\n  {}. {step}", idx + 1));
        }
        out
    }
}

/// Value bound to a runtime variable.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Substituted as a JSON array of row records.
    Table(DataFrame),
}

impl RuntimeValue {
    /// Text substituted for the placeholder.
    ///
    /// # Errors
    ///
    /// Fails only for tables polars cannot serialise.
    pub fn render(&self) -> Result<String, TableError> {
        Ok(match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => render_float(*f),
            Self::Bool(b) => b.to_string(),
            Self::Table(df) => table_to_records_json(df)?,
        })
    }
}

/// YAML float text; whole numbers keep their `.0` so they stay floats.
fn render_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_owned()
    } else {
        format!("{f:?}")
    }
}

impl From<&str> for RuntimeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RuntimeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RuntimeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RuntimeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for RuntimeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DataFrame> for RuntimeValue {
    fn from(value: DataFrame) -> Self {
        Self::Table(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use serde_json::json;

    #[test]
    fn test_bare_name_is_step_without_arguments() {
        let step = Step::from_value(&json!("DropNA")).unwrap();
        assert_eq!(step.name(), "DropNA");
        assert!(step.args().is_empty());
    }

    #[test]
    fn test_null_arguments_are_empty() {
        let step = Step::from_value(&json!({"SaveDataFrame": null})).unwrap();
        assert!(step.args().is_empty());
    }

    #[test]
    fn test_argument_order_is_preserved() {
        let step = Step::from_value(&json!({
            "RenameColumn": {"old_column_name": "A", "new_column_name": "B"}
        }))
        .unwrap();
        let keys: Vec<&String> = step.args().keys().collect();
        assert_eq!(keys, ["old_column_name", "new_column_name"]);
    }

    #[test]
    fn test_malformed_steps() {
        assert!(Step::from_value(&json!(42)).is_err());
        assert!(Step::from_value(&json!({"A": {}, "B": {}})).is_err());
        let err = Step::from_value(&json!({"DropNA": ["x"]})).unwrap_err();
        assert!(err.contains("a list"), "{err}");
    }

    #[test]
    fn test_describe_lists_steps() {
        let def = PipelineDefinition::new(
            "p",
            vec![
                Step::new("DropNA", Map::new()),
                Step::from_value(&json!({"CreateColumn": {"column_name": "C", "value": 1}})).unwrap(),
            ],
        );
        let text = def.describe();
        assert!(text.starts_with("Pipeline 'p' (2 steps)"));
        assert!(text.contains("2. CreateColumn {\"column_name\":\"C\",\"value\":1}"));
    }

    #[test]
    fn test_runtime_value_rendering() {
        assert_eq!(RuntimeValue::from(3i64).render().unwrap(), "3");
        assert_eq!(RuntimeValue::from(true).render().unwrap(), "true");
        assert_eq!(RuntimeValue::from(2.0).render().unwrap(), "2.0");
        assert_eq!(RuntimeValue::from(0.5).render().unwrap(), "0.5");
        assert_eq!(RuntimeValue::from(f64::NAN).render().unwrap(), ".nan");
        assert_eq!(RuntimeValue::from(f64::NEG_INFINITY).render().unwrap(), "-.inf");
        let table = df!("A" => [1i64]).unwrap();
        assert_eq!(RuntimeValue::from(table).render().unwrap(), r#"[{"A":1}]"#);
    }
}
