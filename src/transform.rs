//! The transformation protocol.
//!
//! Every step in a pipeline is executed by a [`Transformation`]: a stateless
//! `DataFrame -> DataFrame` operation built from validated [`Arguments`].
//! A [`TransformationSpec`] ties a name to the [`ParamContract`] its arguments
//! are checked against and to the constructor that builds the transformation.
//!
//! Built-ins live in [`crate::transformations`]; user code can provide its own
//! specs and register them as extensions on the
//! [`Registry`](crate::registry::Registry).

use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single table transformation.
///
/// Implementations must be deterministic and must not keep the table around
/// after `apply` returns.
pub trait Transformation: Send + Sync {
    /// Name this transformation is registered under.
    fn name(&self) -> &str;

    /// Transform the working table, returning its replacement.
    fn apply(&self, df: DataFrame) -> Result<DataFrame>;
}

/// Builds a transformation from its arguments.
pub type Constructor = fn(&Arguments) -> Result<Box<dyn Transformation>>;

/// Declared parameters of a transformation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamContract {
    required: Vec<String>,
    optional: Vec<(String, Value)>,
    tables: Vec<String>,
}

impl ParamContract {
    /// Contract with the given required parameters and nothing else.
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            optional: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Add an optional parameter, used with `default` when a step omits it.
    #[must_use]
    pub fn with_optional(mut self, name: impl Into<String>, default: Value) -> Self {
        self.optional.push((name.into(), default));
        self
    }

    /// Mark a declared parameter as naming a table.
    ///
    /// The engine resolves table parameters against the run's auxiliary
    /// tables before the transformation is constructed.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        self.tables.push(name.into());
        self
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn optional(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.optional.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn table_params(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Whether `name` is a declared parameter, required or optional.
    pub fn accepts(&self, name: &str) -> bool {
        self.required.iter().any(|p| p == name) || self.optional.iter().any(|(p, _)| p == name)
    }
}

/// Name, contract and constructor of a transformation.
#[derive(Debug, Clone)]
pub struct TransformationSpec {
    name: String,
    description: String,
    contract: ParamContract,
    construct: Constructor,
}

impl TransformationSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        contract: ParamContract,
        construct: Constructor,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            contract,
            construct,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn contract(&self) -> &ParamContract {
        &self.contract
    }

    /// Instantiate the transformation.
    ///
    /// # Errors
    ///
    /// Returns whatever the constructor reports, typically a missing or
    /// mistyped argument.
    pub fn construct(&self, args: &Arguments) -> Result<Box<dyn Transformation>> {
        (self.construct)(args)
    }
}

/// Arguments handed to a [`Constructor`].
///
/// Holds the step's argument mapping with contract defaults filled in, plus
/// any tables the engine resolved for table parameters.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Map<String, Value>,
    tables: HashMap<String, DataFrame>,
}

impl Arguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            tables: HashMap::new(),
        }
    }

    /// Attach a resolved table for a table parameter.
    #[must_use]
    pub fn with_table(mut self, param: impl Into<String>, table: DataFrame) -> Self {
        self.tables.insert(param.into(), table);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// # Errors
    ///
    /// Fails if `key` is absent.
    pub fn value(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .with_context(|| format!("missing argument '{key}'"))
    }

    /// A string argument. Numbers are accepted and rendered as text, since
    /// YAML turns unquoted numeric column names into numbers.
    ///
    /// # Errors
    ///
    /// Fails if `key` is absent or not a string or number.
    pub fn string(&self, key: &str) -> Result<String> {
        match self.value(key)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => bail!("argument '{key}' must be a string, got {other}"),
        }
    }

    /// A string or a list of strings, always returned as a list.
    ///
    /// # Errors
    ///
    /// Fails if `key` is absent or holds anything else.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.value(key)? {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => bail!("argument '{key}' must contain strings, got {other}"),
                })
                .collect(),
            Value::String(s) => Ok(vec![s.clone()]),
            other => bail!("argument '{key}' must be a string or a list of strings, got {other}"),
        }
    }

    /// A mapping of string to string, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails if `key` is absent or not a mapping of strings.
    pub fn string_map(&self, key: &str) -> Result<Vec<(String, String)>> {
        let Value::Object(map) = self.value(key)? else {
            bail!("argument '{key}' must be a mapping");
        };
        map.iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                other => bail!("argument '{key}.{k}' must be a string, got {other}"),
            })
            .collect()
    }

    /// A scalar argument as a polars literal expression.
    ///
    /// # Errors
    ///
    /// Fails if `key` is absent or holds a list or mapping.
    pub fn literal(&self, key: &str) -> Result<Expr> {
        literal(self.value(key)?).with_context(|| format!("argument '{key}'"))
    }

    /// The table resolved for a table parameter.
    ///
    /// # Errors
    ///
    /// Fails if no table was attached for `param`.
    pub fn table(&self, param: &str) -> Result<DataFrame> {
        self.tables
            .get(param)
            .cloned()
            .with_context(|| format!("no table supplied for argument '{param}'"))
    }
}

/// Convert a scalar JSON value into a polars literal.
///
/// Numbers become `Int64` or `Float64` literals, so a constant column keeps
/// the width of the value rather than the smallest type that fits it.
///
/// # Errors
///
/// Lists and mappings have no scalar literal.
pub fn literal(value: &Value) -> Result<Expr> {
    Ok(match value {
        Value::Null => lit(NULL),
        Value::Bool(b) => lit(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => lit(i).cast(DataType::Int64),
            None => lit(n.as_f64().context("number out of range")?).cast(DataType::Float64),
        },
        Value::String(s) => lit(s.as_str()),
        Value::Array(_) | Value::Object(_) => bail!("expected a scalar value, got {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => Arguments::new(map),
            _ => unreachable!("test arguments must be an object"),
        }
    }

    #[test]
    fn test_contract_accepts_required_and_optional() {
        let contract = ParamContract::new(["a", "b"]).with_optional("c", json!(1));
        assert!(contract.accepts("a"));
        assert!(contract.accepts("c"));
        assert!(!contract.accepts("d"));
        assert_eq!(contract.required().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_string_list_accepts_single_string() {
        let a = args(json!({"cols": "A", "many": ["B", "C"]}));
        assert_eq!(a.string_list("cols").unwrap(), ["A"]);
        assert_eq!(a.string_list("many").unwrap(), ["B", "C"]);
    }

    #[test]
    fn test_numeric_column_name_is_rendered() {
        let a = args(json!({"column_name": 2024}));
        assert_eq!(a.string("column_name").unwrap(), "2024");
    }

    #[test]
    fn test_missing_argument_is_named() {
        let a = args(json!({}));
        let err = a.string("column_name").unwrap_err();
        assert!(err.to_string().contains("column_name"));
    }

    #[test]
    fn test_literal_rejects_lists() {
        assert!(literal(&json!([1, 2])).is_err());
        assert!(literal(&json!(1.5)).is_ok());
        assert!(literal(&json!(null)).is_ok());
    }

    #[test]
    fn test_missing_table_is_reported() {
        let a = Arguments::default();
        assert!(a.table("df_to_join").is_err());
    }
}
