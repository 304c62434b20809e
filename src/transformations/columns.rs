//! Column-level transformations: create, cast, remove, select, rename.

use super::require_columns;
use crate::transform::{Arguments, ParamContract, Transformation, TransformationSpec, literal};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::Value;

/// Add a column holding the same value on every row.
#[derive(Debug, Clone)]
pub struct CreateColumn {
    column_name: String,
    value: Value,
}

impl CreateColumn {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "CreateColumn",
            "Add a column with a constant value",
            ParamContract::new(["column_name", "value"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails on a missing `column_name` or a non-scalar `value`.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        let column_name = args.string("column_name")?;
        if column_name.is_empty() {
            bail!("'column_name' must not be empty");
        }
        let value = args.value("value")?.clone();
        if value.as_str() == Some("") {
            bail!("'value' must not be an empty string");
        }
        literal(&value).context("argument 'value'")?;
        Ok(Box::new(Self { column_name, value }))
    }
}

impl Transformation for CreateColumn {
    fn name(&self) -> &'static str {
        "CreateColumn"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let value = literal(&self.value)?;
        df.lazy()
            .with_column(value.alias(self.column_name.as_str()))
            .collect()
            .with_context(|| format!("Failed to create column '{}'", self.column_name))
    }
}

/// Cast columns to new data types.
#[derive(Debug, Clone)]
pub struct CastColumnTypes {
    casts: Vec<(String, DataType)>,
}

impl CastColumnTypes {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "CastColumnTypes",
            "Cast columns to float32, float64, int16, int32, int64, str or bool",
            ParamContract::new(["cast_dict"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `cast_dict` is not a mapping or names an unknown type.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        let casts = args
            .string_map("cast_dict")?
            .into_iter()
            .map(|(column, type_str)| Ok((column, parse_type_string(&type_str)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Self { casts }))
    }
}

impl Transformation for CastColumnTypes {
    fn name(&self) -> &'static str {
        "CastColumnTypes"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, self.casts.iter().map(|(column, _)| column))?;
        let exprs: Vec<Expr> = self
            .casts
            .iter()
            .map(|(column, dtype)| col(column.as_str()).strict_cast(dtype.clone()))
            .collect();
        df.lazy()
            .with_columns(exprs)
            .collect()
            .context("Failed to cast columns")
    }
}

/// Parse a type name as written in a pipeline config.
///
/// # Errors
///
/// Fails on names outside the supported set.
pub fn parse_type_string(type_str: &str) -> Result<DataType> {
    match type_str.to_lowercase().as_str() {
        "float32" => Ok(DataType::Float32),
        "float64" | "float" => Ok(DataType::Float64),
        "int16" => Ok(DataType::Int16),
        "int32" => Ok(DataType::Int32),
        "int64" | "int" => Ok(DataType::Int64),
        "str" | "string" => Ok(DataType::String),
        "bool" | "boolean" => Ok(DataType::Boolean),
        _ => bail!("Unknown type string: {type_str}"),
    }
}

/// Drop the named columns.
#[derive(Debug, Clone)]
pub struct RemoveColumns {
    columns: Vec<String>,
}

impl RemoveColumns {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "RemoveColumns",
            "Drop one or more columns",
            ParamContract::new(["columns_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `columns_name` is not a string or list of strings.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            columns: args.string_list("columns_name")?,
        }))
    }
}

impl Transformation for RemoveColumns {
    fn name(&self) -> &'static str {
        "RemoveColumns"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, &self.columns)?;
        let keep: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .filter(|name| !self.columns.iter().any(|c| c == name))
            .collect();
        Ok(df.select(keep)?)
    }
}

/// Keep only the named columns, in the given order.
#[derive(Debug, Clone)]
pub struct SelectColumns {
    columns: Vec<String>,
}

impl SelectColumns {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "SelectColumns",
            "Keep only the listed columns",
            ParamContract::new(["columns_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `columns_name` is not a string or list of strings.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            columns: args.string_list("columns_name")?,
        }))
    }
}

impl Transformation for SelectColumns {
    fn name(&self) -> &'static str {
        "SelectColumns"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, &self.columns)?;
        Ok(df.select(self.columns.iter().map(String::as_str))?)
    }
}

/// Rename a single column.
#[derive(Debug, Clone)]
pub struct RenameColumn {
    old_column_name: String,
    new_column_name: String,
}

impl RenameColumn {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "RenameColumn",
            "Rename a column",
            ParamContract::new(["old_column_name", "new_column_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if either name is missing.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            old_column_name: args.string("old_column_name")?,
            new_column_name: args.string("new_column_name")?,
        }))
    }
}

impl Transformation for RenameColumn {
    fn name(&self) -> &'static str {
        "RenameColumn"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.old_column_name])?;
        let exprs: Vec<Expr> = df
            .get_column_names()
            .into_iter()
            .map(|name| {
                if name.as_str() == self.old_column_name {
                    col(name.as_str()).alias(self.new_column_name.as_str())
                } else {
                    col(name.as_str())
                }
            })
            .collect();
        df.lazy().select(exprs).collect().with_context(|| {
            format!(
                "Failed to rename '{}' to '{}'",
                self.old_column_name, self.new_column_name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn args(value: Value) -> Arguments {
        let Value::Object(map) = value else {
            return Arguments::new(Map::new());
        };
        Arguments::new(map)
    }

    fn sample() -> DataFrame {
        df!("A" => [1i64, 2, 3], "B" => [4i64, 5, 6]).unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_create_column_constant() {
        let t = CreateColumn::from_arguments(&args(json!({"column_name": "C", "value": 7}))).unwrap();
        let out = t.apply(sample()).unwrap();
        let c = out.column("C").unwrap().as_materialized_series().i64().unwrap().clone();
        assert!(c.into_iter().all(|v| v == Some(7)));
        assert_eq!(out.width(), 3);
    }

    #[test]
    fn test_create_column_numeric_dtypes() {
        let int = CreateColumn::from_arguments(&args(json!({"column_name": "I", "value": 7}))).unwrap();
        let float = CreateColumn::from_arguments(&args(json!({"column_name": "F", "value": 2.0}))).unwrap();
        let out = float.apply(int.apply(sample()).unwrap()).unwrap();
        assert_eq!(out.column("I").unwrap().dtype(), &DataType::Int64);
        assert_eq!(out.column("F").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_create_column_rejects_empty_name_and_value() {
        assert!(CreateColumn::from_arguments(&args(json!({"column_name": "", "value": 1}))).is_err());
        assert!(CreateColumn::from_arguments(&args(json!({"column_name": "C", "value": ""}))).is_err());
        assert!(CreateColumn::from_arguments(&args(json!({"column_name": "C", "value": null}))).is_ok());
    }

    #[test]
    fn test_cast_column_types() {
        let t = CastColumnTypes::from_arguments(&args(json!({
            "cast_dict": {"A": "float32", "B": "str"}
        })))
        .unwrap();
        let out = t.apply(sample()).unwrap();
        assert_eq!(out.column("A").unwrap().dtype(), &DataType::Float32);
        assert_eq!(out.column("B").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_cast_unknown_type_fails_at_construction() {
        let result = CastColumnTypes::from_arguments(&args(json!({"cast_dict": {"A": "decimal"}})));
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_and_select_columns() {
        let removed = RemoveColumns::from_arguments(&args(json!({"columns_name": "A"})))
            .unwrap()
            .apply(sample())
            .unwrap();
        assert_eq!(names(&removed), ["B"]);

        let selected = SelectColumns::from_arguments(&args(json!({"columns_name": ["B", "A"]})))
            .unwrap()
            .apply(sample())
            .unwrap();
        assert_eq!(names(&selected), ["B", "A"]);
    }

    #[test]
    fn test_remove_missing_column_fails() {
        let t = RemoveColumns::from_arguments(&args(json!({"columns_name": ["Z"]}))).unwrap();
        let err = t.apply(sample()).unwrap_err();
        assert!(err.to_string().contains('Z'));
    }

    #[test]
    fn test_rename_column() {
        let t = RenameColumn::from_arguments(&args(json!({
            "old_column_name": "A",
            "new_column_name": "Renamed"
        })))
        .unwrap();
        let out = t.apply(sample()).unwrap();
        assert_eq!(names(&out), ["Renamed", "B"]);
    }
}
