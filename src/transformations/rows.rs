//! Row-level transformations: null handling and filtering.

use super::require_columns;
use crate::transform::{Arguments, ParamContract, Transformation, TransformationSpec, literal};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::Value;
use std::str::FromStr;

/// Drop rows holding a null in any of the given columns; NaN counts as null
/// for float columns.
#[derive(Debug, Clone)]
pub struct DropNA {
    columns: Vec<String>,
}

impl DropNA {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "DropNA",
            "Drop rows with a null in the given column(s)",
            ParamContract::new(["column_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `column_name` is not a string or list of strings.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            columns: args.string_list("column_name")?,
        }))
    }
}

impl Transformation for DropNA {
    fn name(&self) -> &'static str {
        "DropNA"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, &self.columns)?;
        let float_columns: Vec<bool> = self
            .columns
            .iter()
            .map(|c| df.column(c).map(|s| s.dtype().is_float()))
            .collect::<PolarsResult<_>>()?;
        let mut lf = df.lazy();
        for (column, is_float) in self.columns.iter().zip(float_columns) {
            let mut keep = col(column.as_str()).is_not_null();
            if is_float {
                keep = keep.and(col(column.as_str()).is_not_nan());
            }
            lf = lf.filter(keep);
        }
        lf.collect().context("Failed to drop null rows")
    }
}

/// Replace nulls in a column; NaN is treated as null for float columns.
#[derive(Debug, Clone)]
pub struct FillNA {
    column_name: String,
    value: Value,
}

impl FillNA {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "FillNA",
            "Fill nulls in a column with a value",
            ParamContract::new(["column_name", "value"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails on a missing `column_name` or a non-scalar `value`.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        let value = args.value("value")?.clone();
        literal(&value).context("argument 'value'")?;
        Ok(Box::new(Self {
            column_name: args.string("column_name")?,
            value,
        }))
    }
}

impl Transformation for FillNA {
    fn name(&self) -> &'static str {
        "FillNA"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.column_name])?;
        let is_float = df.column(&self.column_name)?.dtype().is_float();
        let fill = literal(&self.value)?;

        let mut expr = col(self.column_name.as_str());
        if is_float {
            expr = expr.fill_nan(fill.clone());
        }
        df.lazy()
            .with_column(expr.fill_null(fill).alias(self.column_name.as_str()))
            .collect()
            .with_context(|| format!("Failed to fill nulls in '{}'", self.column_name))
    }
}

/// Comparison named by `FilterRows`' `logic` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl FromStr for Comparison {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "ge" => Ok(Self::Ge),
            "gt" => Ok(Self::Gt),
            _ => bail!("unknown logic '{s}' (expected lt, le, eq, ne, ge or gt)"),
        }
    }
}

impl Comparison {
    pub fn expr(self, lhs: Expr, rhs: Expr) -> Expr {
        match self {
            Self::Lt => lhs.lt(rhs),
            Self::Le => lhs.lt_eq(rhs),
            Self::Eq => lhs.eq(rhs),
            Self::Ne => lhs.neq(rhs),
            Self::Ge => lhs.gt_eq(rhs),
            Self::Gt => lhs.gt(rhs),
        }
    }
}

/// Keep rows where `first_column <logic> second_column` holds.
#[derive(Debug, Clone)]
pub struct FilterRows {
    first_column: String,
    second_column: String,
    logic: Comparison,
}

impl FilterRows {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "FilterRows",
            "Keep rows where a comparison between two columns holds",
            ParamContract::new(["first_column", "second_column", "logic"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails on a missing argument or unknown `logic`.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            first_column: args.string("first_column")?,
            second_column: args.string("second_column")?,
            logic: args.string("logic")?.parse()?,
        }))
    }
}

impl Transformation for FilterRows {
    fn name(&self) -> &'static str {
        "FilterRows"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.first_column, &self.second_column])?;
        let predicate = self.logic.expr(
            col(self.first_column.as_str()),
            col(self.second_column.as_str()),
        );
        df.lazy()
            .filter(predicate)
            .collect()
            .context("Failed to filter rows")
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

    fn with_nulls() -> DataFrame {
        df!("A" => [1i64, 2, 3], "B" => [Some(4i64), Some(5), None]).unwrap()
    }

    #[test]
    fn test_drop_na() {
        let t = DropNA::from_arguments(&args(json!({"column_name": "B"}))).unwrap();
        let out = t.apply(with_nulls()).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.column("B").unwrap().null_count(), 0);
    }

    #[test]
    fn test_drop_na_drops_nan_in_floats() {
        let df = df!("A" => [0i64, 1, 2], "R" => [Some(f64::NAN), Some(1.0), None]).unwrap();
        let t = DropNA::from_arguments(&args(json!({"column_name": ["R"]}))).unwrap();
        let out = t.apply(df).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("A").unwrap().as_materialized_series().i64().unwrap().get(0), Some(1));
    }

    #[test]
    fn test_fill_na() {
        let t = FillNA::from_arguments(&args(json!({"column_name": "B", "value": 0}))).unwrap();
        let out = t.apply(with_nulls()).unwrap();
        let b: Vec<Option<i64>> = out
            .column("B")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(b, [Some(4), Some(5), Some(0)]);
    }

    #[test]
    fn test_fill_na_replaces_nan_in_floats() {
        let df = df!("B" => [1.0f64, f64::NAN]).unwrap();
        let t = FillNA::from_arguments(&args(json!({"column_name": "B", "value": 0.0}))).unwrap();
        let out = t.apply(df).unwrap();
        let b: Vec<f64> = out
            .column("B")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(b, [1.0, 0.0]);
    }

    #[test]
    fn test_filter_rows_le() {
        let df = df!("A" => [1i64, 7, 3], "B" => [4i64, 5, 6]).unwrap();
        let t = FilterRows::from_arguments(&args(json!({
            "first_column": "A", "second_column": "B", "logic": "le"
        })))
        .unwrap();
        let out = t.apply(df).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_unknown_comparison() {
        assert!("between".parse::<Comparison>().is_err());
    }
}
