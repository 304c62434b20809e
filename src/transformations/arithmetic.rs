//! Elementwise arithmetic between columns, or between a column and a scalar.

use super::require_columns;
use crate::transform::{Arguments, ParamContract, Transformation, TransformationSpec, literal};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::Value;
use std::str::FromStr;

/// Binary arithmetic operation named by a step's `logic` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Sum,
    Sub,
    Mul,
    Div,
    Mod,
}

impl FromStr for ArithmeticOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" | "add" => Ok(Self::Sum),
            "sub" => Ok(Self::Sub),
            "mul" => Ok(Self::Mul),
            "div" | "truediv" => Ok(Self::Div),
            "mod" => Ok(Self::Mod),
            _ => bail!("unknown logic '{s}' (expected sum, sub, mul, div or mod)"),
        }
    }
}

impl ArithmeticOp {
    /// Build `lhs <op> rhs`. Division is always true division on floats.
    pub fn expr(self, lhs: Expr, rhs: Expr) -> Expr {
        match self {
            Self::Sum => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs.cast(DataType::Float64) / rhs.cast(DataType::Float64),
            Self::Mod => lhs % rhs,
        }
    }
}

/// `output_column = first_column <logic> second_column`.
#[derive(Debug, Clone)]
pub struct ColumnsOperator {
    first_column: String,
    second_column: String,
    logic: ArithmeticOp,
    output_column: String,
}

impl ColumnsOperator {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "ColumnsOperator",
            "Elementwise arithmetic between two columns",
            ParamContract::new(["first_column", "second_column", "logic", "output_column"]),
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
            output_column: args.string("output_column")?,
        }))
    }
}

impl Transformation for ColumnsOperator {
    fn name(&self) -> &'static str {
        "ColumnsOperator"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.first_column, &self.second_column])?;
        let expr = self.logic.expr(
            col(self.first_column.as_str()),
            col(self.second_column.as_str()),
        );
        df.lazy()
            .with_column(expr.alias(self.output_column.as_str()))
            .collect()
            .with_context(|| format!("Failed to compute '{}'", self.output_column))
    }
}

/// `output_column = column_name <logic> value`.
#[derive(Debug, Clone)]
pub struct MathOperator {
    column_name: String,
    logic: ArithmeticOp,
    value: Value,
    output_column: String,
}

impl MathOperator {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "MathOperator",
            "Elementwise arithmetic between a column and a number",
            ParamContract::new(["column_name", "logic", "value", "output_column"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails on a missing argument, unknown `logic` or a non-numeric `value`.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        let value = args.value("value")?.clone();
        if !value.is_number() {
            bail!("argument 'value' must be a number, got {value}");
        }
        Ok(Box::new(Self {
            column_name: args.string("column_name")?,
            logic: args.string("logic")?.parse()?,
            value,
            output_column: args.string("output_column")?,
        }))
    }
}

impl Transformation for MathOperator {
    fn name(&self) -> &'static str {
        "MathOperator"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.column_name])?;
        let expr = self
            .logic
            .expr(col(self.column_name.as_str()), literal(&self.value)?);
        df.lazy()
            .with_column(expr.alias(self.output_column.as_str()))
            .collect()
            .with_context(|| format!("Failed to compute '{}'", self.output_column))
    }
}

/// Z-score normalisation using the sample standard deviation.
#[derive(Debug, Clone)]
pub struct NormalizeColumn {
    column_name: String,
    output_column: String,
}

impl NormalizeColumn {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "NormalizeColumn",
            "Z-score normalise a numeric column",
            ParamContract::new(["column_name", "output_column"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if either column name is missing.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            column_name: args.string("column_name")?,
            output_column: args.string("output_column")?,
        }))
    }
}

impl Transformation for NormalizeColumn {
    fn name(&self) -> &'static str {
        "NormalizeColumn"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, [&self.column_name])?;
        let x = col(self.column_name.as_str()).cast(DataType::Float64);
        let normalized = (x.clone() - x.clone().mean()) / x.std(1);
        df.lazy()
            .with_column(normalized.alias(self.output_column.as_str()))
            .collect()
            .with_context(|| format!("Failed to normalise '{}'", self.column_name))
    }
}
