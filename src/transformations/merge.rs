//! Relational join of the working table with an auxiliary table.

use super::require_columns;
use crate::transform::{Arguments, ParamContract, Transformation, TransformationSpec};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

/// Join flavours accepted by the `how` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Full,
}

impl FromStr for JoinHow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "outer" | "full" => Ok(Self::Full),
            _ => bail!("unsupported join '{s}' (expected inner, left or outer)"),
        }
    }
}

impl JoinHow {
    fn args(self) -> JoinArgs {
        match self {
            Self::Inner => JoinArgs::new(JoinType::Inner),
            Self::Left => JoinArgs::new(JoinType::Left),
            Self::Full => {
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns)
            }
        }
    }
}

/// Join the working table with `df_to_join` on `join_cols`.
///
/// Non-key columns present on both sides get `suffixes[0]` on the left and
/// `suffixes[1]` on the right.
#[derive(Debug, Clone)]
pub struct MergeDataFrames {
    other: DataFrame,
    join_cols: Vec<String>,
    how: JoinHow,
    suffixes: (String, String),
}

impl MergeDataFrames {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "MergeDataFrames",
            "Join with an auxiliary table",
            ParamContract::new(["df_to_join", "join_cols", "how", "suffixes"])
                .with_table("df_to_join"),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if no table was resolved for `df_to_join`, `how` is unknown or
    /// `suffixes` is not a pair.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        let join_cols = args.string_list("join_cols")?;
        if join_cols.is_empty() {
            bail!("'join_cols' must name at least one column");
        }
        let suffixes = match args.string_list("suffixes")?.as_slice() {
            [left, right] => (left.clone(), right.clone()),
            other => bail!("'suffixes' must hold exactly two strings, got {}", other.len()),
        };
        Ok(Box::new(Self {
            other: args.table("df_to_join")?,
            join_cols,
            how: args.string("how")?.parse()?,
            suffixes,
        }))
    }

    /// Select every column of `df`, suffixing those in `clashing`.
    fn suffixed(df: &DataFrame, clashing: &HashSet<String>, suffix: &str) -> Vec<Expr> {
        df.get_column_names()
            .into_iter()
            .map(|name| {
                let name = name.as_str();
                if clashing.contains(name) {
                    col(name).alias(format!("{name}{suffix}"))
                } else {
                    col(name)
                }
            })
            .collect()
    }
}

impl Transformation for MergeDataFrames {
    fn name(&self) -> &'static str {
        "MergeDataFrames"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, &self.join_cols)?;
        require_columns(&self.other, &self.join_cols).context("in 'df_to_join'")?;

        let right_names: HashSet<String> = self
            .other
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let clashing: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| right_names.contains(name) && !self.join_cols.contains(name))
            .collect();

        let left = df
            .clone()
            .lazy()
            .select(Self::suffixed(&df, &clashing, &self.suffixes.0));
        let right = self
            .other
            .clone()
            .lazy()
            .select(Self::suffixed(&self.other, &clashing, &self.suffixes.1));
        let keys: Vec<Expr> = self.join_cols.iter().map(|c| col(c.as_str())).collect();

        left.join(right, keys.clone(), keys, self.how.args())
            .collect()
            .with_context(|| format!("Failed to join on {:?}", self.join_cols))
    }
}
