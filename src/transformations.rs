//! Built-in transformations.
//!
//! Each transformation is a small struct built from [`Arguments`] by a
//! `from_arguments` constructor and exposed through a `spec()` function
//! returning its [`TransformationSpec`]. They are grouped by what they touch:
//!
//! - **Columns**: `CreateColumn`, `CastColumnTypes`, `RemoveColumns`,
//!   `SelectColumns`, `RenameColumn`
//! - **Arithmetic**: `ColumnsOperator`, `MathOperator`, `NormalizeColumn`
//! - **Rows**: `DropNA`, `FillNA`, `FilterRows`
//! - **Joins**: `MergeDataFrames`
//! - **Storage**: `SaveDataFrame`, `DeleteDataFrame`
//!
//! [`Arguments`]: crate::transform::Arguments

pub mod arithmetic;
pub mod columns;
pub mod merge;
pub mod rows;
pub mod storage;

use crate::transform::TransformationSpec;
use anyhow::{Result, bail};
use polars::prelude::*;

/// Specs of every built-in transformation.
pub fn builtins() -> Vec<TransformationSpec> {
    vec![
        columns::CreateColumn::spec(),
        columns::CastColumnTypes::spec(),
        columns::RemoveColumns::spec(),
        columns::SelectColumns::spec(),
        columns::RenameColumn::spec(),
        arithmetic::ColumnsOperator::spec(),
        arithmetic::MathOperator::spec(),
        arithmetic::NormalizeColumn::spec(),
        rows::DropNA::spec(),
        rows::FillNA::spec(),
        rows::FilterRows::spec(),
        merge::MergeDataFrames::spec(),
        storage::SaveDataFrame::spec(),
        storage::DeleteDataFrame::spec(),
    ]
}

/// Fail with a readable message if any of `columns` is not in `df`.
fn require_columns<'a>(
    df: &DataFrame,
    columns: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    let missing: Vec<&str> = columns
        .into_iter()
        .filter(|name| df.column(name).is_err())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("column(s) not found: {missing:?}");
    }
    Ok(())
}
