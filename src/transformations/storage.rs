//! Persisting snapshots of the working table.
//!
//! A snapshot named `x` is stored as `x.parquet` relative to the current
//! directory, unless `file_name` is itself a path.

use crate::transform::{Arguments, ParamContract, Transformation, TransformationSpec};
use anyhow::{Context as _, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::PathBuf;

/// Extension appended to every snapshot name.
pub const SNAPSHOT_EXTENSION: &str = "parquet";

/// Where the snapshot called `file_name` lives.
pub fn snapshot_path(file_name: &str) -> PathBuf {
    PathBuf::from(format!("{file_name}.{SNAPSHOT_EXTENSION}"))
}

/// Write the working table to a snapshot and pass it on unchanged.
#[derive(Debug, Clone)]
pub struct SaveDataFrame {
    file_name: String,
}

impl SaveDataFrame {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "SaveDataFrame",
            "Save a snapshot of the table",
            ParamContract::new(["file_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `file_name` is missing.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            file_name: args.string("file_name")?,
        }))
    }
}

impl Transformation for SaveDataFrame {
    fn name(&self) -> &'static str {
        "SaveDataFrame"
    }

    fn apply(&self, mut df: DataFrame) -> Result<DataFrame> {
        let path = snapshot_path(&self.file_name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Saved snapshot {}", path.display());
        Ok(df)
    }
}

/// Remove one or more snapshots. Absent snapshots are ignored.
#[derive(Debug, Clone)]
pub struct DeleteDataFrame {
    file_names: Vec<String>,
}

impl DeleteDataFrame {
    pub fn spec() -> TransformationSpec {
        TransformationSpec::new(
            "DeleteDataFrame",
            "Delete saved snapshot(s)",
            ParamContract::new(["file_name"]),
            Self::from_arguments,
        )
    }

    /// # Errors
    ///
    /// Fails if `file_name` is not a string or list of strings.
    pub fn from_arguments(args: &Arguments) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Self {
            file_names: args.string_list("file_name")?,
        }))
    }
}

impl Transformation for DeleteDataFrame {
    fn name(&self) -> &'static str {
        "DeleteDataFrame"
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        for file_name in &self.file_names {
            let path = snapshot_path(file_name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
                tracing::debug!("Deleted snapshot {}", path.display());
            }
        }
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    fn args(value: Value) -> Arguments {
        let Value::Object(map) = value else {
            return Arguments::new(Map::new());
        };
        Arguments::new(map)
    }

    #[test]
    fn test_save_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("snap").to_string_lossy().into_owned();
        let df = df!("A" => [1i64, 2]).unwrap();

        let saved = SaveDataFrame::from_arguments(&args(json!({"file_name": name})))
            .unwrap()
            .apply(df.clone())
            .unwrap();
        assert!(saved.equals(&df));
        let path = snapshot_path(&name);
        assert!(path.exists());

        let back = ParquetReader::new(File::open(&path).unwrap()).finish().unwrap();
        assert!(back.equals(&df));

        let deleted = DeleteDataFrame::from_arguments(&args(json!({"file_name": [name]})))
            .unwrap()
            .apply(saved)
            .unwrap();
        assert!(deleted.equals(&df));
        assert!(!path.exists());
    }

    #[test]
    fn test_delete_absent_snapshot_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("never_saved").to_string_lossy().into_owned();
        let t = DeleteDataFrame::from_arguments(&args(json!({"file_name": name}))).unwrap();
        assert!(t.apply(DataFrame::empty()).is_ok());
    }
}
