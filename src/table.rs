//! Table I/O.
//!
//! Reading and writing tables by file extension, and the row-oriented JSON
//! records form used to pass a table through pipeline config text.

use crate::error::TableError;
use polars::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Read a csv, parquet or json (array of records) file.
///
/// # Errors
///
/// Fails on unknown extensions, I/O errors and parse errors.
pub fn read_table(path: &Path) -> Result<DataFrame, TableError> {
    let ext = extension(path);
    let df = match ext.as_str() {
        "csv" => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .into_reader_with_file_handle(File::open(path)?)
            .finish()?,
        "parquet" => ParquetReader::new(File::open(path)?).finish()?,
        "json" => JsonReader::new(File::open(path)?).finish()?,
        _ => return Err(TableError::UnsupportedFormat(ext)),
    };
    tracing::debug!("Read {} with shape {:?}", path.display(), df.shape());
    Ok(df)
}

/// Write `df` in the format implied by the extension of `path`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Fails on unknown extensions and I/O errors.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<(), TableError> {
    let ext = extension(path);
    if !matches!(ext.as_str(), "csv" | "parquet" | "json") {
        return Err(TableError::UnsupportedFormat(ext));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    match ext.as_str() {
        "parquet" => {
            ParquetWriter::new(file).finish(df)?;
        }
        "json" => JsonWriter::new(file)
            .with_json_format(JsonFormat::Json)
            .finish(df)?,
        _ => CsvWriter::new(file).include_header(true).finish(df)?,
    }
    tracing::debug!("Wrote {} with shape {:?}", path.display(), df.shape());
    Ok(())
}

/// Serialise a table as a compact JSON array of row objects.
///
/// # Errors
///
/// Fails if polars cannot serialise one of the column types.
pub fn table_to_records_json(df: &DataFrame) -> Result<String, TableError> {
    let mut buf = Vec::new();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df.clone())?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Rebuild a table from a JSON array of row objects.
///
/// # Errors
///
/// Fails if `records` is not an array or polars cannot infer a schema.
pub fn records_to_table(records: &Value) -> Result<DataFrame, TableError> {
    let Value::Array(rows) = records else {
        return Err(TableError::NotRecords);
    };
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }
    if !rows.iter().all(Value::is_object) {
        return Err(TableError::NotRecords);
    }

    let bytes = serde_json::to_vec(records)?;
    Ok(JsonReader::new(Cursor::new(bytes)).finish()?)
}
