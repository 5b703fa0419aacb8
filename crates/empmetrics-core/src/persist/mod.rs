//! Persistence of the joined table.
//!
//! Tables are written as a single Parquet file. The file is created in place
//! and overwritten unconditionally: a crash mid-write can leave a truncated
//! file behind.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use thiserror::Error;
use tracing::info;

use crate::table::{ColumnType, Table, TableError, Value};

/// Errors raised while writing or reading a table file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    /// The file could not be created or opened.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        /// Path being written or read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow rejected the column data.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// The Parquet writer or reader failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// A stored column has a type the table model cannot hold.
    #[error("unsupported column type {data_type} for column {column}")]
    UnsupportedColumn {
        /// Column name.
        column: String,
        /// Arrow type found in the file.
        data_type: DataType,
    },

    /// The file content did not form a valid table.
    #[error("malformed table: {0}")]
    Table(#[from] TableError),
}

fn column_array(table: &Table, idx: usize, ty: ColumnType) -> (DataType, ArrayRef) {
    let values = table.rows().iter().map(|row| &row[idx]);
    match ty {
        ColumnType::Int64 => {
            let array: Int64Array = values.map(Value::as_integer).collect();
            (DataType::Int64, Arc::new(array))
        },
        ColumnType::Float64 => {
            let array: Float64Array = values
                .map(|v| match v {
                    #[allow(clippy::cast_precision_loss)]
                    Value::Integer(i) => Some(*i as f64),
                    Value::Real(f) => Some(*f),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(array))
        },
        ColumnType::Null | ColumnType::Text | ColumnType::Mixed => {
            let array: StringArray = values
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            (DataType::Utf8, Arc::new(array))
        },
    }
}

fn to_record_batch(table: &Table) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays = Vec::with_capacity(table.num_columns());
    for (idx, (name, ty)) in table.column_types().into_iter().enumerate() {
        let (data_type, array) = column_array(table, idx, ty);
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

/// Writes `table` to `path` as Parquet, replacing any existing file.
///
/// Integer columns become `Int64`, real columns `Float64`, everything else
/// (text, mixed, all-null) nullable `Utf8`.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the parent directory is missing or not
/// writable, or an Arrow/Parquet error if encoding fails.
pub fn save(table: &Table, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let path = path.as_ref();
    let batch = to_record_batch(table)?;

    let file = File::create(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    info!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "table saved"
    );
    Ok(())
}

/// Reads a file written by [`save`] back into a [`Table`].
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded, or holds a
/// column type other than `Int64`, `Float64` or `Utf8`.
pub fn load(path: impl AsRef<Path>) -> Result<Table, PersistError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut table = Table::new(schema.fields().iter().map(|f| f.name().clone()))?;
    for batch in reader {
        let batch = batch?;
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(batch.num_columns());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            columns.push(array_values(field.name(), array.as_ref())?);
        }
        for row in 0..batch.num_rows() {
            table.push_row(columns.iter().map(|c| c[row].clone()).collect())?;
        }
    }
    Ok(table)
}

fn array_values(name: &str, array: &dyn Array) -> Result<Vec<Value>, PersistError> {
    let unsupported = || PersistError::UnsupportedColumn {
        column: name.to_string(),
        data_type: array.data_type().clone(),
    };
    let any = array.as_any();
    let values = match array.data_type() {
        DataType::Int64 => {
            let array = any.downcast_ref::<Int64Array>().ok_or_else(unsupported)?;
            array.iter().map(Value::from).collect()
        },
        DataType::Float64 => {
            let array = any.downcast_ref::<Float64Array>().ok_or_else(unsupported)?;
            array.iter().map(Value::from).collect()
        },
        DataType::Utf8 => {
            let array = any.downcast_ref::<StringArray>().ok_or_else(unsupported)?;
            array.iter().map(Value::from).collect()
        },
        _ => return Err(unsupported()),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn joined_fixture() -> Table {
        Table::from_rows(
            [
                "employee_id",
                "clicks_count",
                "after_hours_count",
                "department",
                "indicator",
            ],
            vec![
                vec![
                    Value::Integer(1),
                    Value::Integer(5),
                    Value::Null,
                    Value::from("ICU"),
                    Value::from("0"),
                ],
                vec![
                    Value::Integer(2),
                    Value::Null,
                    Value::Integer(1),
                    Value::from("ER"),
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_save_then_load_preserves_nulls_and_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.parquet");
        let table = joined_fixture();

        save(&table, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, table);
        let types: Vec<ColumnType> = loaded.column_types().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Int64,
                ColumnType::Int64,
                ColumnType::Int64,
                ColumnType::Text,
                ColumnType::Text,
            ]
        );
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.parquet");
        std::fs::write(&path, b"stale").unwrap();

        let table = joined_fixture().head(1);
        save(&table, &path).unwrap();
        assert_eq!(load(&path).unwrap().num_rows(), 1);
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("metrics.parquet");

        let err = save(&joined_fixture(), &path).unwrap_err();
        assert!(matches!(err, PersistError::Io { path: ref p, .. } if *p == path));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_and_all_null_columns_are_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.parquet");
        let table = Table::from_rows(
            ["employee_id", "department"],
            vec![vec![Value::Integer(1), Value::Null]],
        )
        .unwrap();

        save(&table, &path).unwrap();
        assert_eq!(load(&path).unwrap(), table);

        let empty = Table::new(["employee_id", "indicator"]).unwrap();
        save(&empty, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.columns(), ["employee_id", "indicator"]);
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_mixed_real_and_integer_column_is_float() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.parquet");
        let table = Table::from_rows(
            ["employee_id", "score"],
            vec![
                vec![Value::Integer(1), Value::Integer(2)],
                vec![Value::Integer(2), Value::Real(2.5)],
            ],
        )
        .unwrap();

        save(&table, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.get(0, "score"), Some(&Value::Real(2.0)));
        assert_eq!(loaded.get(1, "score"), Some(&Value::Real(2.5)));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, PersistError::Io { .. }));
    }
}
