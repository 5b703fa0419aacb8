//! `SQLite`-backed data source.
//!
//! Production runs open an existing database read-only. Tests build a store
//! in memory from [`SCHEMA_SQL`] and insert fixture rows through
//! [`SqliteDataSource::from_connection`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql};
use tracing::debug;

use super::{DataSource, DataSourceError, ParamValue, QueryParams};
use crate::table::{Table, Value};

/// Relations the extractors and the resolver read, embedded at compile time.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Text(v) => ToSqlOutput::from(v.as_str()),
            Self::Integer(v) => ToSqlOutput::from(*v),
        })
    }
}

/// A [`DataSource`] over one `SQLite` connection.
///
/// The connection sits behind a mutex so the handle can be shared by
/// reference; queries still run one at a time.
#[derive(Clone)]
pub struct SqliteDataSource {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteDataSource {
    /// Opens an existing database read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataSourceError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %path.display(), "opened data source");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an empty in-memory store with [`SCHEMA_SQL`] applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, DataSourceError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already-open connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        }
    }

    /// Path of the underlying database file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `f` with the locked connection.
    ///
    /// Intended for fixture setup; extraction goes through
    /// [`DataSource::execute_query`].
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }
}

impl DataSource for SqliteDataSource {
    fn execute_query(&self, template: &str, params: &QueryParams) -> Result<Table, DataSourceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare(template)?;

        for idx in 1..=stmt.parameter_count() {
            let name = stmt
                .parameter_name(idx)
                .map_or_else(|| format!("?{idx}"), ToString::to_string);
            let value = params
                .get(&name)
                .ok_or_else(|| DataSourceError::MissingParameter {
                    name: name.trim_start_matches([':', '@', '$']).to_string(),
                })?;
            stmt.raw_bind_parameter(idx, value)?;
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut table = Table::new(columns.iter().cloned())?;

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for (idx, column) in columns.iter().enumerate() {
                let value = match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Integer(v),
                    ValueRef::Real(v) => Value::Real(v),
                    ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                        Ok(text) => Value::Text(text.to_string()),
                        Err(_) => {
                            return Err(DataSourceError::InvalidText {
                                column: column.clone(),
                            });
                        },
                    },
                    ValueRef::Blob(_) => {
                        return Err(DataSourceError::UnsupportedType {
                            column: column.clone(),
                        });
                    },
                };
                values.push(value);
            }
            table.push_row(values)?;
        }

        let bound: Vec<&str> = params.iter().map(|(name, _)| name).collect();
        debug!(rows = table.num_rows(), ?bound, "query executed");
        Ok(table)
    }
}
