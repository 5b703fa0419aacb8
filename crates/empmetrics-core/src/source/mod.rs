//! Data source adapter.
//!
//! A [`DataSource`] runs one read-only SQL statement with named placeholders
//! and returns the result as a [`Table`]. Every placeholder in the statement
//! must be bound; a missing value is an error rather than an implicit NULL.
//!
//! The `SQLite` backend lives in [`sqlite`].

pub mod sqlite;

use std::fmt;

use thiserror::Error;

use crate::table::{Table, TableError};

pub use sqlite::{SCHEMA_SQL, SqliteDataSource};

/// Errors raised while executing a query.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataSourceError {
    /// Database error (connection, malformed SQL, missing relation).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The statement references a placeholder with no bound value.
    #[error("missing query parameter: {name}")]
    MissingParameter {
        /// Placeholder name without its prefix.
        name: String,
    },

    /// A result column held a value the table model cannot represent.
    #[error("unsupported value type in column {column}")]
    UnsupportedType {
        /// Name of the offending column.
        column: String,
    },

    /// A text value was not valid UTF-8.
    #[error("invalid UTF-8 text in column {column}")]
    InvalidText {
        /// Name of the offending column.
        column: String,
    },

    /// The result could not be assembled into a table.
    #[error("malformed result: {0}")]
    Table(#[from] TableError),
}

/// A value bound to a named placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Text, used for dates, times and names.
    Text(String),
    /// Integer, used for ids.
    Integer(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Integer(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

/// Named query parameters, in insertion order.
///
/// Names are stored without the `:` prefix used in templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing an earlier binding (builder
    /// pattern).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Binds `name` to `value`, replacing an earlier binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a binding. A leading `:`, `@` or `$` on `name` is ignored.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let name = name.trim_start_matches([':', '@', '$']);
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterates over the bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Executes parameterized, read-only SQL.
pub trait DataSource {
    /// Runs `template` with `params` bound by name and collects the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable, the SQL is malformed, a
    /// placeholder has no binding, or a result value cannot be represented.
    fn execute_query(&self, template: &str, params: &QueryParams) -> Result<Table, DataSourceError>;
}
