//! In-memory tabular results.
//!
//! A [`Table`] is an ordered list of named columns plus rows of [`Value`]s of
//! equal width. Extractors produce one table per query; the join stage builds
//! new tables from existing ones and never mutates its inputs.
//!
//! Column types are not declared up front. They are inferred from the stored
//! values when needed (previews, persistence), see [`ColumnType`].

mod join;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::fmt;

use prettytable::format::Alignment;
use prettytable::{Cell, Row};
use thiserror::Error;

pub use join::{join_all, outer_join, right_join};

/// Errors raised while building or joining tables.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableError {
    /// A row did not have one value per column.
    #[error("row has {actual} values but the table has {expected} columns")]
    RowWidth {
        /// Number of columns in the table.
        expected: usize,
        /// Number of values in the rejected row.
        actual: usize,
    },

    /// Two columns share a name.
    #[error("duplicate column name: {name}")]
    DuplicateColumn {
        /// The repeated column name.
        name: String,
    },

    /// A referenced column does not exist.
    #[error("column not found: {name}")]
    MissingColumn {
        /// The missing column name.
        name: String,
    },

    /// `join_all` was called with no tables.
    #[error("cannot join an empty sequence of tables")]
    EmptyJoin,
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Column type inferred from the values a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Every value is null (or the table is empty).
    Null,
    /// Integers and nulls.
    Int64,
    /// Reals, optionally mixed with integers, and nulls.
    Float64,
    /// Text and nulls.
    Text,
    /// Text mixed with numbers.
    Mixed,
}

impl ColumnType {
    /// Infers the type of a column from its values.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values.into_iter().fold(Self::Null, |acc, value| {
            let seen = match value {
                Value::Null => return acc,
                Value::Integer(_) => Self::Int64,
                Value::Real(_) => Self::Float64,
                Value::Text(_) => Self::Text,
            };
            match (acc, seen) {
                (Self::Null, t) => t,
                (a, b) if a == b => a,
                (Self::Int64 | Self::Float64, Self::Int64 | Self::Float64) => Self::Float64,
                _ => Self::Mixed,
            }
        })
    }

    /// Returns the type name shown in previews.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateColumn`] if a name repeats.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = BTreeSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn { name: name.clone() });
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Creates a table from columns and rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a column name repeats or a row has the wrong width.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowWidth`] if the row does not have one value per
    /// column.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates over the values of one column.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] if no such column exists.
    pub fn column<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + use<'a>, TableError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Returns the cell at `row` in column `name`.
    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Finds the first row whose `key` column equals `value`.
    #[must_use]
    pub fn find_row(&self, key: &str, value: &Value) -> Option<&[Value]> {
        let idx = self.column_index(key)?;
        self.rows
            .iter()
            .find(|row| &row[idx] == value)
            .map(Vec::as_slice)
    }

    /// Distinct integer keys of a column, ignoring nulls and non-integers.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] if no such column exists.
    pub fn integer_keys(&self, name: &str) -> Result<BTreeSet<i64>, TableError> {
        Ok(self.column(name)?.filter_map(Value::as_integer).collect())
    }

    /// Inferred type of every column, in column order.
    #[must_use]
    pub fn column_types(&self) -> Vec<(&str, ColumnType)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                (
                    name.as_str(),
                    ColumnType::infer(self.rows.iter().map(|row| &row[idx])),
                )
            })
            .collect()
    }

    /// Returns a new table holding at most the first `n` rows.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Renders the first `n` rows and the inferred column types as text.
    #[must_use]
    pub fn preview(&self, n: usize) -> String {
        let mut grid = prettytable::Table::new();
        grid.set_titles(Row::new(self.columns.iter().map(|name| Cell::new(name)).collect()));
        for row in self.rows.iter().take(n) {
            let cells = row
                .iter()
                .map(|value| match value {
                    Value::Text(_) => Cell::new(&value.to_string()),
                    _ => Cell::new_align(&value.to_string(), Alignment::RIGHT),
                })
                .collect();
            grid.add_row(Row::new(cells));
        }

        let mut lines = vec![
            grid.to_string().trim_end().to_string(),
            format!("[{} rows x {} columns]", self.num_rows(), self.num_columns()),
        ];
        lines.extend(
            self.column_types()
                .into_iter()
                .map(|(name, ty)| format!("{name}: {ty}")),
        );
        lines.join("\n")
    }

    fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn {
                name: name.to_string(),
            })
    }
}
