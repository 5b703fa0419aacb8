//! Right-outer join and the reduction over a sequence of tables.
//!
//! The reduction keeps the key set of the right-most table: accumulated rows
//! whose key is absent from it are discarded. Callers that care about which
//! employees survive must order their inputs accordingly.

use std::collections::{BTreeSet, HashMap};

use super::{Table, TableError, Value};

const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Hashable view of a key cell. Null keys match each other.
#[derive(Debug, PartialEq, Eq, Hash)]
enum JoinKey<'a> {
    Null,
    Integer(i64),
    Real(u64),
    Text(&'a str),
}

impl<'a> From<&'a Value> for JoinKey<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(v) => Self::Integer(*v),
            Value::Real(v) => Self::Real(v.to_bits()),
            Value::Text(v) => Self::Text(v),
        }
    }
}

/// Which unmatched rows a merge keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum How {
    /// Every right row, in right order.
    Right,
    /// Every left row in left order, then unmatched right rows in right order.
    Outer,
}

/// Right-outer join of `left` and `right` on `key`.
///
/// For each right row, in order, emits one row per matching left row (in left
/// order), or a single row with null left columns when nothing matches.
/// Duplicate keys therefore multiply rows. The output holds every left column
/// in place, with the key taken from the right row, followed by the right
/// non-key columns. Non-key names present on both sides get `_x` (left) and
/// `_y` (right) suffixes.
///
/// # Errors
///
/// Returns [`TableError::MissingColumn`] if either side lacks `key`, or
/// [`TableError::DuplicateColumn`] if suffixing still produces a clash.
pub fn right_join(left: &Table, right: &Table, key: &str) -> Result<Table, TableError> {
    merge(left, right, key, How::Right)
}

/// Full outer join of `left` and `right` on `key`.
///
/// Left rows come first, each joined to its right matches or padded with
/// nulls, followed by the right rows no left row matched. Column layout and
/// suffixing follow [`right_join`].
///
/// # Errors
///
/// Same as [`right_join`].
pub fn outer_join(left: &Table, right: &Table, key: &str) -> Result<Table, TableError> {
    merge(left, right, key, How::Outer)
}

fn merged_columns(left: &Table, left_key: usize, right: &Table, right_key: usize) -> Vec<String> {
    let non_key = |table: &'_ Table, key_idx: usize| -> BTreeSet<String> {
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != key_idx)
            .map(|(_, name)| name.clone())
            .collect()
    };
    let left_names = non_key(left, left_key);
    let right_names = non_key(right, right_key);

    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns() - 1);
    for (idx, name) in left.columns.iter().enumerate() {
        if idx != left_key && right_names.contains(name) {
            columns.push(format!("{name}{LEFT_SUFFIX}"));
        } else {
            columns.push(name.clone());
        }
    }
    for (idx, name) in right.columns.iter().enumerate() {
        if idx == right_key {
            continue;
        }
        if left_names.contains(name) {
            columns.push(format!("{name}{RIGHT_SUFFIX}"));
        } else {
            columns.push(name.clone());
        }
    }
    columns
}

fn key_index(table: &Table, key: usize) -> HashMap<JoinKey<'_>, Vec<usize>> {
    let mut index: HashMap<JoinKey<'_>, Vec<usize>> = HashMap::new();
    for (pos, row) in table.rows.iter().enumerate() {
        index
            .entry(JoinKey::from(&row[key]))
            .or_default()
            .push(pos);
    }
    index
}

fn merge(left: &Table, right: &Table, key: &str, how: How) -> Result<Table, TableError> {
    let left_key = left.require_column(key)?;
    let right_key = right.require_column(key)?;
    let mut joined = Table::new(merged_columns(left, left_key, right, right_key))?;

    // Left row (or nulls carrying the key) followed by the right non-key cells.
    let combine = |left_row: Option<&[Value]>,
                   right_row: Option<&[Value]>,
                   key_value: &Value|
     -> Vec<Value> {
        let mut row =
            left_row.map_or_else(|| vec![Value::Null; left.num_columns()], <[Value]>::to_vec);
        row[left_key] = key_value.clone();
        match right_row {
            Some(right_row) => row.extend(
                right_row
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != right_key)
                    .map(|(_, value)| value.clone()),
            ),
            None => row.extend(std::iter::repeat_n(Value::Null, right.num_columns() - 1)),
        }
        row
    };

    match how {
        How::Right => {
            let index = key_index(left, left_key);
            for right_row in &right.rows {
                let key_value = &right_row[right_key];
                match index.get(&JoinKey::from(key_value)) {
                    Some(matches) => {
                        for &pos in matches {
                            joined.push_row(combine(
                                Some(left.rows[pos].as_slice()),
                                Some(right_row.as_slice()),
                                key_value,
                            ))?;
                        }
                    },
                    None => joined.push_row(combine(None, Some(right_row.as_slice()), key_value))?,
                }
            }
        },
        How::Outer => {
            let index = key_index(right, right_key);
            let mut matched = vec![false; right.num_rows()];
            for left_row in &left.rows {
                let key_value = &left_row[left_key];
                match index.get(&JoinKey::from(key_value)) {
                    Some(matches) => {
                        for &pos in matches {
                            matched[pos] = true;
                            joined.push_row(combine(
                                Some(left_row.as_slice()),
                                Some(right.rows[pos].as_slice()),
                                key_value,
                            ))?;
                        }
                    },
                    None => joined.push_row(combine(Some(left_row.as_slice()), None, key_value))?,
                }
            }
            for (right_row, _) in right.rows.iter().zip(&matched).filter(|(_, m)| !**m) {
                joined.push_row(combine(
                    None,
                    Some(right_row.as_slice()),
                    &right_row[right_key],
                ))?;
            }
        },
    }

    Ok(joined)
}

/// Reduces `tables` to one table keyed by the last table's key set.
///
/// Every table but the last is accumulated with [`outer_join`], so a metric
/// value survives even when an intermediate table lacks the employee. The
/// accumulation is then [`right_join`]ed with the last table, which decides
/// which keys survive: the result's key set is exactly the last table's, and
/// reordering the inputs changes it. Duplicate keys multiply rows.
///
/// # Errors
///
/// Returns [`TableError::EmptyJoin`] for an empty sequence, or any error from
/// the joins.
pub fn join_all<'a>(
    tables: impl IntoIterator<Item = &'a Table>,
    key: &str,
) -> Result<Table, TableError> {
    let tables: Vec<&Table> = tables.into_iter().collect();
    let (last, rest) = tables.split_last().ok_or(TableError::EmptyJoin)?;
    last.require_column(key)?;

    let Some((first, others)) = rest.split_first() else {
        return Ok((*last).clone());
    };
    let accumulated = others
        .iter()
        .try_fold((*first).clone(), |acc, next| outer_join(&acc, next, key))?;
    right_join(&accumulated, last, key)
}
