//! Tests for tables and the join stage.

use std::collections::BTreeSet;

use super::*;

fn keyed(column: &str, rows: &[(i64, Value)]) -> Table {
    Table::from_rows(
        ["employee_id", column],
        rows.iter()
            .map(|(id, value)| vec![Value::Integer(*id), value.clone()]),
    )
    .expect("valid table")
}

fn ids(table: &Table) -> BTreeSet<i64> {
    table.integer_keys("employee_id").expect("key column")
}

#[test]
fn test_push_row_rejects_wrong_width() {
    let mut table = Table::new(["a", "b"]).unwrap();
    let err = table.push_row(vec![Value::Integer(1)]).unwrap_err();
    assert_eq!(
        err,
        TableError::RowWidth {
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn test_new_rejects_duplicate_columns() {
    let err = Table::new(["a", "a"]).unwrap_err();
    assert_eq!(
        err,
        TableError::DuplicateColumn {
            name: "a".to_string()
        }
    );
}

#[test]
fn test_column_type_inference() {
    let table = Table::from_rows(
        ["i", "f", "t", "n", "m"],
        vec![
            vec![
                Value::Integer(1),
                Value::Integer(1),
                Value::from("a"),
                Value::Null,
                Value::Integer(1),
            ],
            vec![
                Value::Null,
                Value::Real(2.5),
                Value::Null,
                Value::Null,
                Value::from("x"),
            ],
        ],
    )
    .unwrap();

    let types: Vec<ColumnType> = table.column_types().into_iter().map(|(_, t)| t).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Int64,
            ColumnType::Float64,
            ColumnType::Text,
            ColumnType::Null,
            ColumnType::Mixed,
        ]
    );
}

#[test]
fn test_head_and_preview() {
    let table = keyed(
        "clicks_count",
        &[
            (1, Value::Integer(5)),
            (2, Value::Integer(3)),
            (3, Value::Integer(9)),
        ],
    );

    assert_eq!(table.head(2).num_rows(), 2);
    assert_eq!(table.head(10).num_rows(), 3);

    let preview = table.preview(2);
    assert!(preview.contains("employee_id"));
    assert!(preview.contains("[3 rows x 2 columns]"));
    assert!(preview.contains("clicks_count: int64"));
    assert!(!preview.contains(" 9"));
}

#[test]
fn test_preview_aligns_non_ascii_cells() {
    let table = keyed(
        "department",
        &[
            (1, Value::from("Pédiatrie")),
            (2, Value::from("ICU")),
        ],
    );

    let preview = table.preview(5);
    let grid: Vec<&str> = preview
        .lines()
        .take_while(|line| !line.starts_with('['))
        .collect();
    let width = grid[0].chars().count();

    assert!(grid.iter().any(|line| line.contains("Pédiatrie")));
    assert!(grid.iter().all(|line| line.chars().count() == width), "{preview}");
}

#[test]
fn test_right_join_keeps_right_key_set() {
    let a = keyed("a", &[(1, Value::from("a1")), (2, Value::from("a2"))]);
    let b = keyed("b", &[(2, Value::from("b2")), (3, Value::from("b3"))]);

    let ab = right_join(&a, &b, "employee_id").unwrap();
    assert_eq!(ids(&ab), BTreeSet::from([2, 3]));

    let ba = right_join(&b, &a, "employee_id").unwrap();
    assert_eq!(ids(&ba), BTreeSet::from([1, 2]));
}

#[test]
fn test_right_join_fills_missing_left_with_null() {
    let a = keyed("a", &[(1, Value::from("a1")), (2, Value::from("a2"))]);
    let b = keyed("b", &[(2, Value::from("b2")), (3, Value::from("b3"))]);

    let joined = right_join(&a, &b, "employee_id").unwrap();
    assert_eq!(joined.columns(), ["employee_id", "a", "b"]);
    assert_eq!(
        joined.rows(),
        [
            vec![Value::Integer(2), Value::from("a2"), Value::from("b2")],
            vec![Value::Integer(3), Value::Null, Value::from("b3")],
        ]
    );
}

#[test]
fn test_right_join_multiplies_duplicate_left_keys() {
    let a = keyed("a", &[(1, Value::from("x")), (1, Value::from("y"))]);
    let b = keyed("b", &[(1, Value::from("z"))]);

    let joined = right_join(&a, &b, "employee_id").unwrap();
    assert_eq!(joined.num_rows(), 2);
    assert_eq!(joined.get(0, "a"), Some(&Value::from("x")));
    assert_eq!(joined.get(1, "a"), Some(&Value::from("y")));
    assert_eq!(joined.get(1, "b"), Some(&Value::from("z")));
}

#[test]
fn test_right_join_suffixes_overlapping_columns() {
    let a = keyed("value", &[(1, Value::from("left"))]);
    let b = keyed("value", &[(1, Value::from("right"))]);

    let joined = right_join(&a, &b, "employee_id").unwrap();
    assert_eq!(joined.columns(), ["employee_id", "value_x", "value_y"]);
    assert_eq!(joined.get(0, "value_x"), Some(&Value::from("left")));
    assert_eq!(joined.get(0, "value_y"), Some(&Value::from("right")));
}

#[test]
fn test_right_join_missing_key_column() {
    let a = keyed("a", &[(1, Value::Integer(1))]);
    let b = Table::from_rows(["other_id", "b"], vec![vec![Value::Integer(1), Value::Integer(2)]])
        .unwrap();

    let err = right_join(&a, &b, "employee_id").unwrap_err();
    assert_eq!(
        err,
        TableError::MissingColumn {
            name: "employee_id".to_string()
        }
    );
}

#[test]
fn test_right_join_null_keys_match() {
    let a = Table::from_rows(["employee_id", "a"], vec![vec![Value::Null, Value::from("x")]])
        .unwrap();
    let b = Table::from_rows(["employee_id", "b"], vec![vec![Value::Null, Value::from("y")]])
        .unwrap();

    let joined = right_join(&a, &b, "employee_id").unwrap();
    assert_eq!(
        joined.rows(),
        [vec![Value::Null, Value::from("x"), Value::from("y")]]
    );
}

#[test]
fn test_join_all_empty_sequence() {
    let err = join_all(std::iter::empty(), "employee_id").unwrap_err();
    assert_eq!(err, TableError::EmptyJoin);
}

#[test]
fn test_join_all_single_table_is_identity() {
    let a = keyed("a", &[(1, Value::Integer(1))]);
    assert_eq!(join_all([&a], "employee_id").unwrap(), a);
}

#[test]
fn test_join_all_final_keys_follow_last_table() {
    let clicks = keyed("clicks_count", &[(1, Value::Integer(5)), (2, Value::Integer(3))]);
    let patients = keyed("patients_accessed_count", &[(1, Value::Integer(2)), (4, Value::Integer(7))]);
    let indicator = keyed("indicator", &[(2, Value::from("1")), (5, Value::from("0"))]);

    let joined = join_all([&clicks, &patients, &indicator], "employee_id").unwrap();
    assert_eq!(ids(&joined), BTreeSet::from([2, 5]));
    assert_eq!(
        joined.columns(),
        ["employee_id", "clicks_count", "patients_accessed_count", "indicator"]
    );

    // Employee 2 is missing from the patients table but keeps its clicks.
    let row = joined.find_row("employee_id", &Value::Integer(2)).unwrap();
    assert_eq!(
        row,
        [Value::Integer(2), Value::Integer(3), Value::Null, Value::from("1")]
    );
    let row = joined.find_row("employee_id", &Value::Integer(5)).unwrap();
    assert_eq!(row, [Value::Integer(5), Value::Null, Value::Null, Value::from("0")]);
}

#[test]
fn test_outer_join_keeps_both_key_sets() {
    let a = keyed("a", &[(1, Value::from("a1")), (2, Value::from("a2"))]);
    let b = keyed("b", &[(3, Value::from("b3")), (2, Value::from("b2"))]);

    let joined = outer_join(&a, &b, "employee_id").unwrap();
    assert_eq!(joined.columns(), ["employee_id", "a", "b"]);
    assert_eq!(
        joined.rows(),
        [
            vec![Value::Integer(1), Value::from("a1"), Value::Null],
            vec![Value::Integer(2), Value::from("a2"), Value::from("b2")],
            vec![Value::Integer(3), Value::Null, Value::from("b3")],
        ]
    );
}

#[test]
fn test_join_all_metric_scenario() {
    let clicks = keyed("clicks_count", &[(1, Value::Integer(5)), (2, Value::Integer(3))]);
    let patients = keyed("patients_accessed_count", &[(1, Value::Integer(2))]);
    let after_hours = keyed("after_hours_count", &[(2, Value::Integer(1))]);
    let department = keyed("department", &[(1, Value::from("ICU")), (2, Value::from("ER"))]);
    let indicator = keyed("indicator", &[(1, Value::from("0")), (2, Value::from("1"))]);

    let joined = join_all(
        [&clicks, &patients, &after_hours, &department, &indicator],
        "employee_id",
    )
    .unwrap();

    assert_eq!(
        joined.rows(),
        [
            vec![
                Value::Integer(1),
                Value::Integer(5),
                Value::Integer(2),
                Value::Null,
                Value::from("ICU"),
                Value::from("0"),
            ],
            vec![
                Value::Integer(2),
                Value::Integer(3),
                Value::Null,
                Value::Integer(1),
                Value::from("ER"),
                Value::from("1"),
            ],
        ]
    );
}

#[test]
fn test_join_all_multiplies_duplicate_keys() {
    let a = keyed("a", &[(1, Value::from("x")), (1, Value::from("y"))]);
    let b = keyed("b", &[(1, Value::from("z")), (2, Value::from("w"))]);

    let joined = join_all([&a, &b], "employee_id").unwrap();
    assert_eq!(joined.num_rows(), 3);
    assert_eq!(ids(&joined), BTreeSet::from([1, 2]));
}

#[test]
fn test_join_all_order_changes_survivors() {
    let a = keyed("a", &[(1, Value::Integer(1)), (2, Value::Integer(2))]);
    let b = keyed("b", &[(2, Value::Integer(2)), (3, Value::Integer(3))]);

    let forward = join_all([&a, &b], "employee_id").unwrap();
    let backward = join_all([&b, &a], "employee_id").unwrap();
    assert_eq!(ids(&forward), BTreeSet::from([2, 3]));
    assert_eq!(ids(&backward), BTreeSet::from([1, 2]));
}
