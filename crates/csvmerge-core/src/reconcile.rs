//! Column reconciliation across input tables

use crate::config::MergeMode;
use crate::error::{Error, Result};
use crate::table::{CellValue, Row, Table};
use crate::transform::IDENTIFYING_COLUMN;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Rows from every input table, conformed to one target schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciled {
    /// Target column order
    pub schema: Vec<String>,
    /// Rows in file order, then row order within each file
    pub rows: Vec<Row>,
    /// `project_name` of each row as read, parallel to `rows`
    ///
    /// Taken before conforming, so it survives a schema that drops the
    /// column. `None` when no input file has the column.
    pub projects: Option<Vec<CellValue>>,
    /// Rows read from each file, in merge order
    pub file_row_counts: Vec<(PathBuf, usize)>,
}

/// Compute the target schema for `tables` under `mode` and conform every row to it
pub fn reconcile(tables: Vec<Table>, mode: MergeMode) -> Result<Reconciled> {
    let schema = target_schema(&tables, mode)?;
    debug!(mode = %mode, columns = schema.len(), "reconciled schema");

    let file_row_counts = tables
        .iter()
        .map(|t| (t.source_path.clone(), t.row_count()))
        .collect();

    let total: usize = tables.iter().map(Table::row_count).sum();
    let mut rows = Vec::with_capacity(total);
    let mut projects = tables
        .iter()
        .any(|t| t.has_column(IDENTIFYING_COLUMN))
        .then(|| Vec::with_capacity(total));

    for table in tables {
        for mut row in table.rows {
            if let Some(projects) = projects.as_mut() {
                projects.push(row.get(IDENTIFYING_COLUMN).clone());
            }
            row.conform(&schema);
            rows.push(row);
        }
    }

    Ok(Reconciled {
        schema,
        rows,
        projects,
        file_row_counts,
    })
}

/// The ordered target columns for `tables` under `mode`
pub fn target_schema(tables: &[Table], mode: MergeMode) -> Result<Vec<String>> {
    let Some(first) = tables.first() else {
        return Ok(Vec::new());
    };

    match mode {
        MergeMode::Union => Ok(first_seen_order(tables)),
        MergeMode::Intersection => {
            let common: HashSet<&str> = tables
                .iter()
                .skip(1)
                .fold(first.column_set(), |acc, t| {
                    let cols = t.column_set();
                    acc.intersection(&cols).copied().collect()
                });
            Ok(first_seen_order(tables)
                .into_iter()
                .filter(|c| common.contains(c.as_str()))
                .collect())
        }
        MergeMode::Strict => {
            let expected = first.column_set();
            for table in &tables[1..] {
                if table.column_set() != expected {
                    return Err(Error::SchemaMismatch {
                        path: table.source_path.clone(),
                        expected: first.columns.clone(),
                        found: table.columns.clone(),
                    });
                }
            }
            Ok(first.columns.clone())
        }
    }
}

/// Union of all columns in the order they are first seen
fn first_seen_order(tables: &[Table]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns = Vec::new();
    for table in tables {
        for col in &table.columns {
            if seen.insert(col.as_str()) {
                columns.push(col.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;

    fn table(csv: &str, name: &str) -> Table {
        parse_csv_str(csv, name, b',').unwrap()
    }

    fn xy_yz() -> Vec<Table> {
        vec![table("x,y\n1,2\n", "a.csv"), table("y,z\n3,4\n", "b.csv")]
    }

    #[test]
    fn test_union_first_seen_order() {
        let result = reconcile(xy_yz(), MergeMode::Union).unwrap();

        assert_eq!(result.schema, vec!["x", "y", "z"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].get("z"), &CellValue::Missing);
        assert_eq!(result.rows[1].get("x"), &CellValue::Missing);
        assert_eq!(result.rows[1].get("y"), &CellValue::text("3"));
    }

    #[test]
    fn test_union_is_superset_of_every_file() {
        let tables = vec![
            table("a,b\n1,2\n", "1.csv"),
            table("c\n3\n", "2.csv"),
            table("b,d,a\n4,5,6\n", "3.csv"),
        ];
        let sets: Vec<Vec<String>> = tables.iter().map(|t| t.columns.clone()).collect();

        let schema = target_schema(&tables, MergeMode::Union).unwrap();
        for cols in sets {
            assert!(cols.iter().all(|c| schema.contains(c)));
        }
        assert_eq!(schema, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_intersection_keeps_shared_columns() {
        let result = reconcile(xy_yz(), MergeMode::Intersection).unwrap();

        assert_eq!(result.schema, vec!["y"]);
        for row in &result.rows {
            assert_eq!(row.cells.len(), 1);
        }
    }

    #[test]
    fn test_intersection_is_subset_of_every_file() {
        let tables = vec![
            table("a,b,c\n1,2,3\n", "1.csv"),
            table("c,b,d\n4,5,6\n", "2.csv"),
        ];
        let schema = target_schema(&tables, MergeMode::Intersection).unwrap();

        assert_eq!(schema, vec!["b", "c"]);
        for t in &tables {
            assert!(schema.iter().all(|c| t.has_column(c)));
        }
    }

    #[test]
    fn test_intersection_keeps_projects_of_dropped_column() {
        let tables = vec![
            table("id,project_name\n1,ELM\n2,Other\n", "a.csv"),
            table("id\n3\n", "b.csv"),
        ];
        let result = reconcile(tables, MergeMode::Intersection).unwrap();

        assert_eq!(result.schema, vec!["id"]);
        assert_eq!(
            result.projects,
            Some(vec![
                CellValue::text("ELM"),
                CellValue::text("Other"),
                CellValue::Missing,
            ])
        );
    }

    #[test]
    fn test_no_projects_without_column() {
        let result = reconcile(xy_yz(), MergeMode::Union).unwrap();
        assert_eq!(result.projects, None);
    }

    #[test]
    fn test_strict_accepts_same_set_in_any_order() {
        let tables = vec![table("x,y\n1,2\n", "a.csv"), table("y,x\n3,4\n", "b.csv")];
        let result = reconcile(tables, MergeMode::Strict).unwrap();

        assert_eq!(result.schema, vec!["x", "y"]);
        assert_eq!(result.rows[1].get("x"), &CellValue::text("4"));
    }

    #[test]
    fn test_strict_mismatch_names_file() {
        let err = reconcile(xy_yz(), MergeMode::Strict).unwrap_err();

        match err {
            Error::SchemaMismatch {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, PathBuf::from("b.csv"));
                assert_eq!(expected, vec!["x", "y"]);
                assert_eq!(found, vec!["y", "z"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_file_same_under_all_modes() {
        for mode in [MergeMode::Union, MergeMode::Intersection, MergeMode::Strict] {
            let result = reconcile(vec![table("b,a\n1,2\n", "only.csv")], mode).unwrap();
            assert_eq!(result.schema, vec!["b", "a"]);
            assert_eq!(result.rows.len(), 1);
        }
    }

    #[test]
    fn test_file_row_counts() {
        let tables = vec![table("x\n1\n2\n", "a.csv"), table("x\n3\n", "b.csv")];
        let result = reconcile(tables, MergeMode::Union).unwrap();

        assert_eq!(
            result.file_row_counts,
            vec![(PathBuf::from("a.csv"), 2), (PathBuf::from("b.csv"), 1)]
        );
    }
}
