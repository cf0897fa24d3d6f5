//! Core table types for representing merged CSV data

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// A parsed table from a single CSV file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Column names in header order
    pub columns: Vec<String>,
    /// Row data
    pub rows: Vec<Row>,
    /// Source file path
    pub source_path: PathBuf,
}

impl Table {
    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has a column
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// The column names as an unordered set
    pub fn column_set(&self) -> HashSet<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

/// A row of data, keyed by column name and tagged with its source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// The file this row was read from
    pub source: PathBuf,
    /// Cell values by column name
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(source: PathBuf, cells: BTreeMap<String, CellValue>) -> Self {
        Self { source, cells }
    }

    /// Get a cell value by column name; absent columns read as `Missing`
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&MISSING)
    }

    /// Set a cell value
    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }

    /// Remove a cell, returning its value
    pub fn remove(&mut self, column: &str) -> CellValue {
        self.cells.remove(column).unwrap_or(CellValue::Missing)
    }

    /// Make the row carry exactly `schema`'s columns
    pub fn conform(&mut self, schema: &[String]) {
        let wanted: HashSet<&str> = schema.iter().map(String::as_str).collect();
        self.cells.retain(|name, _| wanted.contains(name.as_str()));
        for column in schema {
            self.cells
                .entry(column.clone())
                .or_insert(CellValue::Missing);
        }
    }

    /// Base name of the source file
    pub fn source_name(&self) -> String {
        file_name_of(&self.source)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

static MISSING: CellValue = CellValue::Missing;

/// A cell value; `Missing` means the column did not exist in the source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellValue {
    /// Text as read from the file (may be empty)
    Value(String),
    /// Column absent from the originating file
    Missing,
}

impl CellValue {
    /// Wrap a string as a present value
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Value(s.into())
    }

    /// Check if the cell is missing
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Missing or empty text
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Value(s) => s.is_empty(),
            CellValue::Missing => true,
        }
    }

    /// The present text, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Value(s) => Some(s),
            CellValue::Missing => None,
        }
    }

    /// Text as written to output; `Missing` becomes empty
    pub fn to_string_value(&self) -> String {
        self.as_str().unwrap_or_default().to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Value(s) => write!(f, "{}", s),
            CellValue::Missing => write!(f, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        let cells = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::text(*v)))
            .collect();
        Row::new(PathBuf::from("data/a.csv"), cells)
    }

    #[test]
    fn test_missing_is_distinct_from_empty() {
        assert_ne!(CellValue::Missing, CellValue::text(""));
        assert!(CellValue::Missing.is_missing());
        assert!(!CellValue::text("").is_missing());
        assert!(CellValue::text("").is_blank());
        assert!(CellValue::Missing.is_blank());
    }

    #[test]
    fn test_cell_value_written_form() {
        assert_eq!(CellValue::Missing.to_string_value(), "");
        assert_eq!(CellValue::text("ELM").to_string_value(), "ELM");
        assert_eq!(CellValue::text("x").to_string(), "x");
    }

    #[test]
    fn test_row_get_absent_column_is_missing() {
        let r = row(&[("id", "1")]);
        assert_eq!(r.get("id"), &CellValue::text("1"));
        assert_eq!(r.get("project_name"), &CellValue::Missing);
    }

    #[test]
    fn test_row_conform_adds_and_drops() {
        let mut r = row(&[("id", "1"), ("extra", "x")]);
        let schema = vec!["id".to_string(), "amount_value".to_string()];
        r.conform(&schema);

        assert_eq!(r.cells.len(), 2);
        assert_eq!(r.get("id"), &CellValue::text("1"));
        assert_eq!(r.cells.get("amount_value"), Some(&CellValue::Missing));
        assert!(!r.cells.contains_key("extra"));
    }

    #[test]
    fn test_source_name_is_base_name() {
        let r = row(&[]);
        assert_eq!(r.source_name(), "a.csv");
    }
}
