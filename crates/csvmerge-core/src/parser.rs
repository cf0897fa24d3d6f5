//! CSV reader for merge input files

use crate::config::TextEncoding;
use crate::error::{Error, Result};
use crate::table::{CellValue, Row, Table};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and parse a CSV file into a Table
pub fn read_table<P: AsRef<Path>>(path: P, delimiter: u8, encoding: &TextEncoding) -> Result<Table> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let content = encoding.decode(&bytes).ok_or_else(|| Error::Decode {
        path: path.to_path_buf(),
        encoding: encoding.label().to_string(),
    })?;

    let table = parse_csv_str(&content, path, delimiter)?;
    debug!(
        path = %path.display(),
        columns = table.column_count(),
        rows = table.row_count(),
        "read input file"
    );
    Ok(table)
}

/// Parse CSV text already decoded to a string
pub fn parse_csv_str<P: AsRef<Path>>(content: &str, source: P, delimiter: u8) -> Result<Table> {
    let path: PathBuf = source.as_ref().to_path_buf();
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true) // Allow varying number of fields
        .from_reader(content.as_bytes());

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: path.clone(),
        source: e,
    })?;

    let columns: Vec<String> = headers.iter().map(str::to_string).collect();

    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(Error::CsvParse {
            path,
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for name in &columns {
        if !seen.insert(name.as_str()) {
            return Err(Error::CsvParse {
                path,
                message: format!("duplicate column name '{}'", name),
            });
        }
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;

        if record.len() > columns.len() {
            warn!(
                path = %path.display(),
                row = row_idx + 1,
                "row has more cells than columns, truncating"
            );
        }

        // Short rows leave trailing columns missing
        let cells: BTreeMap<String, CellValue> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record
                    .get(i)
                    .map(CellValue::text)
                    .unwrap_or(CellValue::Missing);
                (name.clone(), value)
            })
            .collect();

        rows.push(Row::new(path.clone(), cells));
    }

    Ok(Table {
        columns,
        rows,
        source_path: path,
    })
}
