//! Row transformation: source tagging, anonymizing, project filtering,
//! helper columns and deduplication
//!
//! [`transform`] applies the steps in a fixed order. The project filter reads
//! `project_name` as captured during reconciliation, and deduplication runs
//! last, on the filtered rows.

use crate::config::MergeConfig;
use crate::reconcile::Reconciled;
use crate::table::{CellValue, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

/// Column holding the originating file name
pub const SOURCE_COLUMN: &str = "source_file";
/// Column identifying the project; removed unless kept explicitly
pub const IDENTIFYING_COLUMN: &str = "project_name";
/// Start timestamp used for `start_month`
pub const START_TIME_COLUMN: &str = "start_time_iso";
/// End timestamp used for `end_month`
pub const END_TIME_COLUMN: &str = "end_time_iso";
/// Helper column derived from `start_time_iso`
pub const START_MONTH_COLUMN: &str = "start_month";
/// Helper column derived from `end_time_iso`
pub const END_MONTH_COLUMN: &str = "end_month";

/// Fields whose values together identify a usage line item
pub const DEDUP_KEY: [&str; 9] = [
    "start_time",
    "end_time",
    "start_time_iso",
    "end_time_iso",
    "amount_value",
    "amount_currency",
    "line_item",
    "project_id",
    "organization_id",
];

/// Final rows of a merge run plus what happened along the way
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Output column order
    pub columns: Vec<String>,
    /// Output rows
    pub rows: Vec<Row>,
    /// Rows dropped as duplicates
    pub duplicate_count: usize,
    /// Rows read from each input file, in merge order
    pub file_row_counts: Vec<(PathBuf, usize)>,
    /// Non-fatal conditions encountered
    pub warnings: Vec<String>,
}

impl MergeResult {
    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total rows read across all inputs
    pub fn rows_read(&self) -> usize {
        self.file_row_counts.iter().map(|(_, n)| n).sum()
    }

    /// Check whether the output has a column
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Apply source tagging, identifying-column handling, project filtering,
/// helper columns and deduplication to reconciled rows
///
/// Project filters match the `project_name` each row had when it was read,
/// so they still apply when the reconciled schema lacks the column.
///
/// Deduplication only runs when every [`DEDUP_KEY`] column is in the schema.
/// Otherwise it is skipped with a warning instead of comparing rows on a
/// partial key.
pub fn transform(reconciled: Reconciled, config: &MergeConfig) -> MergeResult {
    let Reconciled {
        mut schema,
        mut rows,
        projects,
        file_row_counts,
    } = reconciled;
    let mut warnings = Vec::new();

    if config.add_source {
        if !contains(&schema, SOURCE_COLUMN) {
            schema.insert(0, SOURCE_COLUMN.to_string());
        }
        for row in &mut rows {
            let name = row.source_name();
            row.set(SOURCE_COLUMN, CellValue::text(name));
        }
    }

    if contains(&schema, IDENTIFYING_COLUMN) && !config.keep_identifying_info {
        schema.retain(|c| c != IDENTIFYING_COLUMN);
        for row in &mut rows {
            row.remove(IDENTIFYING_COLUMN);
        }
    }

    if !config.only_projects.is_empty() || !config.exclude_projects.is_empty() {
        if !config.only_projects.is_empty() && !config.exclude_projects.is_empty() {
            note(
                &mut warnings,
                "both only-projects and exclude-projects given; applying only-projects first, then exclude-projects"
                    .to_string(),
            );
        }

        match projects {
            Some(projects) => {
                let before = rows.len();
                rows = rows
                    .into_iter()
                    .zip(projects)
                    .filter(|(_, project)| {
                        project_selected(project, &config.only_projects, &config.exclude_projects)
                    })
                    .map(|(row, _)| row)
                    .collect();
                info!(kept = rows.len(), dropped = before - rows.len(), "applied project filter");
            }
            None => note(
                &mut warnings,
                format!("skipping project filter; missing column: {}", IDENTIFYING_COLUMN),
            ),
        }
    }

    add_helper_columns(&mut schema, &mut rows, &mut warnings);

    let missing_key: Vec<&str> = DEDUP_KEY
        .iter()
        .copied()
        .filter(|c| !contains(&schema, c))
        .collect();

    let duplicate_count = if missing_key.is_empty() {
        let (deduped, removed) = drop_duplicate_rows(rows);
        rows = deduped;
        info!(removed, "removed duplicate rows");
        removed
    } else {
        note(
            &mut warnings,
            format!(
                "skipping duplicate removal; missing columns: {}",
                missing_key.join(", ")
            ),
        );
        0
    };

    MergeResult {
        columns: schema,
        rows,
        duplicate_count,
        file_row_counts,
        warnings,
    }
}

fn contains(schema: &[String], column: &str) -> bool {
    schema.iter().any(|c| c == column)
}

fn note(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}

/// Whether a row with this `project_name` survives the project filters
fn project_selected(
    project: &CellValue,
    only: &BTreeSet<String>,
    exclude: &BTreeSet<String>,
) -> bool {
    let name = project.as_str().filter(|s| !s.is_empty());

    if !only.is_empty() && !name.is_some_and(|n| only.contains(n)) {
        return false;
    }
    !name.is_some_and(|n| exclude.contains(n))
}

fn add_helper_columns(schema: &mut Vec<String>, rows: &mut [Row], warnings: &mut Vec<String>) {
    let pairs = [
        (START_TIME_COLUMN, START_MONTH_COLUMN),
        (END_TIME_COLUMN, END_MONTH_COLUMN),
    ];

    let missing: Vec<&str> = pairs
        .iter()
        .map(|(source, _)| *source)
        .filter(|source| !contains(schema.as_slice(), source))
        .collect();
    if !missing.is_empty() {
        note(
            warnings,
            format!("skipping helper columns for missing columns: {}", missing.join(", ")),
        );
    }

    for (source, helper) in pairs {
        if !contains(schema, source) {
            continue;
        }
        if !contains(schema, helper) {
            schema.push(helper.to_string());
        }
        for row in rows.iter_mut() {
            let label = month_label(row.get(source)).unwrap_or_default();
            row.set(helper, CellValue::text(label));
        }
    }
}

/// `YYYY-MM MonthName` for a timestamp cell, or `None` when it does not parse
pub fn month_label(value: &CellValue) -> Option<String> {
    let dt = parse_timestamp(value.as_str()?)?;
    Some(dt.format("%Y-%m %B").to_string())
}

/// Parse an ISO-like timestamp into UTC; naive values are taken as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
    ];
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Keep the first row for each dedup key; returns the rows kept and the number dropped
///
/// Key fields compare by their written form, so a missing cell equals an
/// empty one.
pub fn drop_duplicate_rows(rows: Vec<Row>) -> (Vec<Row>, usize) {
    let before = rows.len();
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(before);

    let kept: Vec<Row> = rows
        .into_iter()
        .filter(|row| seen.insert(dedup_key(row)))
        .collect();

    let removed = before - kept.len();
    (kept, removed)
}

fn dedup_key(row: &Row) -> Vec<Option<String>> {
    DEDUP_KEY
        .iter()
        .map(|column| {
            let value = row.get(column);
            if value.is_blank() {
                None
            } else {
                value.as_str().map(str::to_string)
            }
        })
        .collect()
}
