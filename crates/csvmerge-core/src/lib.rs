//! csvmerge-core: Core library for merging CSV usage exports
//!
//! This library provides functionality to:
//! - Select input CSV files from a directory by glob pattern
//! - Read them with a configurable delimiter and text encoding
//! - Reconcile differing column sets (union, intersection or strict)
//! - Tag rows with their source file, anonymize and filter by project
//! - Derive month helper columns and drop duplicate usage rows
//! - Write the merged result back out as CSV

pub mod config;
pub mod error;
pub mod merger;
pub mod parser;
pub mod reconcile;
pub mod scanner;
pub mod table;
pub mod transform;
pub mod writer;

pub use config::{
    parse_delimiter, parse_project_list, Defaults, MergeConfig, MergeMode, MergeSettings,
    TextEncoding,
};
pub use error::{Error, Result};
pub use merger::{input_files, merge, merge_files, run};
pub use parser::{parse_csv_str, read_table};
pub use reconcile::{reconcile, Reconciled};
pub use scanner::{exclude_output, select_files};
pub use table::{CellValue, Row, Table};
pub use transform::{drop_duplicate_rows, month_label, transform, MergeResult, DEDUP_KEY};
pub use writer::{render_csv, write_result};
