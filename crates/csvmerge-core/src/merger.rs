//! Merge pipeline: select, read, reconcile, transform, write

use crate::config::MergeConfig;
use crate::error::{Error, Result};
use crate::parser::read_table;
use crate::reconcile::reconcile;
use crate::scanner::{exclude_output, select_files};
use crate::table::Table;
use crate::transform::{transform, MergeResult};
use crate::writer::write_result;
use std::path::PathBuf;
use tracing::info;

/// Select the input files for `config`, leaving out the output file itself
pub fn input_files(config: &MergeConfig) -> Result<Vec<PathBuf>> {
    let files = select_files(&config.input, &config.pattern, config.recursive)?;
    let files = exclude_output(files, &config.output);
    if files.is_empty() {
        return Err(Error::NoInputFiles {
            root: config.input.clone(),
            pattern: config.pattern.clone(),
        });
    }
    Ok(files)
}

/// Merge the files selected by `config` without writing anything
pub fn merge(config: &MergeConfig) -> Result<MergeResult> {
    let files = input_files(config)?;
    merge_files(&files, config)
}

/// Merge an explicit list of files in the given order
pub fn merge_files(files: &[PathBuf], config: &MergeConfig) -> Result<MergeResult> {
    info!("Found {} files. Reading...", files.len());

    // Every file is read before reconciliation so a bad file aborts the run
    let mut tables: Vec<Table> = Vec::with_capacity(files.len());
    for path in files {
        info!("- {}", path.display());
        tables.push(read_table(path, config.delimiter, &config.encoding)?);
    }

    let reconciled = reconcile(tables, config.mode)?;
    Ok(transform(reconciled, config))
}

/// Merge the files selected by `config` and write the output file
pub fn run(config: &MergeConfig) -> Result<MergeResult> {
    let result = merge(config)?;
    write_result(&result, &config.output, config.delimiter, &config.encoding)?;
    Ok(result)
}
