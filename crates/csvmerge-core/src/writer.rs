//! Output writer for merged results

use crate::config::TextEncoding;
use crate::error::{Error, Result};
use crate::transform::MergeResult;
use std::fs;
use std::path::Path;
use tracing::info;

/// Render `result` as delimited text: header row first, then one line per row
pub fn render_csv(result: &MergeResult, delimiter: u8) -> std::result::Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(result.columns.iter().map(|c| row.get(c).to_string_value()))?;
    }

    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    // Every field came from a String, so the buffer is valid UTF-8
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write `result` to `path`, replacing any existing file
///
/// The whole output is rendered and encoded before the file is opened, so a
/// failure never leaves a partial file behind.
pub fn write_result<P: AsRef<Path>>(
    result: &MergeResult,
    path: P,
    delimiter: u8,
    encoding: &TextEncoding,
) -> Result<()> {
    let path = path.as_ref();

    let text = render_csv(result, delimiter).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;

    let bytes = encoding.encode(&text).ok_or_else(|| Error::Encode {
        path: path.to_path_buf(),
        encoding: encoding.label().to_string(),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, bytes).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!(
        path = %path.display(),
        rows = result.row_count(),
        columns = result.column_count(),
        "wrote output"
    );
    Ok(())
}
