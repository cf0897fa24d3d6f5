//! Error types for csvmerge-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in csvmerge-core
#[derive(Debug, Error)]
pub enum Error {
    /// File selection matched nothing
    #[error("no files found in '{root}' matching '{pattern}'")]
    NoInputFiles { root: PathBuf, pattern: String },

    /// Strict mode found a file whose columns differ from the first file
    #[error(
        "column mismatch in '{path}': expected [{}], found [{}]",
        .expected.join(", "),
        .found.join(", ")
    )]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File bytes are not valid in the configured encoding
    #[error("failed to decode '{path}' as {encoding}")]
    Decode { path: PathBuf, encoding: String },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Failed to write the output file
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output contains characters the target encoding cannot represent
    #[error("failed to write '{path}': content cannot be encoded as {encoding}")]
    Encode { path: PathBuf, encoding: String },

    /// Filename pattern is not a valid glob
    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Encoding label is unknown or unsupported for writing
    #[error("unsupported encoding '{0}'")]
    UnknownEncoding(String),

    /// Delimiter is not a single ASCII character
    #[error("invalid delimiter '{0}': expected a single ASCII character")]
    InvalidDelimiter(String),

    /// Mode string did not name a reconciliation mode
    #[error("invalid mode '{0}': expected union, intersection or strict")]
    InvalidMode(String),

    /// Failed to read a settings file
    #[error("failed to read settings '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures reading or parsing an input file
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. } | Error::Decode { .. } | Error::CsvParse { .. } | Error::Csv { .. }
        )
    }

    /// True for failures producing the output file
    pub fn is_write_error(&self) -> bool {
        matches!(self, Error::Write { .. } | Error::Encode { .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SchemaMismatch { .. }
            | Error::InvalidPattern { .. }
            | Error::UnknownEncoding(_)
            | Error::InvalidDelimiter(_)
            | Error::InvalidMode(_)
            | Error::ConfigRead { .. }
            | Error::Json(_) => 2,
            Error::Write { .. } | Error::Encode { .. } => 3,
            _ => 1,
        }
    }
}
