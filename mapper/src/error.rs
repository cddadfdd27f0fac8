//! Error types for the product mapping pipeline.
//!
//! - [`CsvError`] - reading and decoding delimited-text resources
//! - [`ConfigError`] - missing or malformed configuration, always fatal
//! - [`OutputError`] - creating, writing or committing output units
//! - [`PipelineError`] - top-level run errors
//!
//! Per-record conditions (a mapping whose source column is absent, a
//! rejected row, a join without a hit) are not errors. They are values
//! returned by the components that produce them.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading a delimited-text resource.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed record.
    #[error("Invalid CSV at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// The csv reader only splits on single-byte delimiters.
    #[error("Delimiter '{0}' is not an ASCII character")]
    InvalidDelimiter(char),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::Parse {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the mapping configuration. Raised before any record is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration resource does not exist or cannot be read.
    #[error("Cannot read configuration '{}': {source}", .path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration resource is not valid JSON of the expected shape.
    #[error("Malformed configuration '{}': {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value in a configuration resource has an unsupported type.
    #[error("Invalid value for '{key}' in '{}': {message}", .path.display())]
    InvalidValue {
        path: PathBuf,
        key: String,
        message: String,
    },

    /// An `ext:` static field points to an unreadable text resource.
    #[error("Cannot load external text '{}': {source}", .path.display())]
    ExternalText {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A destination column is not part of the destination schema.
    #[error("Unknown destination column '{column}' referenced by {origin}")]
    UnknownDestinationColumn { column: String, origin: String },

    /// The related dataset has no column with the configured id name.
    #[error("Related dataset '{}' has no id column '{column}'", .path.display())]
    MissingIdColumn { path: PathBuf, column: String },

    /// The related dataset could not be read.
    #[error("Cannot load related dataset: {0}")]
    RelatedDataset(#[from] CsvError),

    /// A join rule refers to a dataset that was never loaded.
    #[error("Related dataset '{}' was not loaded", .0.display())]
    DatasetNotLoaded(PathBuf),

    /// Output rotation limit must be positive.
    #[error("Row limit must be greater than zero")]
    ZeroRowLimit,
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing output units.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Failed to create the unit file.
    #[error("Cannot create output unit '{}': {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a row.
    #[error("Cannot write to output unit '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Failed to flush or rename a completed unit into place.
    #[error("Cannot commit output unit '{}': {source}", .path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row did not have one value per schema column.
    #[error("Row has {actual} values but the schema has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level run errors returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output could not be written.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
