use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that end a run.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Could not connect to store at {uri}: {reason}")]
    Connectivity { uri: String, reason: String },

    #[error("Input file {0} was not found")]
    SourceNotFound(PathBuf),

    #[error("Input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Failed to read input: {0}")]
    Source(#[from] csv::Error),

    #[error("Batch insert of {count} documents was rejected: {reason}")]
    BatchInsert { count: usize, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Row-level conversion failures. A row that hits one of these is skipped and
/// the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("invalid Age {value:?}: {reason}")]
    InvalidAge { value: String, reason: String },

    #[error("invalid Billing Amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidDate {
        field: String,
        value: String,
        reason: String,
    },

    #[error("missing field {0}")]
    MissingField(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
