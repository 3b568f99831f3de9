//! Error types for the transport efficiency pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the pipeline.
///
/// Only structural failures live here. Lookup misses, empty windows and
/// duplicate keys are ordinary outcomes and never become errors.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration validation failed: {0}")]
    Validation(String),

    // Store errors (20-29)
    #[error("table not found: {table}")]
    MissingTable { table: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("store is locked by another run: {path}")]
    LockHeld { path: String },

    // Input errors (30-39)
    #[error("malformed input in '{table}' row {row}: {message}")]
    MalformedInput {
        table: String,
        row: usize,
        message: String,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a malformed-input error.
    pub fn malformed(table: &str, row: usize, message: impl Into<String>) -> Self {
        Error::MalformedInput {
            table: table.to_string(),
            row,
            message: message.into(),
        }
    }

    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::Validation(_) => 11,
            Error::MissingTable { .. } => 20,
            Error::Store(_) => 21,
            Error::LockHeld { .. } => 22,
            Error::MalformedInput { .. } => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
