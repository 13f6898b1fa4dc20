//! Error types for bizpulse-core

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for the bizpulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store access failure that is not a SQLite error (e.g. poisoned lock)
    #[error("store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(String),

    /// A date string could not be parsed
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Range end precedes range start
    #[error("invalid date range: {to} is before {from}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    /// Caller supplied arguments the engine cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for bizpulse-core
pub type Result<T> = std::result::Result<T, Error>;
