//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CBOR encoding or decoding of a stored column failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored bytes do not decode into a valid value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A caller passed an out-of-contract argument (zero limit, empty range).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
