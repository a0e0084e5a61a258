//! Error types for the credit engine.

use thiserror::Error;

/// Credit engine errors.
///
/// The engine never fails on valid input; an empty history is a zero balance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditError {
    /// Invalid economic parameters. Fatal at startup, never defaulted.
    #[error("invalid credit configuration: {field} {reason}")]
    Configuration { field: &'static str, reason: String },
}

/// Result type for credit operations.
pub type Result<T> = std::result::Result<T, CreditError>;
