//! Error types for the wire module.

use thiserror::Error;

/// Errors from framing, decoding and session encryption.
#[derive(Debug, Error)]
pub enum WireError {
    /// Declared or actual payload exceeds the frame limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// The buffer holds more or fewer bytes than the prefix declares.
    #[error("length prefix declares {declared} bytes but {actual} follow")]
    LengthMismatch { declared: usize, actual: usize },

    /// Not enough bytes for a length prefix.
    #[error("truncated frame: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A decoded envelope exceeds a per-field limit.
    #[error("envelope limit exceeded: {0}")]
    LimitExceeded(&'static str),

    /// Sealing or opening an encrypted payload failed.
    #[error("session crypto error: {0}")]
    Crypto(String),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
