//! Error types for the ledger core.

use thiserror::Error;

use crate::crypto::Ed25519PublicKey;
use crate::types::RecordId;

/// Input that cannot be turned into deterministic signable bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("{field} has {count} entries, more than a u32 count prefix can describe")]
    TooManyItems { field: &'static str, count: usize },

    #[error("file name is {len} bytes, maximum is {max}")]
    FileNameTooLong { len: usize, max: usize },
}

/// Core errors from key handling, signing and record assembly.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key: expected 32 or 64 bytes, got {got}")]
    InvalidPrivateKey { got: usize },

    #[error("invalid signature length: expected 64 bytes, got {got}")]
    InvalidSignatureLength { got: usize },

    #[error("key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("receiver signature attached before sender signature")]
    MissingSenderSignature,

    #[error("signer {got} is not the expected party {expected}")]
    SignerMismatch {
        expected: Ed25519PublicKey,
        got: Ed25519PublicKey,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Rejections produced by the record validator and chain checks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("sender signature verification failed")]
    InvalidSenderSignature,

    #[error("receiver signature verification failed")]
    InvalidReceiverSignature,

    #[error("record id mismatch: claimed {claimed}, computed {computed}")]
    IdentifierMismatch { claimed: RecordId, computed: RecordId },

    #[error("verification could not run: {0}")]
    VerificationError(String),

    #[error(
        "chain continuity broken for {device}: expected index {expected_index} after {expected_prev}, \
         got index {got_index} after {got_prev}"
    )]
    ChainContinuity {
        device: Ed25519PublicKey,
        expected_index: u64,
        got_index: u64,
        expected_prev: RecordId,
        got_prev: RecordId,
    },

    #[error("chunk count mismatch: expected {expected}, got {got}")]
    ChunkCountMismatch { expected: u64, got: u64 },

    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("sender and receiver are the same device")]
    SelfTransfer,

    #[error("chain index 0 is reserved for an empty chain")]
    ZeroChainIndex,

    #[error("witness {0} signature verification failed")]
    InvalidWitnessSignature(usize),

    #[error("fork evidence does not match records: {0}")]
    ForkEvidenceMismatch(String),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature => ValidationError::InvalidSignature,
            CoreError::Encoding(inner) => ValidationError::Encoding(inner),
            CoreError::InvalidPublicKey
            | CoreError::InvalidPrivateKey { .. }
            | CoreError::InvalidSignatureLength { .. }
            | CoreError::KeyAgreement(_) => ValidationError::VerificationError(e.to_string()),
            CoreError::MissingSenderSignature
            | CoreError::SignerMismatch { .. }
            | CoreError::InvalidArgument(_) => ValidationError::StructuralError(e.to_string()),
        }
    }
}
