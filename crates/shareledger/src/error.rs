//! Error types for the Ledger.

use shareledger_core::{CoreError, Ed25519PublicKey, RecordId, ValidationError};
use shareledger_credit::CreditError;
use shareledger_store::StoreError;
use shareledger_wire::WireError;
use thiserror::Error;

/// Errors that can occur during Ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An entity failed validation. Nothing was persisted.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Signing or key handling failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Credit parameters are unusable.
    #[error("credit error: {0}")]
    Credit(#[from] CreditError),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The ledger configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A proposal no longer matches this device's chain.
    #[error("stale proposal: {0}")]
    StaleProposal(String),

    /// An earlier proposal from this device has not been settled.
    #[error("proposal for index {index} is still outstanding")]
    ProposalOutstanding { index: u64 },

    /// The counterparty has known fork evidence against it.
    #[error("peer {0} has fork evidence against it")]
    PeerForked(Ed25519PublicKey),

    /// A checkpoint disagrees with the record held locally at its index.
    #[error("checkpoint head {claimed} does not match local record {local}")]
    CheckpointMismatch { claimed: RecordId, local: RecordId },

    /// A record the ledger produced itself collided in storage.
    #[error("conflict at index {index} for {device}: existing record {existing}")]
    Conflict {
        device: Ed25519PublicKey,
        index: u64,
        existing: RecordId,
    },

    /// Not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
