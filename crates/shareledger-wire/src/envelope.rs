//! Wire envelope: the one message type peers exchange.
//!
//! Every entity that crosses a connection travels wrapped in an [`Envelope`]
//! and is CBOR-encoded before framing.

use serde::{Deserialize, Serialize};

use shareledger_core::{
    ChainPosition, Checkpoint, FileMeta, ForkEvidence, PendingShareRecord, ShareRecord,
    TransferRequest,
};

use crate::error::{Result, WireError};

/// Envelope size limits, checked on both encode and decode.
pub mod limits {
    /// Max chunk hashes in a file or share record.
    pub const MAX_CHUNK_HASHES: usize = 65_536;
    /// Max chunk indices in a transfer request.
    pub const MAX_CHUNK_INDICES: usize = 65_536;
    /// Max witness signatures on a checkpoint.
    pub const MAX_WITNESSES: usize = 64;
}

/// Messages exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Announce a file.
    FileMeta(FileMeta),
    /// Ask for chunks of a file.
    TransferRequest(TransferRequest),
    /// Sender-signed record awaiting the receiver's countersignature.
    ProposedRecord(PendingShareRecord),
    /// Fully co-signed record.
    ShareRecord(ShareRecord),
    /// A device's current chain head, exchanged before proposing.
    ChainPosition(ChainPosition),
    /// Balance snapshot, possibly carrying witness signatures.
    Checkpoint(Checkpoint),
    /// Signed proof of equivocation.
    ForkEvidence(ForkEvidence),
}

impl Envelope {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::FileMeta(_) => "file_meta",
            Envelope::TransferRequest(_) => "transfer_request",
            Envelope::ProposedRecord(_) => "proposed_record",
            Envelope::ShareRecord(_) => "share_record",
            Envelope::ChainPosition(_) => "chain_position",
            Envelope::Checkpoint(_) => "checkpoint",
            Envelope::ForkEvidence(_) => "fork_evidence",
        }
    }

    /// Check if this envelope respects size limits.
    pub fn validate_limits(&self) -> Result<()> {
        match self {
            Envelope::FileMeta(file) => {
                if file.chunk_hashes.len() > limits::MAX_CHUNK_HASHES {
                    return Err(WireError::LimitExceeded("too many file chunk hashes"));
                }
            }
            Envelope::TransferRequest(request) => {
                if request.chunk_indices.len() > limits::MAX_CHUNK_INDICES {
                    return Err(WireError::LimitExceeded("too many chunk indices"));
                }
            }
            Envelope::ProposedRecord(pending) => {
                if pending.header.chunk_hashes.len() > limits::MAX_CHUNK_HASHES {
                    return Err(WireError::LimitExceeded("too many record chunk hashes"));
                }
            }
            Envelope::ShareRecord(record) => {
                if record.header.chunk_hashes.len() > limits::MAX_CHUNK_HASHES {
                    return Err(WireError::LimitExceeded("too many record chunk hashes"));
                }
            }
            Envelope::Checkpoint(checkpoint) => {
                if checkpoint.witnesses.len() > limits::MAX_WITNESSES {
                    return Err(WireError::LimitExceeded("too many witnesses"));
                }
            }
            Envelope::ChainPosition(_) | Envelope::ForkEvidence(_) => {}
        }
        Ok(())
    }

    /// CBOR payload without framing.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| WireError::Codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a CBOR payload and check limits.
    pub fn from_cbor(payload: &[u8]) -> Result<Self> {
        let envelope: Envelope =
            ciborium::from_reader(payload).map_err(|e| WireError::Codec(e.to_string()))?;
        envelope.validate_limits()?;
        Ok(envelope)
    }
}
