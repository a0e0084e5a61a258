//! Fork detection: a device signing two different records at one chain index.
//!
//! Evidence is signed by the reporter and never mutated. A device with
//! accepted evidence against it is flagged, never deleted.

use serde::{Deserialize, Serialize};

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::record::ShareRecord;
use crate::signable::fork_evidence_signable_bytes;
use crate::types::RecordId;

/// Outcome of comparing two records for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkCheck {
    /// The records are not at the same index of this device's chain.
    Unrelated,
    /// Same index, same id: a re-delivery.
    Equivalent,
    /// Same index, different ids: equivocation.
    Conflict { index: u64 },
}

/// Compare two records at `device`'s chain positions.
pub fn compare_records(device: &Ed25519PublicKey, a: &ShareRecord, b: &ShareRecord) -> ForkCheck {
    match (a.index_for(device), b.index_for(device)) {
        (Some(ia), Some(ib)) if ia == ib => {
            if a.id == b.id {
                ForkCheck::Equivalent
            } else {
                ForkCheck::Conflict { index: ia }
            }
        }
        _ => ForkCheck::Unrelated,
    }
}

/// Proof that `device` signed two different records at one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEvidence {
    pub device: Ed25519PublicKey,
    /// The smaller of the two conflicting ids.
    pub record_a: RecordId,
    /// The larger of the two conflicting ids.
    pub record_b: RecordId,
    pub reporter: Ed25519PublicKey,
    pub reporter_sig: Ed25519Signature,
    /// Reporter-local detection time (Unix milliseconds).
    pub detected_at: i64,
}

impl ForkEvidence {
    /// Sign evidence naming two conflicting ids.
    ///
    /// The ids are stored in ascending order, so both observers of one fork
    /// describe it with the same pair.
    pub fn create(
        reporter: &Keypair,
        device: Ed25519PublicKey,
        first: RecordId,
        second: RecordId,
        detected_at: i64,
    ) -> Result<Self, CoreError> {
        if first == second {
            return Err(CoreError::InvalidArgument(
                "fork evidence needs two different record ids".into(),
            ));
        }
        let (record_a, record_b) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let mut evidence = Self {
            device,
            record_a,
            record_b,
            reporter: reporter.public_key(),
            reporter_sig: Ed25519Signature::ZERO,
            detected_at,
        };
        evidence.reporter_sig = reporter.sign(&evidence.signable_bytes());
        Ok(evidence)
    }

    pub fn signable_bytes(&self) -> Vec<u8> {
        fork_evidence_signable_bytes(self)
    }

    /// True if `id` is one of the two conflicting records.
    pub fn names(&self, id: &RecordId) -> bool {
        self.record_a == *id || self.record_b == *id
    }
}

/// Compare two records and, on conflict, produce signed evidence.
pub fn detect_fork(
    reporter: &Keypair,
    device: &Ed25519PublicKey,
    a: &ShareRecord,
    b: &ShareRecord,
    detected_at: i64,
) -> Result<Option<ForkEvidence>, CoreError> {
    match compare_records(device, a, b) {
        ForkCheck::Conflict { .. } => {
            ForkEvidence::create(reporter, *device, a.id, b.id, detected_at).map(Some)
        }
        ForkCheck::Equivalent | ForkCheck::Unrelated => Ok(None),
    }
}
