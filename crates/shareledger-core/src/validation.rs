//! Entity validation: signature, identifier and structural checks.
//!
//! An entity that fails any check must be dropped. Nothing from it, totals
//! included, may be persisted or used for credit.

use crate::checkpoint::{Checkpoint, MAX_CONFIDENCE_BPS};
use crate::crypto::{Ed25519PublicKey, Ed25519Signature};
use crate::error::{CoreError, ValidationError};
use crate::file::{expected_chunk_count, FileMeta};
use crate::fork::{compare_records, ForkCheck, ForkEvidence};
use crate::record::ShareRecord;
use crate::request::TransferRequest;
use crate::types::RecordId;

/// Verify one signature, telling a clean rejection apart from a check that
/// could not run.
fn check_signature(
    key: &Ed25519PublicKey,
    message: &[u8],
    signature: &Ed25519Signature,
    rejected: ValidationError,
) -> Result<(), ValidationError> {
    match key.verify(message, signature) {
        Ok(()) => Ok(()),
        Err(CoreError::InvalidSignature) => Err(rejected),
        Err(e) => Err(ValidationError::VerificationError(e.to_string())),
    }
}

/// Validate file metadata.
pub fn validate_file_meta(meta: &FileMeta) -> Result<(), ValidationError> {
    // 1. Chunk layout
    let expected = expected_chunk_count(meta.file_size, meta.chunk_size)
        .ok_or(ValidationError::ZeroChunkSize)?;
    let got = meta.chunk_hashes.len() as u64;
    if expected != got {
        return Err(ValidationError::ChunkCountMismatch { expected, got });
    }

    // 2. Origin signature
    let message = meta.signable_bytes()?;
    check_signature(
        &meta.origin,
        &message,
        &meta.origin_sig,
        ValidationError::InvalidSignature,
    )
}

/// Validate a transfer request.
pub fn validate_transfer_request(request: &TransferRequest) -> Result<(), ValidationError> {
    let message = request.signable_bytes()?;
    check_signature(
        &request.requester,
        &message,
        &request.signature,
        ValidationError::InvalidSignature,
    )
}

/// Validate a finalized share record.
///
/// Checks, stopping at the first failure:
/// - Structure (distinct parties, indices start at 1)
/// - Sender signature over the signable bytes
/// - Receiver signature over the same bytes
/// - Stored id equals the hash of the signable bytes
pub fn validate_share_record(record: &ShareRecord) -> Result<(), ValidationError> {
    validate_share_record_structure(record)?;

    let message = record.header.signable_bytes()?;

    check_signature(
        &record.header.sender,
        &message,
        &record.sender_sig,
        ValidationError::InvalidSenderSignature,
    )?;

    check_signature(
        &record.header.receiver,
        &message,
        &record.receiver_sig,
        ValidationError::InvalidReceiverSignature,
    )?;

    let computed = RecordId(crate::crypto::Blake3Hash::hash(&message).0);
    if computed != record.id {
        return Err(ValidationError::IdentifierMismatch {
            claimed: record.id,
            computed,
        });
    }

    Ok(())
}

/// Structural checks only, no cryptography.
pub fn validate_share_record_structure(record: &ShareRecord) -> Result<(), ValidationError> {
    let header = &record.header;

    if header.sender == header.receiver {
        return Err(ValidationError::SelfTransfer);
    }

    if header.sender_record_index == 0 || header.receiver_record_index == 0 {
        return Err(ValidationError::ZeroChainIndex);
    }

    // The first record has no predecessor and only the first record may omit one.
    for (index, prev) in [
        (header.sender_record_index, header.prev_sender),
        (header.receiver_record_index, header.prev_receiver),
    ] {
        if (index == 1) != prev.is_zero() {
            return Err(ValidationError::StructuralError(format!(
                "index {} with predecessor {}",
                index, prev
            )));
        }
    }

    Ok(())
}

/// Validate a checkpoint and all of its witnesses.
pub fn validate_checkpoint(checkpoint: &Checkpoint) -> Result<(), ValidationError> {
    if checkpoint.confidence_bps > MAX_CONFIDENCE_BPS {
        return Err(ValidationError::StructuralError(format!(
            "confidence {} exceeds {}",
            checkpoint.confidence_bps, MAX_CONFIDENCE_BPS
        )));
    }

    let message = checkpoint.signable_bytes();
    check_signature(
        &checkpoint.device,
        &message,
        &checkpoint.device_sig,
        ValidationError::InvalidSignature,
    )?;

    for (i, witness) in checkpoint.witnesses.iter().enumerate() {
        if witness.witness == checkpoint.device {
            return Err(ValidationError::StructuralError(
                "device listed as its own witness".into(),
            ));
        }
        check_signature(
            &witness.witness,
            &message,
            &witness.signature,
            ValidationError::InvalidWitnessSignature(i),
        )?;
    }

    Ok(())
}

/// Validate the reporter signature on fork evidence.
pub fn validate_fork_evidence(evidence: &ForkEvidence) -> Result<(), ValidationError> {
    if evidence.record_a >= evidence.record_b {
        return Err(ValidationError::StructuralError(
            "fork evidence ids must be distinct and ascending".into(),
        ));
    }
    check_signature(
        &evidence.reporter,
        &evidence.signable_bytes(),
        &evidence.reporter_sig,
        ValidationError::InvalidSignature,
    )
}

/// Validate fork evidence against the two records it names.
///
/// Both records must be valid, name the accused device at the same index,
/// and be exactly the records in the evidence.
pub fn verify_fork_evidence(
    evidence: &ForkEvidence,
    a: &ShareRecord,
    b: &ShareRecord,
) -> Result<(), ValidationError> {
    validate_fork_evidence(evidence)?;
    validate_share_record(a)?;
    validate_share_record(b)?;

    if !(evidence.names(&a.id) && evidence.names(&b.id)) {
        return Err(ValidationError::ForkEvidenceMismatch(
            "records are not the ones named".into(),
        ));
    }

    match compare_records(&evidence.device, a, b) {
        ForkCheck::Conflict { .. } => Ok(()),
        ForkCheck::Equivalent => Err(ValidationError::ForkEvidenceMismatch(
            "records are identical".into(),
        )),
        ForkCheck::Unrelated => Err(ValidationError::ForkEvidenceMismatch(
            "records are at different positions".into(),
        )),
    }
}
