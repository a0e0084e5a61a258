//! Chain continuity checks for a device's personal record chain.

use crate::crypto::Ed25519PublicKey;
use crate::error::ValidationError;
use crate::record::{ChainPosition, ShareRecord};
use crate::types::RecordId;

/// Check that `record` directly follows `position` in `position.device`'s chain.
///
/// The index must be `position.index + 1` and the claimed predecessor must be
/// `position.head` (`RecordId::ZERO` for an empty chain). A failure here may
/// be equivocation and should be handed to fork detection, not just dropped.
pub fn check_continuity(position: &ChainPosition, record: &ShareRecord) -> Result<(), ValidationError> {
    let device = position.device;
    let (got_index, got_prev) = match (record.index_for(&device), record.prev_for(&device)) {
        (Some(index), Some(prev)) => (index, prev),
        _ => {
            return Err(ValidationError::StructuralError(format!(
                "record {} does not involve {}",
                record.id, device
            )))
        }
    };

    let expected_index = position.next_index();
    if got_index != expected_index || got_prev != position.head {
        return Err(ValidationError::ChainContinuity {
            device,
            expected_index,
            got_index,
            expected_prev: position.head,
            got_prev,
        });
    }
    Ok(())
}

/// Check that `record` directly follows `predecessor` for `device`.
pub fn check_link(
    device: &Ed25519PublicKey,
    predecessor: &ShareRecord,
    record: &ShareRecord,
) -> Result<(), ValidationError> {
    let position = ChainPosition::after(*device, predecessor).ok_or_else(|| {
        ValidationError::StructuralError(format!(
            "record {} does not involve {}",
            predecessor.id, device
        ))
    })?;
    check_continuity(&position, record)
}

/// Walk a device's records from genesis and return the resulting head.
///
/// `records` must be ordered by the device's chain index.
pub fn verify_chain(
    device: &Ed25519PublicKey,
    records: &[ShareRecord],
) -> Result<ChainPosition, ValidationError> {
    let mut position = ChainPosition::genesis(*device);
    for record in records {
        check_continuity(&position, record)?;
        // check_continuity guarantees the device is a party
        position = ChainPosition::after(*device, record).unwrap_or(position);
    }
    Ok(position)
}

/// The predecessor a record claims for `device`, if it is not the first.
pub fn claimed_predecessor(device: &Ed25519PublicKey, record: &ShareRecord) -> Option<RecordId> {
    record.prev_for(device).filter(|prev| !prev.is_zero())
}
