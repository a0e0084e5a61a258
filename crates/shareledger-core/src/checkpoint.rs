//! Checkpoints: device-signed, peer-witnessed snapshots of a chain head.

use serde::{Deserialize, Serialize};

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::record::ChainPosition;
use crate::signable::checkpoint_signable_bytes;
use crate::types::{CumulativeTotals, RecordId};

/// Upper bound of the confidence score (100.00%).
pub const MAX_CONFIDENCE_BPS: u16 = 10_000;

/// A peer's countersignature on a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub witness: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

/// A snapshot of a device's own chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub device: Ed25519PublicKey,
    pub chain_head: RecordId,
    pub chain_index: u64,
    #[serde(default)]
    pub totals: CumulativeTotals,
    /// Balance before diversity and drip bounds.
    pub raw_balance: u64,
    /// Confidence in basis points, `0..=MAX_CONFIDENCE_BPS`.
    pub confidence_bps: u16,
    pub created_at: i64,
    pub device_sig: Ed25519Signature,
    #[serde(default)]
    pub witnesses: Vec<Witness>,
}

impl Checkpoint {
    /// Create and sign a checkpoint of `position`.
    pub fn create(
        keypair: &Keypair,
        position: &ChainPosition,
        raw_balance: u64,
        confidence_bps: u16,
        created_at: i64,
    ) -> Result<Self, CoreError> {
        let signer = keypair.public_key();
        if signer != position.device {
            return Err(CoreError::SignerMismatch {
                expected: position.device,
                got: signer,
            });
        }
        if confidence_bps > MAX_CONFIDENCE_BPS {
            return Err(CoreError::InvalidArgument(format!(
                "confidence {} exceeds {}",
                confidence_bps, MAX_CONFIDENCE_BPS
            )));
        }

        let mut checkpoint = Self {
            device: position.device,
            chain_head: position.head,
            chain_index: position.index,
            totals: position.totals,
            raw_balance,
            confidence_bps,
            created_at,
            device_sig: Ed25519Signature::ZERO,
            witnesses: Vec::new(),
        };
        checkpoint.device_sig = keypair.sign(&checkpoint.signable_bytes());
        Ok(checkpoint)
    }

    pub fn signable_bytes(&self) -> Vec<u8> {
        checkpoint_signable_bytes(self)
    }

    /// The chain position this checkpoint attests to.
    pub fn position(&self) -> ChainPosition {
        ChainPosition {
            device: self.device,
            head: self.chain_head,
            index: self.chain_index,
            totals: self.totals,
        }
    }

    /// Countersign as a witness. Witnessing twice is a no-op.
    pub fn add_witness(&mut self, keypair: &Keypair) -> Result<(), CoreError> {
        let witness = keypair.public_key();
        if witness == self.device {
            return Err(CoreError::InvalidArgument(
                "a device cannot witness its own checkpoint".into(),
            ));
        }
        if self.is_witnessed_by(&witness) {
            return Ok(());
        }
        let signature = keypair.sign(&self.signable_bytes());
        self.witnesses.push(Witness { witness, signature });
        Ok(())
    }

    pub fn is_witnessed_by(&self, key: &Ed25519PublicKey) -> bool {
        self.witnesses.iter().any(|w| w.witness == *key)
    }

    /// True when this checkpoint was taken at least `epoch_len_ms` ago.
    pub fn is_due(last: Option<&Checkpoint>, now: i64, epoch_len_ms: i64) -> bool {
        match last {
            None => true,
            Some(cp) => now.saturating_sub(cp.created_at) >= epoch_len_ms,
        }
    }

    /// True if `other` is later in the same device's chain.
    pub fn is_superseded_by(&self, other: &Checkpoint) -> bool {
        other.device == self.device
            && (other.chain_index > self.chain_index
                || (other.chain_index == self.chain_index && other.created_at > self.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn position(keypair: &Keypair) -> ChainPosition {
        ChainPosition {
            device: keypair.public_key(),
            head: RecordId::from_bytes([4; 32]),
            index: 12,
            totals: CumulativeTotals::new(1_000, 2_000),
        }
    }

    #[test]
    fn test_create_and_witness() {
        let owner = Keypair::from_seed(&[1; 32]);
        let peer = Keypair::from_seed(&[2; 32]);
        let mut cp = Checkpoint::create(&owner, &position(&owner), 500, 9_000, DAY_MS).unwrap();

        owner.public_key().verify(&cp.signable_bytes(), &cp.device_sig).unwrap();

        cp.add_witness(&peer).unwrap();
        cp.add_witness(&peer).unwrap();
        assert_eq!(cp.witnesses.len(), 1);
        assert!(cp.is_witnessed_by(&peer.public_key()));
        peer.public_key()
            .verify(&cp.signable_bytes(), &cp.witnesses[0].signature)
            .unwrap();
    }

    #[test]
    fn test_self_witness_rejected() {
        let owner = Keypair::from_seed(&[1; 32]);
        let mut cp = Checkpoint::create(&owner, &position(&owner), 0, 0, 0).unwrap();
        assert!(cp.add_witness(&owner).is_err());
    }

    #[test]
    fn test_create_rejects_foreign_position_and_confidence() {
        let owner = Keypair::from_seed(&[1; 32]);
        let other = Keypair::from_seed(&[2; 32]);
        assert!(matches!(
            Checkpoint::create(&other, &position(&owner), 0, 0, 0),
            Err(CoreError::SignerMismatch { .. })
        ));
        assert!(Checkpoint::create(&owner, &position(&owner), 0, MAX_CONFIDENCE_BPS + 1, 0).is_err());
    }

    #[test]
    fn test_is_due() {
        let owner = Keypair::from_seed(&[1; 32]);
        let cp = Checkpoint::create(&owner, &position(&owner), 0, 0, 0).unwrap();
        let epoch = 7 * DAY_MS;

        assert!(Checkpoint::is_due(None, 0, epoch));
        assert!(!Checkpoint::is_due(Some(&cp), 6 * DAY_MS, epoch));
        assert!(Checkpoint::is_due(Some(&cp), 7 * DAY_MS, epoch));
    }

    #[test]
    fn test_superseded() {
        let owner = Keypair::from_seed(&[1; 32]);
        let early = Checkpoint::create(&owner, &position(&owner), 0, 0, 0).unwrap();
        let mut later_pos = position(&owner);
        later_pos.index += 1;
        let later = Checkpoint::create(&owner, &later_pos, 0, 0, 10).unwrap();

        assert!(early.is_superseded_by(&later));
        assert!(!later.is_superseded_by(&early));
    }
}
