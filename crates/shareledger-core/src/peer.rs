//! Cached view of a remote device's chain state.

use serde::{Deserialize, Serialize};

use crate::crypto::Ed25519PublicKey;
use crate::record::{ChainPosition, ShareRecord};
use crate::types::{CumulativeTotals, RecordId};

/// Local, non-authoritative opinion about a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub pubkey: Ed25519PublicKey,
    pub chain_head: RecordId,
    pub chain_index: u64,
    #[serde(default)]
    pub totals: CumulativeTotals,
    /// Local time the peer was last heard from (Unix milliseconds).
    pub last_seen: i64,
    pub has_fork_evidence: bool,
    /// Free-form transport label, e.g. "ble" or "wifi-direct".
    pub transport_type: String,
}

impl PeerInfo {
    /// A peer with an empty known chain.
    pub fn new(pubkey: Ed25519PublicKey, transport_type: impl Into<String>, now: i64) -> Self {
        Self {
            pubkey,
            chain_head: RecordId::ZERO,
            chain_index: 0,
            totals: CumulativeTotals::default(),
            last_seen: now,
            has_fork_evidence: false,
            transport_type: transport_type.into(),
        }
    }

    /// Fold a newly observed record into the cached state.
    ///
    /// The chain head only moves forward. Returns true if it moved.
    pub fn observe(&mut self, record: &ShareRecord, now: i64) -> bool {
        self.last_seen = self.last_seen.max(now);
        match ChainPosition::after(self.pubkey, record) {
            Some(position) if position.index > self.chain_index => {
                self.chain_head = position.head;
                self.chain_index = position.index;
                self.totals = position.totals;
                true
            }
            _ => false,
        }
    }

    pub fn mark_forked(&mut self) {
        self.has_fork_evidence = true;
    }

    /// The last known chain position.
    pub fn position(&self) -> ChainPosition {
        ChainPosition {
            device: self.pubkey,
            head: self.chain_head,
            index: self.chain_index,
            totals: self.totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::record::ShareRecordBuilder;

    #[test]
    fn test_observe_moves_forward_only() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let r1 = ShareRecordBuilder::new(
            ChainPosition::genesis(alice.public_key()),
            ChainPosition::genesis(bob.public_key()),
        )
        .bytes_total(300)
        .build()
        .sign_as_sender(&alice)
        .unwrap()
        .countersign(&bob)
        .unwrap();

        let mut peer = PeerInfo::new(bob.public_key(), "ble", 10);
        assert!(peer.observe(&r1, 20));
        assert_eq!(peer.chain_index, 1);
        assert_eq!(peer.chain_head, r1.id);
        assert_eq!(peer.totals, CumulativeTotals::new(0, 300));
        assert_eq!(peer.last_seen, 20);

        // Re-observing does not move the head, and last_seen never goes back.
        assert!(!peer.observe(&r1, 5));
        assert_eq!(peer.last_seen, 20);
    }

    #[test]
    fn test_observe_unrelated_record() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let carol = Keypair::from_seed(&[3; 32]);
        let r = ShareRecordBuilder::new(
            ChainPosition::genesis(alice.public_key()),
            ChainPosition::genesis(bob.public_key()),
        )
        .build()
        .sign_as_sender(&alice)
        .unwrap()
        .countersign(&bob)
        .unwrap();

        let mut peer = PeerInfo::new(carol.public_key(), "lan", 0);
        assert!(!peer.observe(&r, 1));
        assert_eq!(peer.position(), ChainPosition::genesis(carol.public_key()));
    }
}
