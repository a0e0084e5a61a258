//! Chain linking: two-phase signing of a share record.
//!
//! 1. The sender signs the signable bytes; only the signature is stored.
//! 2. The receiver checks the proposal, signs the same bytes, and the record
//!    id is fixed as the hash of those bytes.
//!
//! The id never depends on either signature.

use serde::{Deserialize, Serialize};

use crate::crypto::{Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::record::{ShareRecord, ShareRecordHeader};
use crate::types::RecordId;

/// A record between the two signing phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingShareRecord {
    pub header: ShareRecordHeader,
    pub sender_sig: Option<Ed25519Signature>,
}

impl PendingShareRecord {
    pub fn new(header: ShareRecordHeader) -> Self {
        Self {
            header,
            sender_sig: None,
        }
    }

    /// Store the sender signature. The id stays undefined.
    pub fn attach_sender_sig(&mut self, signature: Ed25519Signature) {
        self.sender_sig = Some(signature);
    }

    /// Store the receiver signature and derive the id.
    ///
    /// Fails with `MissingSenderSignature` if the sender has not signed yet.
    pub fn attach_receiver_sig(self, signature: Ed25519Signature) -> Result<ShareRecord, CoreError> {
        let sender_sig = self.sender_sig.ok_or(CoreError::MissingSenderSignature)?;
        let id = self.header.compute_id()?;
        Ok(ShareRecord {
            header: self.header,
            sender_sig,
            receiver_sig: signature,
            id,
        })
    }

    /// Phase one, performed by the sender's device.
    pub fn sign_as_sender(mut self, keypair: &Keypair) -> Result<Self, CoreError> {
        let signer = keypair.public_key();
        if signer != self.header.sender {
            return Err(CoreError::SignerMismatch {
                expected: self.header.sender,
                got: signer,
            });
        }
        let message = self.header.signable_bytes()?;
        self.attach_sender_sig(keypair.sign(&message));
        Ok(self)
    }

    /// Phase two, performed by the receiver's device.
    ///
    /// Verifies the sender signature before countersigning. Checking that the
    /// proposed receiver index, predecessor and totals match the receiver's
    /// own chain is the caller's job.
    pub fn countersign(self, keypair: &Keypair) -> Result<ShareRecord, CoreError> {
        let signer = keypair.public_key();
        if signer != self.header.receiver {
            return Err(CoreError::SignerMismatch {
                expected: self.header.receiver,
                got: signer,
            });
        }
        let sender_sig = self.sender_sig.ok_or(CoreError::MissingSenderSignature)?;
        let message = self.header.signable_bytes()?;
        self.header.sender.verify(&message, &sender_sig)?;

        let receiver_sig = keypair.sign(&message);
        self.attach_receiver_sig(receiver_sig)
    }

    /// The id this record will have once finalized.
    pub fn expected_id(&self) -> Result<RecordId, CoreError> {
        self.header.compute_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Blake3Hash;
    use crate::record::{ChainPosition, ShareRecordBuilder};

    fn pending(sender: &Keypair, receiver: &Keypair) -> PendingShareRecord {
        ShareRecordBuilder::new(
            ChainPosition::genesis(sender.public_key()),
            ChainPosition::genesis(receiver.public_key()),
        )
        .file_hash(Blake3Hash::hash(b"file"))
        .chunk_hashes(vec![Blake3Hash::hash(b"chunk-0")])
        .bytes_total(1024)
        .timestamp(1_736_870_400_000)
        .build()
    }

    #[test]
    fn test_two_phase_signing() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);

        let proposal = pending(&alice, &bob).sign_as_sender(&alice).unwrap();
        let expected_id = proposal.expected_id().unwrap();
        let record = proposal.countersign(&bob).unwrap();

        assert_eq!(record.id, expected_id);
        assert_eq!(record.id, record.compute_id().unwrap());

        let message = record.header.signable_bytes().unwrap();
        alice.public_key().verify(&message, &record.sender_sig).unwrap();
        bob.public_key().verify(&message, &record.receiver_sig).unwrap();
    }

    #[test]
    fn test_receiver_sig_without_sender_sig() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let proposal = pending(&alice, &bob);

        let result = proposal.attach_receiver_sig(Ed25519Signature::ZERO);
        assert!(matches!(result, Err(CoreError::MissingSenderSignature)));
    }

    #[test]
    fn test_id_independent_of_signatures() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);

        let mut a = pending(&alice, &bob);
        a.attach_sender_sig(Ed25519Signature::from_bytes([1; 64]));
        let a = a.attach_receiver_sig(Ed25519Signature::from_bytes([2; 64])).unwrap();

        let mut b = pending(&alice, &bob);
        b.attach_sender_sig(Ed25519Signature::from_bytes([3; 64]));
        let b = b.attach_receiver_sig(Ed25519Signature::from_bytes([4; 64])).unwrap();

        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);

        let result = pending(&alice, &bob).sign_as_sender(&bob);
        assert!(matches!(result, Err(CoreError::SignerMismatch { .. })));

        let proposal = pending(&alice, &bob).sign_as_sender(&alice).unwrap();
        assert!(matches!(
            proposal.countersign(&alice),
            Err(CoreError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn test_countersign_rejects_forged_sender_sig() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let mallory = Keypair::from_seed(&[3; 32]);

        let mut proposal = pending(&alice, &bob);
        let message = proposal.header.signable_bytes().unwrap();
        proposal.attach_sender_sig(mallory.sign(&message));

        assert!(matches!(
            proposal.countersign(&bob),
            Err(CoreError::InvalidSignature)
        ));
    }
}
