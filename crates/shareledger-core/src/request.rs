//! Transfer requests: a signed ask for chunks of a file.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::signable::transfer_request_signable_bytes;

/// Length of the anti-replay nonce.
pub const NONCE_LENGTH: usize = 16;

/// A signed request for specific chunk indices of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub requester: Ed25519PublicKey,
    pub file_hash: Blake3Hash,
    pub chunk_indices: Vec<u32>,
    /// Anti-replay nonce.
    pub nonce: [u8; NONCE_LENGTH],
    /// Requester-claimed time (Unix milliseconds).
    pub timestamp: i64,
    pub signature: Ed25519Signature,
}

impl TransferRequest {
    /// Create and sign a request with a fresh random nonce.
    pub fn create(
        keypair: &Keypair,
        file_hash: Blake3Hash,
        chunk_indices: Vec<u32>,
        timestamp: i64,
    ) -> Result<Self, CoreError> {
        Self::create_with_nonce(keypair, file_hash, chunk_indices, random_nonce(), timestamp)
    }

    /// Create and sign a request with a caller-chosen nonce.
    pub fn create_with_nonce(
        keypair: &Keypair,
        file_hash: Blake3Hash,
        chunk_indices: Vec<u32>,
        nonce: [u8; NONCE_LENGTH],
        timestamp: i64,
    ) -> Result<Self, CoreError> {
        let mut request = Self {
            requester: keypair.public_key(),
            file_hash,
            chunk_indices,
            nonce,
            timestamp,
            signature: Ed25519Signature::ZERO,
        };
        let message = request.signable_bytes()?;
        request.signature = keypair.sign(&message);
        Ok(request)
    }

    /// Signable bytes (everything except `signature`).
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(transfer_request_signable_bytes(self)?)
    }

    /// The hash share records use to point back at this request.
    pub fn request_hash(&self) -> Result<Blake3Hash, CoreError> {
        Ok(Blake3Hash::hash(&self.signable_bytes()?))
    }
}

/// A fresh random nonce.
pub fn random_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Lifecycle of a request on the responding device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "fulfilled" => Some(Self::Fulfilled),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Only pending requests may move, and only to a final state.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fulfilled) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_hash_depends_on_nonce() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let file = Blake3Hash::hash(b"file");
        let a = TransferRequest::create_with_nonce(&keypair, file, vec![1, 2], [0; 16], 10).unwrap();
        let b = TransferRequest::create_with_nonce(&keypair, file, vec![1, 2], [1; 16], 10).unwrap();

        assert_ne!(a.request_hash().unwrap(), b.request_hash().unwrap());
    }

    #[test]
    fn test_random_nonces_differ() {
        assert_ne!(random_nonce(), random_nonce());
    }

    #[test]
    fn test_status_transitions() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Fulfilled));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Fulfilled.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert_eq!(RequestStatus::parse(Fulfilled.as_str()), Some(Fulfilled));
        assert_eq!(RequestStatus::parse("done"), None);
    }
}
