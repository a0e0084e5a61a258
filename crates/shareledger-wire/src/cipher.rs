//! Session encryption for payloads between two paired devices.
//!
//! Both sides agree on a secret via X25519, then derive a ChaCha20-Poly1305
//! key bound to a caller-supplied context (for example, both public keys).

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use shareledger_core::SharedSecret;

use crate::codec::{decode_frame, encode_frame};
use crate::envelope::Envelope;
use crate::error::{Result, WireError};

/// Nonce length for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length.
pub const TAG_SIZE: usize = 16;

const KEY_CONTEXT: &str = "shareledger-wire v1 session key";

/// Symmetric cipher for one session. Sealed output is `nonce || ciphertext`.
#[derive(Clone)]
pub struct SessionCipher {
    key: [u8; 32],
}

impl SessionCipher {
    /// Derive a session key from a shared secret and a context string.
    pub fn derive(shared: &SharedSecret, context: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
        hasher.update(shared.as_bytes());
        hasher.update(context);
        Self {
            key: *hasher.finalize().as_bytes(),
        }
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key).map_err(|e| WireError::Crypto(e.to_string()))
    }

    /// Encrypt under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| WireError::Crypto(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt and authenticate.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(WireError::Crypto(format!(
                "sealed payload of {} bytes is shorter than nonce and tag",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WireError::Crypto("authentication failed".into()))
    }

    /// Frame and seal an envelope.
    pub fn seal_envelope(&self, envelope: &Envelope, max: usize) -> Result<Vec<u8>> {
        self.seal(&encode_frame(envelope, max)?)
    }

    /// Open and decode a sealed frame.
    pub fn open_envelope(&self, sealed: &[u8], max: usize) -> Result<Envelope> {
        decode_frame(&self.open(sealed)?, max)
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCipher([redacted])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MAX_MESSAGE_SIZE;
    use shareledger_core::{ChainPosition, Keypair, SessionSecret};

    fn pair() -> (SessionCipher, SessionCipher) {
        let alice = SessionSecret::generate();
        let bob = SessionSecret::generate();
        let ab = alice.diffie_hellman(&bob.public_key()).unwrap();
        let ba = bob.diffie_hellman(&alice.public_key()).unwrap();
        (
            SessionCipher::derive(&ab, b"alice|bob"),
            SessionCipher::derive(&ba, b"alice|bob"),
        )
    }

    #[test]
    fn test_both_sides_interoperate() {
        let (alice, bob) = pair();
        let sealed = alice.seal(b"chunk 7").unwrap();
        assert_eq!(bob.open(&sealed).unwrap(), b"chunk 7");
    }

    #[test]
    fn test_nonce_is_fresh() {
        let (alice, _) = pair();
        assert_ne!(alice.seal(b"x").unwrap(), alice.seal(b"x").unwrap());
    }

    #[test]
    fn test_tamper_detected() {
        let (alice, bob) = pair();
        let mut sealed = alice.seal(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 1;
        assert!(matches!(bob.open(&sealed), Err(WireError::Crypto(_))));
        assert!(matches!(bob.open(&sealed[..10]), Err(WireError::Crypto(_))));
    }

    #[test]
    fn test_context_separates_keys() {
        let alice = SessionSecret::generate();
        let bob = SessionSecret::generate();
        let shared = alice.diffie_hellman(&bob.public_key()).unwrap();
        let one = SessionCipher::derive(&shared, b"one");
        let two = SessionCipher::derive(&shared, b"two");
        let sealed = one.seal(b"hello").unwrap();
        assert!(two.open(&sealed).is_err());
    }

    #[test]
    fn test_sealed_envelope() {
        let (alice, bob) = pair();
        let envelope = Envelope::ChainPosition(ChainPosition::genesis(
            Keypair::from_seed(&[5; 32]).public_key(),
        ));
        let sealed = alice.seal_envelope(&envelope, MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(bob.open_envelope(&sealed, MAX_MESSAGE_SIZE).unwrap(), envelope);
    }
}
