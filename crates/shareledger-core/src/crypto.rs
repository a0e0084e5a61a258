//! Cryptographic primitives for the ledger.
//!
//! Wraps Ed25519 signing, Blake3 hashing and X25519 key agreement with strong
//! types. Everything above this module only ever hands these functions the
//! signable bytes of an entity.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use x25519_dalek::{PublicKey as DalekX25519Public, StaticSecret};

use crate::error::CoreError;

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero hash (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Blake3Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Hash an ordered sequence of chunk hashes.
///
/// Equivalent to hashing their concatenation, so reordering changes the digest.
pub fn hash_chunks(chunks: &[Blake3Hash]) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(&chunk.0);
    }
    Blake3Hash(*hasher.finalize().as_bytes())
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Verify a signature over a message.
    ///
    /// `InvalidPublicKey` means the check could not run at all;
    /// `InvalidSignature` is a clean rejection.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Ed25519PublicKey {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into().map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self(arr))
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero signature (invalid, used as placeholder).
    pub const ZERO: Self = Self([0u8; 64]);
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 64]> for Ed25519Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Ed25519Signature {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 64] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidSignatureLength { got: slice.len() })?;
        Ok(Self(arr))
    }
}

// serde only derives arrays up to 32 elements.
impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> Visitor<'de> for SignatureVisitor {
            type Value = Ed25519Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("64 signature bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let arr: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Ed25519Signature(arr))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut arr = [0u8; 64];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(Ed25519Signature(arr))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

/// A device identity keypair.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create from untrusted secret key bytes.
    ///
    /// Accepts a 32-byte seed or the 64-byte `seed || public key` form.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, CoreError> {
        let signing_key = match secret.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(secret);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut pair = [0u8; 64];
                pair.copy_from_slice(secret);
                SigningKey::from_keypair_bytes(&pair).map_err(|_| CoreError::InvalidPublicKey)?
            }
            got => return Err(CoreError::InvalidPrivateKey { got }),
        };
        Ok(Self { signing_key })
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Generate a fresh identity keypair.
pub fn generate_keypair() -> Keypair {
    Keypair::generate()
}

/// Sign with raw secret key bytes. Malformed keys are an error, never a
/// signature under some other key.
pub fn sign(secret: &[u8], message: &[u8]) -> Result<Ed25519Signature, CoreError> {
    Ok(Keypair::from_secret_bytes(secret)?.sign(message))
}

/// Verify with raw key and signature bytes.
///
/// Returns `Ok(false)` for a clean rejection and `Err` when the inputs are
/// malformed and no verdict is possible.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CoreError> {
    let public_key = Ed25519PublicKey::try_from(public_key)?;
    let signature = Ed25519Signature::try_from(signature)?;
    match public_key.verify(message, &signature) {
        Ok(()) => Ok(true),
        Err(CoreError::InvalidSignature) => Ok(false),
        Err(e) => Err(e),
    }
}

/// An X25519 public key for session key agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPublicKey(pub [u8; 32]);

impl SessionPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// An X25519 static secret for session key agreement.
///
/// Unlike Ed25519, X25519 keys are only for key agreement, not signing.
pub struct SessionSecret(StaticSecret);

impl SessionSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from raw secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Get the raw secret bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> SessionPublicKey {
        SessionPublicKey(*DalekX25519Public::from(&self.0).as_bytes())
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Fails if the peer key is a low-order point that forces an all-zero secret.
    pub fn diffie_hellman(&self, peer_public: &SessionPublicKey) -> Result<SharedSecret, CoreError> {
        let shared = self.0.diffie_hellman(&DalekX25519Public::from(peer_public.0));
        if !shared.was_contributory() {
            return Err(CoreError::KeyAgreement("peer key is a low-order point".into()));
        }
        Ok(SharedSecret(*shared.as_bytes()))
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionSecret({:?})", self.public_key())
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Key agreement over raw key bytes.
pub fn derive_shared_secret(
    private_key: &[u8],
    peer_public_key: &[u8],
) -> Result<SharedSecret, CoreError> {
    let secret: [u8; 32] = private_key.try_into().map_err(|_| {
        CoreError::KeyAgreement(format!("private key must be 32 bytes, got {}", private_key.len()))
    })?;
    let peer: [u8; 32] = peer_public_key.try_into().map_err(|_| {
        CoreError::KeyAgreement(format!(
            "peer public key must be 32 bytes, got {}",
            peer_public_key.len()
        ))
    })?;
    SessionSecret::from_bytes(secret).diffie_hellman(&SessionPublicKey(peer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        let tampered = b"hello worlD";
        assert!(matches!(
            keypair.public_key().verify(tampered, &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_with_other_key_fails() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let signature = alice.sign(b"transfer");

        assert!(bob.public_key().verify(b"transfer", &signature).is_err());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_raw_sign_verify() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let sig = sign(&keypair.seed(), b"msg").unwrap();
        let pk = keypair.public_key();

        assert!(verify(pk.as_bytes(), b"msg", sig.as_bytes()).unwrap());
        assert!(!verify(pk.as_bytes(), b"other", sig.as_bytes()).unwrap());
    }

    #[test]
    fn test_sign_accepts_keypair_bytes() {
        let keypair = Keypair::from_seed(&[9; 32]);
        let mut full = [0u8; 64];
        full[..32].copy_from_slice(&keypair.seed());
        full[32..].copy_from_slice(keypair.public_key().as_bytes());

        let sig = sign(&full, b"msg").unwrap();
        keypair.public_key().verify(b"msg", &sig).unwrap();
    }

    #[test]
    fn test_sign_rejects_malformed_private_key() {
        let result = sign(&[0u8; 31], b"msg");
        assert!(matches!(result, Err(CoreError::InvalidPrivateKey { got: 31 })));

        let result = sign(&[], b"msg");
        assert!(matches!(result, Err(CoreError::InvalidPrivateKey { got: 0 })));
    }

    #[test]
    fn test_verify_rejects_malformed_inputs() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"msg");

        assert!(matches!(
            verify(&[1, 2, 3], b"msg", sig.as_bytes()),
            Err(CoreError::InvalidPublicKey)
        ));
        assert!(matches!(
            verify(keypair.public_key().as_bytes(), b"msg", &[0u8; 10]),
            Err(CoreError::InvalidSignatureLength { got: 10 })
        ));
    }

    #[test]
    fn test_blake3_hash() {
        let data = b"test data";
        let h1 = Blake3Hash::hash(data);
        let h2 = Blake3Hash::hash(data);
        assert_eq!(h1, h2);

        let h3 = Blake3Hash::hash(b"different data");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_chunks_order_sensitive() {
        let a = Blake3Hash::hash(b"a");
        let b = Blake3Hash::hash(b"b");

        assert_ne!(hash_chunks(&[a, b]), hash_chunks(&[b, a]));
        assert_eq!(hash_chunks(&[a, b]), hash_chunks(&[a, b]));
    }

    #[test]
    fn test_hash_chunks_matches_concatenation() {
        let a = Blake3Hash::hash(b"a");
        let b = Blake3Hash::hash(b"b");
        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_bytes());
        concat.extend_from_slice(b.as_bytes());

        assert_eq!(hash_chunks(&[a, b]), Blake3Hash::hash(&concat));
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = Keypair::generate().public_key();
        let recovered = Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn test_signature_serde_json_roundtrip() {
        let sig = Keypair::generate().sign(b"x");
        let json = serde_json::to_string(&sig).unwrap();
        let back: Ed25519Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn test_shared_secret_agreement() {
        let alice = SessionSecret::generate();
        let bob = SessionSecret::generate();

        let ab = alice.diffie_hellman(&bob.public_key()).unwrap();
        let ba = bob.diffie_hellman(&alice.public_key()).unwrap();
        assert_eq!(ab, ba);

        let raw = derive_shared_secret(&alice.to_bytes(), bob.public_key().as_bytes()).unwrap();
        assert_eq!(raw, ab);
    }

    #[test]
    fn test_shared_secret_rejects_bad_input() {
        let alice = SessionSecret::generate();
        assert!(derive_shared_secret(&[0u8; 5], alice.public_key().as_bytes()).is_err());
        assert!(derive_shared_secret(&alice.to_bytes(), &[0u8; 31]).is_err());
        // The all-zero point has low order.
        assert!(derive_shared_secret(&alice.to_bytes(), &[0u8; 32]).is_err());
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sign_verify_roundtrip(seed in any::<[u8; 32]>(), msg in prop::collection::vec(any::<u8>(), 0..256)) {
            let keypair = Keypair::from_seed(&seed);
            let sig = sign(&seed, &msg).unwrap();
            prop_assert!(verify(keypair.public_key().as_bytes(), &msg, sig.as_bytes()).unwrap());
        }

        #[test]
        fn hash_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(Blake3Hash::hash(&data), Blake3Hash::hash(&data));
        }

        #[test]
        fn hash_chunks_detects_swaps(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assume!(a != b);
            let (a, b) = (Blake3Hash(a), Blake3Hash(b));
            prop_assert_ne!(hash_chunks(&[a, b]), hash_chunks(&[b, a]));
        }
    }
}
