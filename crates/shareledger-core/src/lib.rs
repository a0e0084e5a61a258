//! # Share Ledger Core
//!
//! Pure primitives for a peer-to-peer bandwidth-sharing ledger: dual-signed,
//! hash-chained share records and everything needed to check them.
//!
//! This crate contains no I/O, no storage, no networking. Every function is
//! safe to call from any number of threads at once.
//!
//! ## Key Types
//!
//! - [`ShareRecord`] - One completed transfer, signed by both parties
//! - [`RecordId`] - Content-addressed identifier (Blake3 of the signable bytes)
//! - [`PendingShareRecord`] - A record between the two signing phases
//! - [`ChainPosition`] - A device's chain head (index, predecessor, totals)
//! - [`FileMeta`], [`TransferRequest`] - Signed file descriptions and chunk asks
//! - [`PeerInfo`], [`Checkpoint`], [`ForkEvidence`] - Local views and proofs
//!
//! ## Signable Encoding
//!
//! Every entity has one byte layout that is signed and hashed. See the
//! [`signable`] module.

pub mod chain;
pub mod checkpoint;
pub mod crypto;
pub mod error;
pub mod file;
pub mod fork;
pub mod linker;
pub mod peer;
pub mod record;
pub mod request;
pub mod signable;
pub mod types;
pub mod validation;

pub use chain::{check_continuity, check_link, claimed_predecessor, verify_chain};
pub use checkpoint::{Checkpoint, Witness, MAX_CONFIDENCE_BPS};
pub use crypto::{
    derive_shared_secret, generate_keypair, hash_chunks, sign, verify, Blake3Hash,
    Ed25519PublicKey, Ed25519Signature, Keypair, SessionPublicKey, SessionSecret, SharedSecret,
};
pub use error::{CoreError, EncodingError, ValidationError};
pub use file::{expected_chunk_count, FileMeta, FileMetaBuilder};
pub use fork::{compare_records, detect_fork, ForkCheck, ForkEvidence};
pub use linker::PendingShareRecord;
pub use peer::PeerInfo;
pub use record::{ChainPosition, Role, ShareRecord, ShareRecordBuilder, ShareRecordHeader};
pub use request::{random_nonce, RequestStatus, TransferRequest, NONCE_LENGTH};
pub use signable::{
    checkpoint_signable_bytes, file_meta_signable_bytes, fork_evidence_signable_bytes,
    share_record_signable_bytes, transfer_request_signable_bytes,
};
pub use types::{CumulativeTotals, RecordId, Visibility};
pub use validation::{
    validate_checkpoint, validate_file_meta, validate_fork_evidence, validate_share_record,
    validate_share_record_structure, validate_transfer_request, verify_fork_evidence,
};
