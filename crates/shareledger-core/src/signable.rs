//! Signable encoding: the exact bytes that are signed and hashed.
//!
//! Layout rules:
//! - Fixed field order per entity
//! - Integers are fixed-width big-endian (timestamps as two's complement u64)
//! - Byte fields are concatenated raw
//! - Only repeated fields carry a length prefix (u32 count)
//!
//! Signatures and identifiers are never part of the encoding. The file name
//! is written raw with no length prefix, so two files can share an encoding
//! when bytes shift between the name and the fields after it.

use crate::checkpoint::Checkpoint;
use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::EncodingError;
use crate::file::FileMeta;
use crate::fork::ForkEvidence;
use crate::record::ShareRecordHeader;
use crate::request::TransferRequest;
use crate::types::{CumulativeTotals, RecordId};

/// Longest file name accepted in file metadata, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Append-only byte builder for signable encodings.
struct SignableWriter {
    buf: Vec<u8>,
}

impl SignableWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn key(&mut self, key: &Ed25519PublicKey) -> &mut Self {
        self.raw(key.as_bytes())
    }

    fn hash(&mut self, hash: &Blake3Hash) -> &mut Self {
        self.raw(hash.as_bytes())
    }

    fn id(&mut self, id: &RecordId) -> &mut Self {
        self.raw(id.as_bytes())
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.raw(&value.to_be_bytes())
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.raw(&value.to_be_bytes())
    }

    fn u64(&mut self, value: u64) -> &mut Self {
        self.raw(&value.to_be_bytes())
    }

    fn timestamp(&mut self, value: i64) -> &mut Self {
        self.u64(value as u64)
    }

    fn totals(&mut self, totals: &CumulativeTotals) -> &mut Self {
        self.u64(totals.sent).u64(totals.received)
    }

    fn count(&mut self, field: &'static str, count: usize) -> Result<&mut Self, EncodingError> {
        let count32 =
            u32::try_from(count).map_err(|_| EncodingError::TooManyItems { field, count })?;
        Ok(self.u32(count32))
    }

    fn hashes(&mut self, field: &'static str, hashes: &[Blake3Hash]) -> Result<&mut Self, EncodingError> {
        self.count(field, hashes.len())?;
        for hash in hashes {
            self.hash(hash);
        }
        Ok(self)
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Signable bytes of file metadata.
///
/// `file_hash || name || size || chunk_size || n || n * chunk_hash || origin || created_at`
pub fn file_meta_signable_bytes(meta: &FileMeta) -> Result<Vec<u8>, EncodingError> {
    let name = meta.file_name.as_bytes();
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(EncodingError::FileNameTooLong {
            len: name.len(),
            max: MAX_FILE_NAME_LEN,
        });
    }

    let mut w = SignableWriter::with_capacity(32 + name.len() + 20 + meta.chunk_hashes.len() * 32 + 40);
    w.hash(&meta.file_hash)
        .raw(name)
        .u64(meta.file_size)
        .u64(meta.chunk_size)
        .hashes("chunk_hashes", &meta.chunk_hashes)?
        .key(&meta.origin)
        .timestamp(meta.created_at);
    Ok(w.finish())
}

/// Signable bytes of a transfer request.
///
/// `requester || file_hash || n || n * u32 index || nonce || timestamp`
pub fn transfer_request_signable_bytes(request: &TransferRequest) -> Result<Vec<u8>, EncodingError> {
    let mut w = SignableWriter::with_capacity(64 + 4 + request.chunk_indices.len() * 4 + 24);
    w.key(&request.requester)
        .hash(&request.file_hash)
        .count("chunk_indices", request.chunk_indices.len())?;
    for index in &request.chunk_indices {
        w.u32(*index);
    }
    w.raw(&request.nonce).timestamp(request.timestamp);
    Ok(w.finish())
}

/// Signable bytes of a share record.
///
/// Both parties sign exactly these bytes and the record id is their hash.
pub fn share_record_signable_bytes(header: &ShareRecordHeader) -> Result<Vec<u8>, EncodingError> {
    let mut w = SignableWriter::with_capacity(128 + 16 + 32 + 64 + 4 + header.chunk_hashes.len() * 32 + 20);
    w.key(&header.sender)
        .key(&header.receiver)
        .id(&header.prev_sender)
        .id(&header.prev_receiver)
        .u64(header.sender_record_index)
        .u64(header.receiver_record_index)
        .totals(&header.sender_totals)
        .totals(&header.receiver_totals)
        .hash(&header.request_hash)
        .hash(&header.file_hash)
        .hashes("chunk_hashes", &header.chunk_hashes)?
        .u64(header.bytes_total)
        .u32(header.visibility.to_u32())
        .timestamp(header.timestamp);
    Ok(w.finish())
}

/// Signable bytes of a checkpoint, shared by the owner and every witness.
///
/// `device || head || index || totals || raw_balance || confidence_bps || created_at`
pub fn checkpoint_signable_bytes(checkpoint: &Checkpoint) -> Vec<u8> {
    let mut w = SignableWriter::with_capacity(32 + 32 + 8 + 16 + 8 + 2 + 8);
    w.key(&checkpoint.device)
        .id(&checkpoint.chain_head)
        .u64(checkpoint.chain_index)
        .totals(&checkpoint.totals)
        .u64(checkpoint.raw_balance)
        .u16(checkpoint.confidence_bps)
        .timestamp(checkpoint.created_at);
    w.finish()
}

/// Signable bytes of fork evidence.
///
/// `device || record_a || record_b || detected_at`
pub fn fork_evidence_signable_bytes(evidence: &ForkEvidence) -> Vec<u8> {
    let mut w = SignableWriter::with_capacity(32 * 3 + 8);
    w.key(&evidence.device)
        .id(&evidence.record_a)
        .id(&evidence.record_b)
        .timestamp(evidence.detected_at);
    w.finish()
}
