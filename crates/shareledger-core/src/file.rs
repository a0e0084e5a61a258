//! File metadata: the signed description of a shared file.

use serde::{Deserialize, Serialize};

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::signable::file_meta_signable_bytes;

/// Default chunk size for files split by [`FileMetaBuilder::from_content`].
pub const DEFAULT_CHUNK_SIZE: u64 = 256 * 1024;

/// Describes a shared file. Immutable once signed by its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Blake3 hash of the whole file content.
    pub file_hash: Blake3Hash,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    /// One hash per chunk, in file order.
    pub chunk_hashes: Vec<Blake3Hash>,
    pub origin: Ed25519PublicKey,
    /// Origin-claimed creation time (Unix milliseconds).
    pub created_at: i64,
    pub origin_sig: Ed25519Signature,
}

impl FileMeta {
    /// Signable bytes (everything except `origin_sig`).
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(file_meta_signable_bytes(self)?)
    }

    /// Number of chunks this file must have.
    pub fn expected_chunk_count(&self) -> Option<u64> {
        expected_chunk_count(self.file_size, self.chunk_size)
    }
}

/// `ceil(file_size / chunk_size)`, or `None` for a zero chunk size.
pub fn expected_chunk_count(file_size: u64, chunk_size: u64) -> Option<u64> {
    if chunk_size == 0 {
        return None;
    }
    Some(file_size.div_ceil(chunk_size))
}

/// Builder for signed file metadata.
#[derive(Debug, Clone)]
pub struct FileMetaBuilder {
    file_hash: Blake3Hash,
    file_name: String,
    file_size: u64,
    chunk_size: u64,
    chunk_hashes: Vec<Blake3Hash>,
    created_at: i64,
}

impl FileMetaBuilder {
    /// Start from a known content hash and name.
    pub fn new(file_hash: Blake3Hash, file_name: impl Into<String>) -> Self {
        Self {
            file_hash,
            file_name: file_name.into(),
            file_size: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_hashes: Vec::new(),
            created_at: 0,
        }
    }

    /// Split `content` into chunks and hash everything.
    pub fn from_content(file_name: impl Into<String>, content: &[u8], chunk_size: u64) -> Self {
        let chunk_hashes = if chunk_size == 0 {
            Vec::new()
        } else {
            content
                .chunks(chunk_size as usize)
                .map(Blake3Hash::hash)
                .collect()
        };
        Self {
            file_hash: Blake3Hash::hash(content),
            file_name: file_name.into(),
            file_size: content.len() as u64,
            chunk_size,
            chunk_hashes,
            created_at: 0,
        }
    }

    pub fn file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn chunk_hashes(mut self, chunk_hashes: Vec<Blake3Hash>) -> Self {
        self.chunk_hashes = chunk_hashes;
        self
    }

    pub fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sign as the origin device.
    pub fn sign(self, keypair: &Keypair) -> Result<FileMeta, CoreError> {
        let mut meta = FileMeta {
            file_hash: self.file_hash,
            file_name: self.file_name,
            file_size: self.file_size,
            chunk_size: self.chunk_size,
            chunk_hashes: self.chunk_hashes,
            origin: keypair.public_key(),
            created_at: self.created_at,
            origin_sig: Ed25519Signature::ZERO,
        };
        let message = meta.signable_bytes()?;
        meta.origin_sig = keypair.sign(&message);
        Ok(meta)
    }
}
