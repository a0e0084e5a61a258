//! Store trait: the abstract interface for ledger persistence.
//!
//! The ledger facade is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests). Neither checks signatures: callers
//! hand them records that already passed validation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use shareledger_core::{
    Blake3Hash, Checkpoint, Ed25519PublicKey, FileMeta, ForkEvidence, PeerInfo, RecordId,
    RequestStatus, ShareRecord, TransferRequest,
};

use crate::error::{Result, StoreError};

/// Result of inserting a share record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// The identical record is already stored (idempotent, not an error).
    AlreadyExists,
    /// A different record already occupies one of this record's chain
    /// positions. This is a fork.
    Conflict {
        /// The device whose position is taken.
        device: Ed25519PublicKey,
        /// The contested chain index.
        index: u64,
        /// The record already stored there.
        existing: RecordId,
    },
}

/// A stored transfer request with its local status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    pub request_hash: Blake3Hash,
    pub request: TransferRequest,
    pub status: RequestStatus,
}

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **Idempotent inserts**: inserting the same record twice returns `AlreadyExists`.
/// - **Conflict detection**: a different record at an occupied (device, index)
///   returns `Conflict` and writes nothing.
/// - **Chain order**: per-device queries order by the device's own chain index,
///   whichever side of the record the device is on.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Share Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a validated record.
    async fn insert_record(&self, record: &ShareRecord) -> Result<InsertResult>;

    /// Get a record by its id.
    async fn get_record(&self, id: &RecordId) -> Result<Option<ShareRecord>>;

    /// Get the record at `index` in `device`'s chain.
    async fn get_record_at(&self, device: &Ed25519PublicKey, index: u64)
        -> Result<Option<ShareRecord>>;

    /// Records in `device`'s chain with index `>= from_index`, ascending, at most `limit`.
    async fn get_records_by_device(
        &self,
        device: &Ed25519PublicKey,
        from_index: u64,
        limit: usize,
    ) -> Result<Vec<ShareRecord>>;

    /// Records in `device`'s chain with index in `[from, to)`, ascending, at most `limit`.
    async fn get_records_between(
        &self,
        device: &Ed25519PublicKey,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<ShareRecord>>;

    /// The record with the highest index in `device`'s chain.
    async fn get_latest_record(&self, device: &Ed25519PublicKey) -> Result<Option<ShareRecord>>;

    /// Interaction counts per counterparty over the `window` most recent
    /// records (by timestamp) involving `device`.
    async fn counterparty_diversity(
        &self,
        device: &Ed25519PublicKey,
        window: usize,
    ) -> Result<BTreeMap<Ed25519PublicKey, u32>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Peers
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace the cached view of a peer.
    async fn upsert_peer(&self, peer: &PeerInfo) -> Result<()>;

    async fn get_peer(&self, pubkey: &Ed25519PublicKey) -> Result<Option<PeerInfo>>;

    /// Peers ordered by `last_seen`, most recent first.
    async fn list_peers(&self, limit: usize) -> Result<Vec<PeerInfo>>;

    /// Drop all but the `keep` most recently seen peers. Returns how many were removed.
    async fn evict_peers(&self, keep: usize) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert file metadata. Re-inserting the same hash is a no-op; returns
    /// true if the file was new.
    async fn insert_file(&self, file: &FileMeta) -> Result<bool>;

    async fn get_file(&self, file_hash: &Blake3Hash) -> Result<Option<FileMeta>>;

    /// Files ordered by `created_at`, newest first.
    async fn list_files(&self, limit: usize, offset: usize) -> Result<Vec<FileMeta>>;

    /// Files whose name contains `fragment` (case-insensitive), newest first.
    async fn search_files(&self, fragment: &str, limit: usize) -> Result<Vec<FileMeta>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transfer Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a request as pending. Returns false if it was already stored.
    async fn insert_request(&self, request: &TransferRequest) -> Result<bool>;

    async fn get_request(&self, request_hash: &Blake3Hash) -> Result<Option<StoredRequest>>;

    /// Move a request to `status`. Fails on unknown requests and on
    /// transitions out of a terminal state.
    async fn set_request_status(&self, request_hash: &Blake3Hash, status: RequestStatus)
        -> Result<()>;

    /// Requests in `status`, oldest first.
    async fn list_requests(&self, status: RequestStatus, limit: usize)
        -> Result<Vec<StoredRequest>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a checkpoint, replacing a stored one for the same
    /// (device, chain_index, created_at) so added witnesses are kept.
    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// The checkpoint with the highest chain index, latest first on ties.
    async fn latest_checkpoint(&self, device: &Ed25519PublicKey) -> Result<Option<Checkpoint>>;

    /// All checkpoints for a device, ascending by chain index.
    async fn list_checkpoints(&self, device: &Ed25519PublicKey) -> Result<Vec<Checkpoint>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Fork Evidence
    // ─────────────────────────────────────────────────────────────────────────

    /// Append fork evidence. Returns false if evidence naming the same
    /// (device, record_a, record_b) is already stored.
    async fn append_fork_evidence(&self, evidence: &ForkEvidence) -> Result<bool>;

    /// All evidence against a device, oldest first.
    async fn list_fork_evidence(&self, device: &Ed25519PublicKey) -> Result<Vec<ForkEvidence>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// True if any fork evidence against `device` is stored.
    fn is_forked(
        &self,
        device: &Ed25519PublicKey,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// The current chain position of `device` as far as this store knows.
    fn chain_position(
        &self,
        device: &Ed25519PublicKey,
    ) -> impl std::future::Future<Output = Result<shareledger_core::ChainPosition>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn is_forked(&self, device: &Ed25519PublicKey) -> Result<bool> {
        Ok(!self.list_fork_evidence(device).await?.is_empty())
    }

    async fn chain_position(
        &self,
        device: &Ed25519PublicKey,
    ) -> Result<shareledger_core::ChainPosition> {
        match self.get_latest_record(device).await? {
            None => Ok(shareledger_core::ChainPosition::genesis(*device)),
            Some(record) => shareledger_core::ChainPosition::after(*device, &record).ok_or_else(
                || StoreError::InvalidData(format!("latest record {} does not involve device", record.id)),
            ),
        }
    }
}

/// Reject a zero limit.
pub(crate) fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(StoreError::InvalidArgument("limit must be positive".into()));
    }
    Ok(())
}

/// Reject an empty or inverted index range.
pub(crate) fn check_range(from: u64, to: u64) -> Result<()> {
    if from >= to {
        return Err(StoreError::InvalidArgument(format!(
            "range start {} must be below end {}",
            from, to
        )));
    }
    Ok(())
}

/// Convert a counter or index to SQLite's signed integer range.
pub(crate) fn to_sql_int(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        StoreError::InvalidArgument(format!("{} {} exceeds {}", what, value, i64::MAX))
    })
}

/// Reject a record whose indices, totals or size cannot be stored as a
/// signed 64-bit integer. Both stores apply this before any write.
pub(crate) fn check_record_fits(record: &ShareRecord) -> Result<()> {
    let h = &record.header;
    for (value, what) in [
        (h.sender_record_index, "sender index"),
        (h.receiver_record_index, "receiver index"),
        (h.sender_totals.sent, "sender total sent"),
        (h.sender_totals.received, "sender total received"),
        (h.receiver_totals.sent, "receiver total sent"),
        (h.receiver_totals.received, "receiver total received"),
        (h.bytes_total, "bytes total"),
    ] {
        to_sql_int(value, what)?;
    }
    Ok(())
}

/// Check a request status transition.
pub(crate) fn check_transition(current: RequestStatus, next: RequestStatus) -> Result<()> {
    if current == next || current.can_transition_to(next) {
        return Ok(());
    }
    Err(StoreError::InvalidArgument(format!(
        "request cannot move from {} to {}",
        current, next
    )))
}
