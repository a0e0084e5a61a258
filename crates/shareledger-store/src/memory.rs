//! In-memory implementation of the Store trait.
//!
//! Primarily for testing. Same semantics as SQLite, nothing persisted.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use shareledger_core::{
    Blake3Hash, Checkpoint, Ed25519PublicKey, FileMeta, ForkEvidence, PeerInfo, RecordId,
    RequestStatus, ShareRecord, TransferRequest,
};

use crate::error::{Result, StoreError};
use crate::traits::{
    check_limit, check_range, check_record_fits, check_transition, InsertResult, Store,
    StoredRequest,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: HashMap<RecordId, ShareRecord>,

    /// Chain index: (device, own index) -> record id. Each record appears
    /// twice, once per party.
    positions: HashMap<(Ed25519PublicKey, u64), RecordId>,

    peers: HashMap<Ed25519PublicKey, PeerInfo>,

    files: HashMap<Blake3Hash, FileMeta>,

    requests: HashMap<Blake3Hash, StoredRequest>,

    /// Keyed by (device, chain_index, created_at).
    checkpoints: BTreeMap<(Ed25519PublicKey, u64, i64), Checkpoint>,

    fork_evidence: Vec<ForkEvidence>,
}

impl MemoryStoreInner {
    fn chain(&self, device: &Ed25519PublicKey) -> Vec<(u64, &ShareRecord)> {
        let mut chain: Vec<(u64, &ShareRecord)> = self
            .positions
            .iter()
            .filter(|((d, _), _)| d == device)
            .filter_map(|((_, index), id)| self.records.get(id).map(|r| (*index, r)))
            .collect();
        chain.sort_by_key(|(index, _)| *index);
        chain
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_record(&self, record: &ShareRecord) -> Result<InsertResult> {
        check_record_fits(record)?;
        let mut inner = self.write()?;

        if inner.records.contains_key(&record.id) {
            return Ok(InsertResult::AlreadyExists);
        }

        let h = &record.header;
        let slots = [
            (h.sender, h.sender_record_index),
            (h.receiver, h.receiver_record_index),
        ];
        for (device, index) in slots {
            if let Some(&existing) = inner.positions.get(&(device, index)) {
                return Ok(InsertResult::Conflict {
                    device,
                    index,
                    existing,
                });
            }
        }

        for slot in slots {
            inner.positions.insert(slot, record.id);
        }
        inner.records.insert(record.id, record.clone());

        Ok(InsertResult::Inserted)
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<ShareRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn get_record_at(
        &self,
        device: &Ed25519PublicKey,
        index: u64,
    ) -> Result<Option<ShareRecord>> {
        let inner = self.read()?;
        Ok(inner
            .positions
            .get(&(*device, index))
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn get_records_by_device(
        &self,
        device: &Ed25519PublicKey,
        from_index: u64,
        limit: usize,
    ) -> Result<Vec<ShareRecord>> {
        check_limit(limit)?;
        let inner = self.read()?;
        Ok(inner
            .chain(device)
            .into_iter()
            .filter(|(index, _)| *index >= from_index)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn get_records_between(
        &self,
        device: &Ed25519PublicKey,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<ShareRecord>> {
        check_limit(limit)?;
        check_range(from, to)?;
        let inner = self.read()?;
        Ok(inner
            .chain(device)
            .into_iter()
            .filter(|(index, _)| (from..to).contains(index))
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn get_latest_record(&self, device: &Ed25519PublicKey) -> Result<Option<ShareRecord>> {
        let inner = self.read()?;
        Ok(inner.chain(device).last().map(|(_, r)| (*r).clone()))
    }

    async fn counterparty_diversity(
        &self,
        device: &Ed25519PublicKey,
        window: usize,
    ) -> Result<BTreeMap<Ed25519PublicKey, u32>> {
        let inner = self.read()?;
        let mut chain = inner.chain(device);
        chain.sort_by_key(|(index, r)| Reverse((r.timestamp(), *index)));

        let mut counts = BTreeMap::new();
        for (_, record) in chain.into_iter().take(window) {
            if let Some(peer) = record.counterparty_of(device) {
                *counts.entry(peer).or_insert(0u32) += 1;
            }
        }
        Ok(counts)
    }

    async fn upsert_peer(&self, peer: &PeerInfo) -> Result<()> {
        self.write()?.peers.insert(peer.pubkey, peer.clone());
        Ok(())
    }

    async fn get_peer(&self, pubkey: &Ed25519PublicKey) -> Result<Option<PeerInfo>> {
        Ok(self.read()?.peers.get(pubkey).cloned())
    }

    async fn list_peers(&self, limit: usize) -> Result<Vec<PeerInfo>> {
        check_limit(limit)?;
        let inner = self.read()?;
        let mut peers: Vec<PeerInfo> = inner.peers.values().cloned().collect();
        peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.pubkey.cmp(&b.pubkey)));
        peers.truncate(limit);
        Ok(peers)
    }

    async fn evict_peers(&self, keep: usize) -> Result<usize> {
        check_limit(keep)?;
        let mut inner = self.write()?;
        let mut order: Vec<(i64, Ed25519PublicKey)> =
            inner.peers.values().map(|p| (p.last_seen, p.pubkey)).collect();
        order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let doomed: Vec<Ed25519PublicKey> = order.into_iter().skip(keep).map(|(_, k)| k).collect();
        for key in &doomed {
            inner.peers.remove(key);
        }
        Ok(doomed.len())
    }

    async fn insert_file(&self, file: &FileMeta) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.files.contains_key(&file.file_hash) {
            return Ok(false);
        }
        inner.files.insert(file.file_hash, file.clone());
        Ok(true)
    }

    async fn get_file(&self, file_hash: &Blake3Hash) -> Result<Option<FileMeta>> {
        Ok(self.read()?.files.get(file_hash).cloned())
    }

    async fn list_files(&self, limit: usize, offset: usize) -> Result<Vec<FileMeta>> {
        check_limit(limit)?;
        let inner = self.read()?;
        let mut files: Vec<&FileMeta> = inner.files.values().collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.file_hash.cmp(&b.file_hash)));
        Ok(files.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn search_files(&self, fragment: &str, limit: usize) -> Result<Vec<FileMeta>> {
        check_limit(limit)?;
        let needle = fragment.to_ascii_lowercase();
        let inner = self.read()?;
        let mut files: Vec<&FileMeta> = inner
            .files
            .values()
            .filter(|f| f.file_name.to_ascii_lowercase().contains(&needle))
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.file_hash.cmp(&b.file_hash)));
        Ok(files.into_iter().take(limit).cloned().collect())
    }

    async fn insert_request(&self, request: &TransferRequest) -> Result<bool> {
        let request_hash = request
            .request_hash()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let mut inner = self.write()?;
        if inner.requests.contains_key(&request_hash) {
            return Ok(false);
        }
        inner.requests.insert(
            request_hash,
            StoredRequest {
                request_hash,
                request: request.clone(),
                status: RequestStatus::Pending,
            },
        );
        Ok(true)
    }

    async fn get_request(&self, request_hash: &Blake3Hash) -> Result<Option<StoredRequest>> {
        Ok(self.read()?.requests.get(request_hash).cloned())
    }

    async fn set_request_status(
        &self,
        request_hash: &Blake3Hash,
        status: RequestStatus,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .requests
            .get_mut(request_hash)
            .ok_or_else(|| StoreError::NotFound(format!("request {}", request_hash.to_hex())))?;
        check_transition(stored.status, status)?;
        stored.status = status;
        Ok(())
    }

    async fn list_requests(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<StoredRequest>> {
        check_limit(limit)?;
        let inner = self.read()?;
        let mut requests: Vec<&StoredRequest> =
            inner.requests.values().filter(|r| r.status == status).collect();
        requests.sort_by(|a, b| {
            a.request
                .timestamp
                .cmp(&b.request.timestamp)
                .then(a.request_hash.cmp(&b.request_hash))
        });
        Ok(requests.into_iter().take(limit).cloned().collect())
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write()?.checkpoints.insert(
            (checkpoint.device, checkpoint.chain_index, checkpoint.created_at),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn latest_checkpoint(&self, device: &Ed25519PublicKey) -> Result<Option<Checkpoint>> {
        let inner = self.read()?;
        Ok(inner
            .checkpoints
            .range((*device, 0, i64::MIN)..=(*device, u64::MAX, i64::MAX))
            .next_back()
            .map(|(_, cp)| cp.clone()))
    }

    async fn list_checkpoints(&self, device: &Ed25519PublicKey) -> Result<Vec<Checkpoint>> {
        let inner = self.read()?;
        Ok(inner
            .checkpoints
            .range((*device, 0, i64::MIN)..=(*device, u64::MAX, i64::MAX))
            .map(|(_, cp)| cp.clone())
            .collect())
    }

    async fn append_fork_evidence(&self, evidence: &ForkEvidence) -> Result<bool> {
        let mut inner = self.write()?;
        let duplicate = inner.fork_evidence.iter().any(|e| {
            e.device == evidence.device
                && e.record_a == evidence.record_a
                && e.record_b == evidence.record_b
        });
        if duplicate {
            return Ok(false);
        }
        inner.fork_evidence.push(evidence.clone());
        Ok(true)
    }

    async fn list_fork_evidence(&self, device: &Ed25519PublicKey) -> Result<Vec<ForkEvidence>> {
        let inner = self.read()?;
        let mut evidence: Vec<ForkEvidence> = inner
            .fork_evidence
            .iter()
            .filter(|e| e.device == *device)
            .cloned()
            .collect();
        evidence.sort_by_key(|e| e.detected_at);
        Ok(evidence)
    }
}
