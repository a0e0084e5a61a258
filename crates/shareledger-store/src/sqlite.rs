//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use shareledger_core::{
    Blake3Hash, Checkpoint, CumulativeTotals, Ed25519PublicKey, Ed25519Signature, FileMeta,
    ForkEvidence, PeerInfo, RecordId, RequestStatus, ShareRecord, ShareRecordHeader,
    TransferRequest, Visibility, Witness, NONCE_LENGTH,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    check_limit, check_range, check_record_fits, check_transition, to_sql_int, InsertResult, Store,
    StoredRequest,
};

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex. All operations run on the blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed. File databases use WAL.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migration::migrate(&mut conn)?;
        tracing::info!(path = %path.display(), "opened ledger database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

fn invalid_column(column: &str, ty: Type) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, column.into(), ty)
}

fn fixed<const N: usize>(row: &Row<'_>, column: &str) -> rusqlite::Result<[u8; N]> {
    let bytes: Vec<u8> = row.get(column)?;
    bytes.try_into().map_err(|_| invalid_column(column, Type::Blob))
}

fn key(row: &Row<'_>, column: &str) -> rusqlite::Result<Ed25519PublicKey> {
    fixed(row, column).map(Ed25519PublicKey)
}

fn sig(row: &Row<'_>, column: &str) -> rusqlite::Result<Ed25519Signature> {
    fixed(row, column).map(Ed25519Signature)
}

fn hash(row: &Row<'_>, column: &str) -> rusqlite::Result<Blake3Hash> {
    fixed(row, column).map(Blake3Hash)
}

fn record_id(row: &Row<'_>, column: &str) -> rusqlite::Result<RecordId> {
    fixed(row, column).map(RecordId)
}

/// Unordered u64 columns (file sizes, checkpoint balances) are stored as their
/// i64 bit pattern and read back unchanged.
fn uint(row: &Row<'_>, column: &str) -> rusqlite::Result<u64> {
    Ok(row.get::<_, Option<i64>>(column)?.unwrap_or(0) as u64)
}

fn hashes_to_blob(hashes: &[Blake3Hash]) -> Vec<u8> {
    hashes.iter().flat_map(|h| h.0).collect()
}

fn hashes_from_blob(row: &Row<'_>, column: &str) -> rusqlite::Result<Vec<Blake3Hash>> {
    let bytes: Vec<u8> = row.get(column)?;
    if bytes.len() % 32 != 0 {
        return Err(invalid_column(column, Type::Blob));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(chunk);
            Blake3Hash(arr)
        })
        .collect())
}

fn to_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let bytes: Vec<u8> = row.get(column)?;
    ciborium::from_reader(&bytes[..])
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Blob, e.to_string().into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

const RECORD_COLUMNS: &str = "id, sender, receiver, prev_sender, prev_receiver,
    sender_record_index, receiver_record_index, sender_sent, sender_received,
    receiver_sent, receiver_received, request_hash, file_hash, chunk_hashes,
    bytes_total, visibility, timestamp, sender_sig, receiver_sig";

/// Own-index expression for device `?1`.
const OWN_INDEX: &str =
    "CASE WHEN sender = ?1 THEN sender_record_index ELSE receiver_record_index END";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ShareRecord> {
    let visibility: u32 = row.get("visibility")?;
    let header = ShareRecordHeader {
        sender: key(row, "sender")?,
        receiver: key(row, "receiver")?,
        prev_sender: record_id(row, "prev_sender")?,
        prev_receiver: record_id(row, "prev_receiver")?,
        sender_record_index: uint(row, "sender_record_index")?,
        receiver_record_index: uint(row, "receiver_record_index")?,
        sender_totals: CumulativeTotals::new(
            uint(row, "sender_sent")?,
            uint(row, "sender_received")?,
        ),
        receiver_totals: CumulativeTotals::new(
            uint(row, "receiver_sent")?,
            uint(row, "receiver_received")?,
        ),
        request_hash: hash(row, "request_hash")?,
        file_hash: hash(row, "file_hash")?,
        chunk_hashes: hashes_from_blob(row, "chunk_hashes")?,
        bytes_total: uint(row, "bytes_total")?,
        visibility: Visibility::from_u32(visibility)
            .ok_or_else(|| invalid_column("visibility", Type::Integer))?,
        timestamp: row.get("timestamp")?,
    };

    Ok(ShareRecord {
        header,
        sender_sig: sig(row, "sender_sig")?,
        receiver_sig: sig(row, "receiver_sig")?,
        id: record_id(row, "id")?,
    })
}

fn row_to_peer(row: &Row<'_>) -> rusqlite::Result<PeerInfo> {
    Ok(PeerInfo {
        pubkey: key(row, "pubkey")?,
        chain_head: record_id(row, "chain_head")?,
        chain_index: uint(row, "chain_index")?,
        totals: CumulativeTotals::new(uint(row, "total_sent")?, uint(row, "total_received")?),
        last_seen: row.get("last_seen")?,
        has_fork_evidence: row.get::<_, i64>("has_fork_evidence")? != 0,
        transport_type: row.get("transport_type")?,
    })
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileMeta> {
    Ok(FileMeta {
        file_hash: hash(row, "file_hash")?,
        file_name: row.get("file_name")?,
        file_size: uint(row, "file_size")?,
        chunk_size: uint(row, "chunk_size")?,
        chunk_hashes: hashes_from_blob(row, "chunk_hashes")?,
        origin: key(row, "origin")?,
        created_at: row.get("created_at")?,
        origin_sig: sig(row, "origin_sig")?,
    })
}

fn row_to_request(row: &Row<'_>) -> rusqlite::Result<StoredRequest> {
    let status: String = row.get("status")?;
    Ok(StoredRequest {
        request_hash: hash(row, "request_hash")?,
        request: TransferRequest {
            requester: key(row, "requester")?,
            file_hash: hash(row, "file_hash")?,
            chunk_indices: from_cbor(row, "chunk_indices")?,
            nonce: fixed::<NONCE_LENGTH>(row, "nonce")?,
            timestamp: row.get("timestamp")?,
            signature: sig(row, "signature")?,
        },
        status: RequestStatus::parse(&status)
            .ok_or_else(|| invalid_column("status", Type::Text))?,
    })
}

fn row_to_checkpoint(row: &Row<'_>) -> rusqlite::Result<Checkpoint> {
    let confidence: i64 = row.get("confidence_bps")?;
    Ok(Checkpoint {
        device: key(row, "device")?,
        chain_head: record_id(row, "chain_head")?,
        chain_index: uint(row, "chain_index")?,
        totals: CumulativeTotals::new(uint(row, "total_sent")?, uint(row, "total_received")?),
        raw_balance: uint(row, "raw_balance")?,
        confidence_bps: u16::try_from(confidence)
            .map_err(|_| invalid_column("confidence_bps", Type::Integer))?,
        created_at: row.get("created_at")?,
        device_sig: sig(row, "device_sig")?,
        witnesses: from_cbor::<Vec<Witness>>(row, "witnesses")?,
    })
}

fn row_to_evidence(row: &Row<'_>) -> rusqlite::Result<ForkEvidence> {
    Ok(ForkEvidence {
        device: key(row, "device")?,
        record_a: record_id(row, "record_a")?,
        record_b: record_id(row, "record_b")?,
        reporter: key(row, "reporter")?,
        reporter_sig: sig(row, "reporter_sig")?,
        detected_at: row.get("detected_at")?,
    })
}

/// The record occupying `index` in `device`'s chain.
fn record_at(conn: &Connection, device: &Ed25519PublicKey, index: u64) -> Result<Option<ShareRecord>> {
    let sql = format!(
        "SELECT {} FROM share_records
         WHERE (sender = ?1 AND sender_record_index = ?2)
            OR (receiver = ?1 AND receiver_record_index = ?2)
         LIMIT 1",
        RECORD_COLUMNS
    );
    // Nothing stored lies beyond the signed range.
    let Ok(index) = i64::try_from(index) else {
        return Ok(None);
    };
    conn.query_row(&sql, params![device.0.as_slice(), index], row_to_record)
        .optional()
        .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_record(&self, record: &ShareRecord) -> Result<InsertResult> {
        check_record_fits(record)?;
        let record = record.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM share_records WHERE id = ?1",
                    params![record.id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Ok(InsertResult::AlreadyExists);
            }

            let h = &record.header;
            for (device, index) in [
                (h.sender, h.sender_record_index),
                (h.receiver, h.receiver_record_index),
            ] {
                if let Some(existing) = record_at(&tx, &device, index)? {
                    return Ok(InsertResult::Conflict {
                        device,
                        index,
                        existing: existing.id,
                    });
                }
            }

            tx.execute(
                "INSERT INTO share_records (
                    id, sender, receiver, prev_sender, prev_receiver,
                    sender_record_index, receiver_record_index, sender_sent, sender_received,
                    receiver_sent, receiver_received, request_hash, file_hash, chunk_hashes,
                    bytes_total, visibility, timestamp, sender_sig, receiver_sig, ingested_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20)",
                params![
                    record.id.0.as_slice(),
                    h.sender.0.as_slice(),
                    h.receiver.0.as_slice(),
                    h.prev_sender.0.as_slice(),
                    h.prev_receiver.0.as_slice(),
                    to_sql_int(h.sender_record_index, "sender record index")?,
                    to_sql_int(h.receiver_record_index, "receiver record index")?,
                    to_sql_int(h.sender_totals.sent, "sender sent")?,
                    to_sql_int(h.sender_totals.received, "sender received")?,
                    to_sql_int(h.receiver_totals.sent, "receiver sent")?,
                    to_sql_int(h.receiver_totals.received, "receiver received")?,
                    h.request_hash.0.as_slice(),
                    h.file_hash.0.as_slice(),
                    hashes_to_blob(&h.chunk_hashes),
                    to_sql_int(h.bytes_total, "bytes total")?,
                    h.visibility.to_u32(),
                    h.timestamp,
                    record.sender_sig.0.as_slice(),
                    record.receiver_sig.0.as_slice(),
                    now_millis(),
                ],
            )?;
            tx.commit()?;

            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<ShareRecord>> {
        let id = *id;
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM share_records WHERE id = ?1", RECORD_COLUMNS);
            conn.query_row(&sql, params![id.0.as_slice()], row_to_record)
                .optional()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn get_record_at(
        &self,
        device: &Ed25519PublicKey,
        index: u64,
    ) -> Result<Option<ShareRecord>> {
        let device = *device;
        self.run(move |conn| record_at(conn, &device, index)).await
    }

    async fn get_records_by_device(
        &self,
        device: &Ed25519PublicKey,
        from_index: u64,
        limit: usize,
    ) -> Result<Vec<ShareRecord>> {
        check_limit(limit)?;
        let Ok(from_index) = i64::try_from(from_index) else {
            return Ok(Vec::new());
        };
        let device = *device;

        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, {} AS own_index FROM share_records
                 WHERE (sender = ?1 AND sender_record_index >= ?2)
                    OR (receiver = ?1 AND receiver_record_index >= ?2)
                 ORDER BY own_index ASC LIMIT ?3",
                RECORD_COLUMNS, OWN_INDEX
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(
                    params![device.0.as_slice(), from_index, limit as i64],
                    row_to_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
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
        let Ok(from) = i64::try_from(from) else {
            return Ok(Vec::new());
        };
        // Inclusive upper bound, clamped to the largest storable index.
        let last = i64::try_from(to - 1).unwrap_or(i64::MAX);
        let device = *device;

        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, {} AS own_index FROM share_records
                 WHERE (sender = ?1 AND sender_record_index >= ?2 AND sender_record_index <= ?3)
                    OR (receiver = ?1 AND receiver_record_index >= ?2 AND receiver_record_index <= ?3)
                 ORDER BY own_index ASC LIMIT ?4",
                RECORD_COLUMNS, OWN_INDEX
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(
                    params![device.0.as_slice(), from, last, limit as i64],
                    row_to_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_latest_record(&self, device: &Ed25519PublicKey) -> Result<Option<ShareRecord>> {
        let device = *device;
        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, {} AS own_index FROM share_records
                 WHERE sender = ?1 OR receiver = ?1
                 ORDER BY own_index DESC LIMIT 1",
                RECORD_COLUMNS, OWN_INDEX
            );
            conn.query_row(&sql, params![device.0.as_slice()], row_to_record)
                .optional()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn counterparty_diversity(
        &self,
        device: &Ed25519PublicKey,
        window: usize,
    ) -> Result<BTreeMap<Ed25519PublicKey, u32>> {
        let device = *device;
        self.run(move |conn| {
            let sql = format!(
                "SELECT sender, receiver, {} AS own_index FROM share_records
                 WHERE sender = ?1 OR receiver = ?1
                 ORDER BY timestamp DESC, own_index DESC LIMIT ?2",
                OWN_INDEX
            );
            let mut stmt = conn.prepare(&sql)?;
            let pairs = stmt
                .query_map(params![device.0.as_slice(), window as i64], |row| {
                    Ok((key(row, "sender")?, key(row, "receiver")?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut counts = BTreeMap::new();
            for (sender, receiver) in pairs {
                let peer = if sender == device { receiver } else { sender };
                *counts.entry(peer).or_insert(0u32) += 1;
            }
            Ok(counts)
        })
        .await
    }

    async fn upsert_peer(&self, peer: &PeerInfo) -> Result<()> {
        let peer = peer.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO peers (
                    pubkey, chain_head, chain_index, total_sent, total_received,
                    last_seen, has_fork_evidence, transport_type
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    peer.pubkey.0.as_slice(),
                    peer.chain_head.0.as_slice(),
                    peer.chain_index as i64,
                    peer.totals.sent as i64,
                    peer.totals.received as i64,
                    peer.last_seen,
                    peer.has_fork_evidence as i64,
                    peer.transport_type,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_peer(&self, pubkey: &Ed25519PublicKey) -> Result<Option<PeerInfo>> {
        let pubkey = *pubkey;
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM peers WHERE pubkey = ?1",
                params![pubkey.0.as_slice()],
                row_to_peer,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_peers(&self, limit: usize) -> Result<Vec<PeerInfo>> {
        check_limit(limit)?;
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM peers ORDER BY last_seen DESC, pubkey ASC LIMIT ?1")?;
            let peers = stmt
                .query_map(params![limit as i64], row_to_peer)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(peers)
        })
        .await
    }

    async fn evict_peers(&self, keep: usize) -> Result<usize> {
        check_limit(keep)?;
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM peers WHERE pubkey NOT IN (
                    SELECT pubkey FROM peers ORDER BY last_seen DESC, pubkey ASC LIMIT ?1
                )",
                params![keep as i64],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn insert_file(&self, file: &FileMeta) -> Result<bool> {
        let file = file.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO files (
                    file_hash, file_name, file_size, chunk_size, chunk_hashes,
                    origin, origin_sig, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    file.file_hash.0.as_slice(),
                    file.file_name,
                    file.file_size as i64,
                    file.chunk_size as i64,
                    hashes_to_blob(&file.chunk_hashes),
                    file.origin.0.as_slice(),
                    file.origin_sig.0.as_slice(),
                    file.created_at,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn get_file(&self, file_hash: &Blake3Hash) -> Result<Option<FileMeta>> {
        let file_hash = *file_hash;
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM files WHERE file_hash = ?1",
                params![file_hash.0.as_slice()],
                row_to_file,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_files(&self, limit: usize, offset: usize) -> Result<Vec<FileMeta>> {
        check_limit(limit)?;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM files ORDER BY created_at DESC, file_hash ASC LIMIT ?1 OFFSET ?2",
            )?;
            let files = stmt
                .query_map(params![limit as i64, offset as i64], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
        .await
    }

    async fn search_files(&self, fragment: &str, limit: usize) -> Result<Vec<FileMeta>> {
        check_limit(limit)?;
        let pattern = format!(
            "%{}%",
            fragment
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM files WHERE file_name LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, file_hash ASC LIMIT ?2",
            )?;
            let files = stmt
                .query_map(params![pattern, limit as i64], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
        .await
    }

    async fn insert_request(&self, request: &TransferRequest) -> Result<bool> {
        let request_hash = request
            .request_hash()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let chunk_indices = to_cbor(&request.chunk_indices)?;
        let request = request.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO transfer_requests (
                    request_hash, requester, file_hash, chunk_indices, nonce,
                    timestamp, signature, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    request_hash.0.as_slice(),
                    request.requester.0.as_slice(),
                    request.file_hash.0.as_slice(),
                    chunk_indices,
                    request.nonce.as_slice(),
                    request.timestamp,
                    request.signature.0.as_slice(),
                    RequestStatus::Pending.as_str(),
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn get_request(&self, request_hash: &Blake3Hash) -> Result<Option<StoredRequest>> {
        let request_hash = *request_hash;
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM transfer_requests WHERE request_hash = ?1",
                params![request_hash.0.as_slice()],
                row_to_request,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_request_status(
        &self,
        request_hash: &Blake3Hash,
        status: RequestStatus,
    ) -> Result<()> {
        let request_hash = *request_hash;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM transfer_requests WHERE request_hash = ?1",
                    params![request_hash.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            let current = current
                .ok_or_else(|| StoreError::NotFound(format!("request {}", request_hash.to_hex())))?;
            let current = RequestStatus::parse(&current)
                .ok_or_else(|| StoreError::InvalidData(format!("request status {:?}", current)))?;
            check_transition(current, status)?;

            tx.execute(
                "UPDATE transfer_requests SET status = ?2 WHERE request_hash = ?1",
                params![request_hash.0.as_slice(), status.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_requests(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<StoredRequest>> {
        check_limit(limit)?;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM transfer_requests WHERE status = ?1
                 ORDER BY timestamp ASC, request_hash ASC LIMIT ?2",
            )?;
            let requests = stmt
                .query_map(params![status.as_str(), limit as i64], row_to_request)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
        .await
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let witnesses = to_cbor(&checkpoint.witnesses)?;
        let cp = checkpoint.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (
                    device, chain_head, chain_index, total_sent, total_received,
                    raw_balance, confidence_bps, created_at, device_sig, witnesses
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    cp.device.0.as_slice(),
                    cp.chain_head.0.as_slice(),
                    cp.chain_index as i64,
                    cp.totals.sent as i64,
                    cp.totals.received as i64,
                    cp.raw_balance as i64,
                    cp.confidence_bps as i64,
                    cp.created_at,
                    cp.device_sig.0.as_slice(),
                    witnesses,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_checkpoint(&self, device: &Ed25519PublicKey) -> Result<Option<Checkpoint>> {
        let device = *device;
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM checkpoints WHERE device = ?1
                 ORDER BY chain_index DESC, created_at DESC LIMIT 1",
                params![device.0.as_slice()],
                row_to_checkpoint,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_checkpoints(&self, device: &Ed25519PublicKey) -> Result<Vec<Checkpoint>> {
        let device = *device;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM checkpoints WHERE device = ?1
                 ORDER BY chain_index ASC, created_at ASC",
            )?;
            let checkpoints = stmt
                .query_map(params![device.0.as_slice()], row_to_checkpoint)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(checkpoints)
        })
        .await
    }

    async fn append_fork_evidence(&self, evidence: &ForkEvidence) -> Result<bool> {
        let evidence = evidence.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO fork_evidence (
                    device, record_a, record_b, reporter, reporter_sig, detected_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    evidence.device.0.as_slice(),
                    evidence.record_a.0.as_slice(),
                    evidence.record_b.0.as_slice(),
                    evidence.reporter.0.as_slice(),
                    evidence.reporter_sig.0.as_slice(),
                    evidence.detected_at,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn list_fork_evidence(&self, device: &Ed25519PublicKey) -> Result<Vec<ForkEvidence>> {
        let device = *device;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM fork_evidence WHERE device = ?1 ORDER BY detected_at ASC",
            )?;
            let evidence = stmt
                .query_map(params![device.0.as_slice()], row_to_evidence)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(evidence)
        })
        .await
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
