//! Share records: the ledger entry for one completed transfer.
//!
//! A record sits in two personal chains at once, the sender's and the
//! receiver's. Each device numbers its own records 1, 2, 3, ... across every
//! counterparty, and each record names the id of the device's previous record
//! (`RecordId::ZERO` before the first one).

use serde::{Deserialize, Serialize};

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature};
use crate::error::CoreError;
use crate::linker::PendingShareRecord;
use crate::signable::share_record_signable_bytes;
use crate::types::{CumulativeTotals, RecordId, Visibility};

/// Which side of a record a device is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Receiver,
}

/// Every signed field of a share record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecordHeader {
    pub sender: Ed25519PublicKey,
    pub receiver: Ed25519PublicKey,
    /// Id of the sender's previous record.
    pub prev_sender: RecordId,
    /// Id of the receiver's previous record.
    pub prev_receiver: RecordId,
    /// Position in the sender's chain (1-indexed).
    pub sender_record_index: u64,
    /// Position in the receiver's chain (1-indexed).
    pub receiver_record_index: u64,
    /// Sender totals just before this record.
    #[serde(default)]
    pub sender_totals: CumulativeTotals,
    /// Receiver totals just before this record.
    #[serde(default)]
    pub receiver_totals: CumulativeTotals,
    pub request_hash: Blake3Hash,
    pub file_hash: Blake3Hash,
    pub chunk_hashes: Vec<Blake3Hash>,
    pub bytes_total: u64,
    #[serde(default)]
    pub visibility: Visibility,
    /// Sender-proposed time of the transfer (Unix milliseconds).
    pub timestamp: i64,
}

impl ShareRecordHeader {
    /// The bytes both parties sign.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(share_record_signable_bytes(self)?)
    }

    /// Hash of the signable bytes; the record id once finalized.
    pub fn compute_id(&self) -> Result<RecordId, CoreError> {
        Ok(RecordId(Blake3Hash::hash(&self.signable_bytes()?).0))
    }

    /// The role `device` plays, if any. A self-transfer reports `Sender`.
    pub fn role_of(&self, device: &Ed25519PublicKey) -> Option<Role> {
        if *device == self.sender {
            Some(Role::Sender)
        } else if *device == self.receiver {
            Some(Role::Receiver)
        } else {
            None
        }
    }

    pub fn involves(&self, device: &Ed25519PublicKey) -> bool {
        self.role_of(device).is_some()
    }

    /// The device's own chain index in this record.
    pub fn index_for(&self, device: &Ed25519PublicKey) -> Option<u64> {
        self.role_of(device).map(|role| match role {
            Role::Sender => self.sender_record_index,
            Role::Receiver => self.receiver_record_index,
        })
    }

    /// The device's claimed predecessor.
    pub fn prev_for(&self, device: &Ed25519PublicKey) -> Option<RecordId> {
        self.role_of(device).map(|role| match role {
            Role::Sender => self.prev_sender,
            Role::Receiver => self.prev_receiver,
        })
    }

    /// The device's totals just before this record.
    pub fn totals_for(&self, device: &Ed25519PublicKey) -> Option<CumulativeTotals> {
        self.role_of(device).map(|role| match role {
            Role::Sender => self.sender_totals,
            Role::Receiver => self.receiver_totals,
        })
    }

    /// The device's totals just after this record.
    pub fn totals_after(&self, device: &Ed25519PublicKey) -> Option<CumulativeTotals> {
        self.role_of(device).map(|role| match role {
            Role::Sender => self.sender_totals.after_sending(self.bytes_total),
            Role::Receiver => self.receiver_totals.after_receiving(self.bytes_total),
        })
    }

    /// The other party.
    pub fn counterparty_of(&self, device: &Ed25519PublicKey) -> Option<Ed25519PublicKey> {
        self.role_of(device).map(|role| match role {
            Role::Sender => self.receiver,
            Role::Receiver => self.sender,
        })
    }
}

/// A finalized, dual-signed share record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub header: ShareRecordHeader,
    pub sender_sig: Ed25519Signature,
    pub receiver_sig: Ed25519Signature,
    /// Blake3 of the signable bytes.
    pub id: RecordId,
}

impl ShareRecord {
    pub fn sender(&self) -> &Ed25519PublicKey {
        &self.header.sender
    }

    pub fn receiver(&self) -> &Ed25519PublicKey {
        &self.header.receiver
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn bytes_total(&self) -> u64 {
        self.header.bytes_total
    }

    pub fn index_for(&self, device: &Ed25519PublicKey) -> Option<u64> {
        self.header.index_for(device)
    }

    pub fn prev_for(&self, device: &Ed25519PublicKey) -> Option<RecordId> {
        self.header.prev_for(device)
    }

    pub fn counterparty_of(&self, device: &Ed25519PublicKey) -> Option<Ed25519PublicKey> {
        self.header.counterparty_of(device)
    }

    pub fn involves(&self, device: &Ed25519PublicKey) -> bool {
        self.header.involves(device)
    }

    /// Recompute the id from the signable fields, ignoring the stored one.
    pub fn compute_id(&self) -> Result<RecordId, CoreError> {
        self.header.compute_id()
    }
}

/// A device's chain head as seen at some moment.
///
/// Exchanged before a transfer so the sender can propose the receiver's next
/// index, predecessor and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPosition {
    pub device: Ed25519PublicKey,
    /// Id of the latest record, `ZERO` for an empty chain.
    pub head: RecordId,
    /// Index of the latest record, 0 for an empty chain.
    pub index: u64,
    #[serde(default)]
    pub totals: CumulativeTotals,
}

impl ChainPosition {
    /// Position of a device with no records.
    pub fn genesis(device: Ed25519PublicKey) -> Self {
        Self {
            device,
            head: RecordId::ZERO,
            index: 0,
            totals: CumulativeTotals::default(),
        }
    }

    /// Position right after `record`, or `None` if the device is not a party.
    pub fn after(device: Ed25519PublicKey, record: &ShareRecord) -> Option<Self> {
        Some(Self {
            device,
            head: record.id,
            index: record.header.index_for(&device)?,
            totals: record.header.totals_after(&device)?,
        })
    }

    /// The index the next record must carry.
    pub fn next_index(&self) -> u64 {
        self.index + 1
    }
}

/// Builder for a new record between two chain positions.
#[derive(Debug, Clone)]
pub struct ShareRecordBuilder {
    sender: ChainPosition,
    receiver: ChainPosition,
    request_hash: Blake3Hash,
    file_hash: Blake3Hash,
    chunk_hashes: Vec<Blake3Hash>,
    bytes_total: u64,
    visibility: Visibility,
    timestamp: i64,
}

impl ShareRecordBuilder {
    pub fn new(sender: ChainPosition, receiver: ChainPosition) -> Self {
        Self {
            sender,
            receiver,
            request_hash: Blake3Hash::ZERO,
            file_hash: Blake3Hash::ZERO,
            chunk_hashes: Vec::new(),
            bytes_total: 0,
            visibility: Visibility::Public,
            timestamp: 0,
        }
    }

    pub fn request_hash(mut self, request_hash: Blake3Hash) -> Self {
        self.request_hash = request_hash;
        self
    }

    pub fn file_hash(mut self, file_hash: Blake3Hash) -> Self {
        self.file_hash = file_hash;
        self
    }

    pub fn chunk_hashes(mut self, chunk_hashes: Vec<Blake3Hash>) -> Self {
        self.chunk_hashes = chunk_hashes;
        self
    }

    pub fn bytes_total(mut self, bytes_total: u64) -> Self {
        self.bytes_total = bytes_total;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the unsigned header.
    pub fn build_header(self) -> ShareRecordHeader {
        ShareRecordHeader {
            sender: self.sender.device,
            receiver: self.receiver.device,
            prev_sender: self.sender.head,
            prev_receiver: self.receiver.head,
            sender_record_index: self.sender.next_index(),
            receiver_record_index: self.receiver.next_index(),
            sender_totals: self.sender.totals,
            receiver_totals: self.receiver.totals,
            request_hash: self.request_hash,
            file_hash: self.file_hash,
            chunk_hashes: self.chunk_hashes,
            bytes_total: self.bytes_total,
            visibility: self.visibility,
            timestamp: self.timestamp,
        }
    }

    /// Build a pending record with no signatures yet.
    pub fn build(self) -> PendingShareRecord {
        PendingShareRecord::new(self.build_header())
    }
}
