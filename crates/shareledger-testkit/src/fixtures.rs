//! Test fixtures for common scenarios.

use rand::RngCore;

use shareledger::{IngestOutcome, Ledger, LedgerConfig, TransferTerms};
use shareledger_core::{
    Blake3Hash, ChainPosition, Ed25519PublicKey, Keypair, ShareRecord, ShareRecordBuilder,
    Visibility,
};
use shareledger_store::MemoryStore;

/// A device with its own ledger over an in-memory store.
pub struct TestDevice {
    pub keypair: Keypair,
    pub ledger: Ledger<MemoryStore>,
}

impl TestDevice {
    /// Create a device from a one-byte seed with default config.
    pub fn new(seed: u8) -> Self {
        Self::with_config(seed, LedgerConfig::default())
    }

    /// Create a device with a custom config.
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn with_config(seed: u8, config: LedgerConfig) -> Self {
        let keypair = Keypair::from_seed(&[seed; 32]);
        let ledger = Ledger::new(keypair.clone(), MemoryStore::new(), config)
            .expect("fixture config must be valid")
            .with_created_at(0);
        Self { keypair, ledger }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Current own chain position.
    pub async fn position(&self) -> ChainPosition {
        self.ledger
            .chain_position()
            .await
            .expect("memory store does not fail")
    }
}

/// Create `count` devices with seeds 1..=count.
pub fn multi_device_fixtures(count: usize) -> Vec<TestDevice> {
    (1..=count).map(|i| TestDevice::new(i as u8)).collect()
}

/// Terms for a transfer of `bytes` with fixed hashes.
pub fn sample_terms(bytes: u64) -> TransferTerms {
    TransferTerms {
        request_hash: Blake3Hash::hash(b"testkit request"),
        file_hash: Blake3Hash::hash(b"testkit file"),
        chunk_hashes: vec![Blake3Hash::hash(b"testkit chunk")],
        bytes_total: bytes,
        visibility: Visibility::Public,
    }
}

/// Propose, countersign and deliver the record back to the sender.
///
/// # Panics
///
/// If any phase fails.
pub async fn complete_transfer(sender: &TestDevice, receiver: &TestDevice, bytes: u64) -> ShareRecord {
    let position = receiver.position().await;
    let pending = sender
        .ledger
        .propose_transfer(&position, sample_terms(bytes))
        .await
        .expect("proposal");
    let record = receiver.ledger.countersign(pending).await.expect("countersign");
    let outcome = sender.ledger.ingest_record(&record).await.expect("ingest");
    assert_eq!(outcome, IngestOutcome::Accepted(record.id));
    record
}

/// Sign a record directly with both keys, at explicit positions and time.
pub fn signed_record(
    sender: &Keypair,
    sender_pos: ChainPosition,
    receiver: &Keypair,
    receiver_pos: ChainPosition,
    bytes: u64,
    timestamp: i64,
) -> ShareRecord {
    ShareRecordBuilder::new(sender_pos, receiver_pos)
        .file_hash(Blake3Hash::hash(b"testkit file"))
        .bytes_total(bytes)
        .timestamp(timestamp)
        .build()
        .sign_as_sender(sender)
        .expect("sender signs")
        .countersign(receiver)
        .expect("receiver countersigns")
}

/// A contiguous chain of transfers from `sender`, cycling through `receivers`.
///
/// Record `i` has timestamp `start + i * spacing_ms` and every receiver's own
/// chain is linked too.
pub fn fan_out_chain(
    sender: &Keypair,
    receivers: &[Keypair],
    count: usize,
    bytes: u64,
    start: i64,
    spacing_ms: i64,
) -> Vec<ShareRecord> {
    let mut sender_pos = ChainPosition::genesis(sender.public_key());
    let mut receiver_pos: Vec<ChainPosition> = receivers
        .iter()
        .map(|r| ChainPosition::genesis(r.public_key()))
        .collect();

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let slot = i % receivers.len();
        let record = signed_record(
            sender,
            sender_pos,
            &receivers[slot],
            receiver_pos[slot],
            bytes,
            start + i as i64 * spacing_ms,
        );
        sender_pos = ChainPosition::after(sender.public_key(), &record).expect("sender is a party");
        receiver_pos[slot] =
            ChainPosition::after(receivers[slot].public_key(), &record).expect("receiver is a party");
        records.push(record);
    }
    records
}

/// Random file content.
pub fn random_content(len: usize) -> Vec<u8> {
    let mut content = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut content);
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use shareledger_core::verify_chain;

    #[tokio::test]
    async fn test_complete_transfer() {
        let devices = multi_device_fixtures(2);
        let record = complete_transfer(&devices[0], &devices[1], 512).await;

        assert_eq!(devices[0].position().await.head, record.id);
        assert_eq!(devices[1].position().await.totals.received, 512);
    }

    #[tokio::test]
    async fn test_sequential_transfers_link() {
        let devices = multi_device_fixtures(3);
        let first = complete_transfer(&devices[0], &devices[1], 10).await;
        let second = complete_transfer(&devices[0], &devices[2], 20).await;

        let sender = devices[0].public_key();
        assert_eq!(second.prev_for(&sender), Some(first.id));
        assert_eq!(second.index_for(&sender), Some(2));
    }

    #[test]
    fn test_fan_out_chain_verifies() {
        let sender = Keypair::from_seed(&[1; 32]);
        let receivers: Vec<_> = (2..5u8).map(|s| Keypair::from_seed(&[s; 32])).collect();
        let records = fan_out_chain(&sender, &receivers, 7, 100, 0, 1000);

        let head = verify_chain(&sender.public_key(), &records).unwrap();
        assert_eq!(head.index, 7);
        assert_eq!(head.totals.sent, 700);

        let first_receiver: Vec<_> = records
            .iter()
            .filter(|r| r.involves(&receivers[0].public_key()))
            .cloned()
            .collect();
        assert_eq!(
            verify_chain(&receivers[0].public_key(), &first_receiver).unwrap().index,
            3
        );
    }

    #[test]
    fn test_random_content_length() {
        assert_eq!(random_content(100).len(), 100);
    }
}
