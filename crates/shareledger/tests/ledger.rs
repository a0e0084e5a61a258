//! End-to-end ledger behavior over SQLite storage.

use std::sync::Arc;

use anyhow::Result;

use shareledger::core::{
    verify_fork_evidence, ChainPosition, Keypair, RecordId, ShareRecord, ShareRecordBuilder,
    ValidationError, Visibility,
};
use shareledger::credit::{MB, MILLIS_PER_DAY};
use shareledger::store::{SqliteStore, Store, StoreExt};
use shareledger::wire::{read_frame, write_frame, Envelope, MAX_MESSAGE_SIZE};
use shareledger::{Blake3Hash, IngestOutcome, Ledger, LedgerConfig, LedgerError, TransferTerms};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn ledger(seed: u8) -> Result<Ledger<SqliteStore>> {
    Ok(Ledger::new(
        keypair(seed),
        SqliteStore::open_memory()?,
        LedgerConfig::default(),
    )?)
}

fn terms(bytes: u64) -> TransferTerms {
    TransferTerms {
        request_hash: Blake3Hash::hash(b"request"),
        file_hash: Blake3Hash::hash(b"file"),
        chunk_hashes: vec![Blake3Hash::hash(b"chunk")],
        bytes_total: bytes,
        visibility: Visibility::Public,
    }
}

/// A record signed directly with both keys, bypassing the ledger.
fn signed(
    sender: &Keypair,
    sender_pos: ChainPosition,
    receiver: &Keypair,
    receiver_pos: ChainPosition,
    bytes: u64,
    timestamp: i64,
) -> ShareRecord {
    ShareRecordBuilder::new(sender_pos, receiver_pos)
        .file_hash(Blake3Hash::hash(b"file"))
        .bytes_total(bytes)
        .timestamp(timestamp)
        .build()
        .sign_as_sender(sender)
        .unwrap()
        .countersign(receiver)
        .unwrap()
}

fn genesis(keypair: &Keypair) -> ChainPosition {
    ChainPosition::genesis(keypair.public_key())
}

#[tokio::test]
async fn test_transfer_survives_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bob.db");
    let alice = ledger(1)?;

    // 1. Transfer with Bob on an on-disk store
    let record_id = {
        let bob = Ledger::new(keypair(2), SqliteStore::open(&path)?, LedgerConfig::default())?;
        let pending = alice
            .propose_transfer(&bob.chain_position().await?, terms(1024))
            .await?;
        let record = bob.countersign(pending).await?;
        assert_eq!(
            alice.ingest_record(&record).await?,
            IngestOutcome::Accepted(record.id)
        );
        record.id
    };

    // 2. Reopen and check Bob's chain and peer cache
    let bob = Ledger::new(keypair(2), SqliteStore::open(&path)?, LedgerConfig::default())?;
    let position = bob.chain_position().await?;
    assert_eq!(position.index, 1);
    assert_eq!(position.head, record_id);
    assert_eq!(position.totals.received, 1024);

    let peers = bob.peers(10).await?;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].pubkey, alice.public_key());
    assert_eq!(peers[0].chain_index, 1);
    Ok(())
}

#[tokio::test]
async fn test_tampered_receiver_signature_not_stored() -> Result<()> {
    let alice = keypair(1);
    let bob = keypair(2);
    let carol = ledger(3)?;

    let mut record = signed(&alice, genesis(&alice), &bob, genesis(&bob), 100, 1);
    record.receiver_sig.0[0] ^= 0x01;

    assert!(matches!(
        carol.ingest_record(&record).await,
        Err(LedgerError::Validation(ValidationError::InvalidReceiverSignature))
    ));
    assert!(carol.store().get_record(&record.id).await?.is_none());
    assert!(carol.peers(10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_same_index_conflict_yields_evidence() -> Result<()> {
    init_tracing();
    let alice = keypair(1);
    let bob = keypair(2);
    let carol = keypair(3);
    let dave = ledger(4)?;

    // Alice signs two different records at her index 1
    let r1 = signed(&alice, genesis(&alice), &bob, genesis(&bob), 100, 1);
    let r1b = signed(&alice, genesis(&alice), &carol, genesis(&carol), 200, 2);

    assert_eq!(dave.ingest_record(&r1).await?, IngestOutcome::Accepted(r1.id));
    let IngestOutcome::Forked(evidence) = dave.ingest_record(&r1b).await? else {
        panic!("expected fork evidence");
    };

    assert_eq!(evidence.device, alice.public_key());
    assert_eq!(evidence.reporter, dave.public_key());
    assert!(evidence.names(&r1.id) && evidence.names(&r1b.id));
    verify_fork_evidence(&evidence, &r1, &r1b)?;

    // The conflicting record is not stored; Alice is flagged
    assert!(dave.store().get_record(&r1b.id).await?.is_none());
    assert!(dave.store().is_forked(&alice.public_key()).await?);
    let peer = dave.store().get_peer(&alice.public_key()).await?.unwrap();
    assert!(peer.has_fork_evidence);

    // Forked devices have no credit and get no new proposals
    let report = dave
        .balance(&alice.public_key(), 0, 30 * MILLIS_PER_DAY)
        .await?;
    assert_eq!(report.balance, 0);
    assert!(report.contributions.is_empty());
    assert!(matches!(
        dave.propose_transfer(&peer.position(), terms(1)).await,
        Err(LedgerError::PeerForked(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_continuity_break_yields_evidence_both_orders() -> Result<()> {
    let alice = keypair(1);
    let bob = keypair(2);
    let carol = keypair(3);

    let r1 = signed(&alice, genesis(&alice), &bob, genesis(&bob), 100, 1);
    // Index 2 claiming a predecessor that is not r1
    let forged = ChainPosition {
        head: RecordId([9; 32]),
        ..ChainPosition::after(alice.public_key(), &r1).unwrap()
    };
    let r2 = signed(&alice, forged, &carol, genesis(&carol), 100, 2);

    // 1. Predecessor held, successor arrives
    let dave = ledger(4)?;
    dave.ingest_record(&r1).await?;
    let IngestOutcome::Forked(evidence) = dave.ingest_record(&r2).await? else {
        panic!("expected fork evidence");
    };
    assert!(evidence.names(&r1.id) && evidence.names(&RecordId([9; 32])));
    assert!(dave.store().get_record(&r2.id).await?.is_some());
    assert!(dave.store().is_forked(&alice.public_key()).await?);

    // 2. Successor held, predecessor arrives
    let erin = ledger(5)?;
    assert_eq!(erin.ingest_record(&r2).await?, IngestOutcome::Accepted(r2.id));
    assert!(matches!(
        erin.ingest_record(&r1).await?,
        IngestOutcome::Forked(_)
    ));
    assert_eq!(erin.store().list_fork_evidence(&alice.public_key()).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_countersign_refuses_proposal_that_breaks_continuity() -> Result<()> {
    let alice = keypair(1);
    let carol = keypair(3);
    let bob = ledger(2)?;

    // Bob holds Alice's first record, with Carol
    let r1 = signed(&alice, genesis(&alice), &carol, genesis(&carol), 100, 1);
    bob.ingest_record(&r1).await?;

    // Alice proposes her index 2 after a record that is not r1
    let forged = ChainPosition {
        head: RecordId([7; 32]),
        ..ChainPosition::after(alice.public_key(), &r1).unwrap()
    };
    let pending = ShareRecordBuilder::new(forged, bob.chain_position().await?)
        .file_hash(Blake3Hash::hash(b"file"))
        .bytes_total(100)
        .timestamp(2)
        .build()
        .sign_as_sender(&alice)?;
    let expected = pending.expected_id()?;

    assert!(matches!(
        bob.countersign(pending).await,
        Err(LedgerError::PeerForked(device)) if device == alice.public_key()
    ));
    assert!(bob.store().is_forked(&alice.public_key()).await?);
    assert!(bob.store().get_record(&expected).await?.is_none());
    assert_eq!(bob.chain_position().await?.index, 0);

    let evidence = bob.store().list_fork_evidence(&alice.public_key()).await?;
    assert_eq!(evidence.len(), 1);
    assert!(evidence[0].names(&r1.id) && evidence[0].names(&RecordId([7; 32])));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_countersign_assigns_one_index() -> Result<()> {
    let bob = Arc::new(ledger(2)?);
    let alice = ledger(1)?;
    let carol = ledger(3)?;

    // Both proposals target Bob's empty chain
    let position = bob.chain_position().await?;
    let from_alice = alice.propose_transfer(&position, terms(100)).await?;
    let from_carol = carol.propose_transfer(&position, terms(200)).await?;

    let handles: Vec<_> = [from_alice, from_carol]
        .into_iter()
        .map(|pending| {
            let bob = Arc::clone(&bob);
            tokio::spawn(async move { bob.countersign(pending).await })
        })
        .collect();

    let mut accepted = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(record) => accepted.push(record),
            Err(e) => assert!(matches!(e, LedgerError::StaleProposal(_)), "{e}"),
        }
    }
    assert_eq!(accepted.len(), 1);

    let me = bob.public_key();
    let chain = bob.store().get_records_by_device(&me, 1, 10).await?;
    assert_eq!(chain, accepted);
    assert_eq!(chain[0].index_for(&me), Some(1));
    assert_eq!(bob.chain_position().await?.index, 1);
    Ok(())
}

#[tokio::test]
async fn test_fork_evidence_gossip() -> Result<()> {
    let alice = keypair(1);
    let bob = keypair(2);
    let carol = keypair(3);
    let dave = ledger(4)?;
    let erin = ledger(5)?;

    let r1 = signed(&alice, genesis(&alice), &bob, genesis(&bob), 100, 1);
    let r1b = signed(&alice, genesis(&alice), &carol, genesis(&carol), 100, 2);
    dave.ingest_record(&r1).await?;
    let IngestOutcome::Forked(evidence) = dave.ingest_record(&r1b).await? else {
        panic!("expected fork evidence");
    };

    // Erin holds r1 only, so the evidence is accepted on its signature
    erin.ingest_record(&r1).await?;
    assert!(erin.ingest_fork_evidence(&evidence).await?);
    assert!(!erin.ingest_fork_evidence(&evidence).await?);
    assert_eq!(
        erin.balance(&alice.public_key(), 0, 30 * MILLIS_PER_DAY)
            .await?
            .balance,
        0
    );

    let mut tampered = evidence.clone();
    tampered.reporter_sig.0[5] ^= 0xff;
    assert!(matches!(
        ledger(6)?.ingest_fork_evidence(&tampered).await,
        Err(LedgerError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_25_day_balance() -> Result<()> {
    let alice = keypair(1);
    let bob = keypair(2);
    let observer = ledger(3)?;

    let raw = 10 * MB as u64;
    let record = signed(&alice, genesis(&alice), &bob, genesis(&bob), raw, 0);
    observer.ingest_record(&record).await?;

    let report = observer
        .balance(&alice.public_key(), 0, 25 * MILLIS_PER_DAY)
        .await?;

    let decayed = (raw as f64 * 0.5f64.powf(25.0 / 90.0)).floor() as u64;
    assert_eq!(report.capped_total, decayed);
    assert_eq!(report.drip_allowance, 50 * MB as u64);
    assert_eq!(report.distinct_counterparties, 1);
    assert_eq!(report.balance, (decayed as f64 * 0.2).floor() as u64);

    // Bob only received, so he earns nothing beyond zero
    let report = observer
        .balance(&bob.public_key(), 0, 25 * MILLIS_PER_DAY)
        .await?;
    assert_eq!(report.balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_peer_cache_is_bounded() -> Result<()> {
    let config = LedgerConfig {
        peer_cache_limit: 2,
        ..LedgerConfig::default()
    };
    let observer = Ledger::new(keypair(9), SqliteStore::open_memory()?, config)?;

    for seed in [1u8, 3, 5] {
        let sender = keypair(seed);
        let receiver = keypair(seed + 1);
        let record = signed(
            &sender,
            genesis(&sender),
            &receiver,
            genesis(&receiver),
            10,
            i64::from(seed),
        );
        observer.ingest_record(&record).await?;
    }

    assert_eq!(observer.peers(10).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_transfer_over_framed_stream() -> Result<()> {
    let alice = ledger(1)?;
    let bob = ledger(2)?;
    let (mut alice_io, mut bob_io) = tokio::io::duplex(64 * 1024);

    // 1. Alice proposes and sends the proposal
    let pending = alice
        .propose_transfer(&bob.chain_position().await?, terms(2048))
        .await?;
    write_frame(&mut alice_io, &Envelope::ProposedRecord(pending), MAX_MESSAGE_SIZE).await?;

    // 2. Bob handles it and replies with the countersigned record
    let incoming = read_frame(&mut bob_io, MAX_MESSAGE_SIZE).await?;
    let reply = bob.handle_envelope(incoming).await?.expect("reply");
    write_frame(&mut bob_io, &reply, MAX_MESSAGE_SIZE).await?;

    // 3. Alice ingests the reply
    let incoming = read_frame(&mut alice_io, MAX_MESSAGE_SIZE).await?;
    assert_eq!(alice.handle_envelope(incoming).await?, None);

    let a = alice.chain_position().await?;
    let b = bob.chain_position().await?;
    assert_eq!(a.head, b.head);
    assert_eq!(a.totals.sent, 2048);
    assert_eq!(b.totals.received, 2048);
    Ok(())
}
