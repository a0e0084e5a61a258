//! # Share Ledger
//!
//! A device's view of a peer-to-peer bandwidth-sharing network.
//!
//! ## Overview
//!
//! Devices serve file chunks to each other. Every completed transfer becomes a
//! [`ShareRecord`] signed by both parties and linked into each party's
//! personal hash chain. Credit is derived from those chains:
//!
//! - **Records**: Immutable, dual-signed, content-addressed by their signable bytes
//! - **Chains**: One per device, indices starting at 1, each record naming its predecessor
//! - **Forks**: Two records at one index of a chain; detection yields signed evidence
//! - **Credit**: Decayed, per-peer capped, diversity-scaled bytes served, plus a drip
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shareledger::{Ledger, LedgerConfig, TransferTerms};
//! use shareledger::core::Keypair;
//! use shareledger::store::SqliteStore;
//!
//! async fn example(receiver: shareledger::core::ChainPosition, terms: TransferTerms) {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let ledger = Ledger::new(Keypair::generate(), store, LedgerConfig::default()).unwrap();
//!
//!     // Phase one: sign a proposal for the receiver's current position
//!     let pending = ledger.propose_transfer(&receiver, terms).await.unwrap();
//!
//!     // ...send it, receive the countersigned record back, then:
//!     // ledger.ingest_record(&record).await.unwrap();
//! #   let _ = pending;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `shareledger::core` - Records, chains, validation, fork detection
//! - `shareledger::credit` - Credit engine
//! - `shareledger::store` - Storage abstraction, SQLite and in-memory
//! - `shareledger::wire` - Envelopes and framing

pub mod config;
pub mod error;
pub mod ledger;

// Re-export component crates
pub use shareledger_core as core;
pub use shareledger_credit as credit;
pub use shareledger_store as store;
pub use shareledger_wire as wire;

// Re-export main types for convenience
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{IngestOutcome, Ledger, TransferTerms};

// Re-export commonly used types
pub use shareledger_core::{
    Blake3Hash, ChainPosition, Checkpoint, Ed25519PublicKey, FileMeta, ForkEvidence, Keypair,
    PendingShareRecord, RecordId, ShareRecord, TransferRequest,
};
pub use shareledger_credit::{CreditParams, CreditReport};
