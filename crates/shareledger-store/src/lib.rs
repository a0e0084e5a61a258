//! # Share Ledger Store
//!
//! Persistence for the share ledger behind the async [`Store`] trait, with
//! SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting a share record
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shareledger_store::{SqliteStore, Store, StoreExt};
//! use shareledger_core::Keypair;
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let device = Keypair::generate().public_key();
//!     let position = store.chain_position(&device).await.unwrap();
//!     assert_eq!(position.index, 0);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: inserting the same record twice returns `AlreadyExists`
//! - **Conflict detection**: a different record at an occupied chain position
//!   returns `Conflict`; the caller turns that into fork evidence
//! - **One table, two chains**: every record is indexed under both parties

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store, StoreExt, StoredRequest};
