//! # Share Ledger Testkit
//!
//! Testing utilities for the share ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed inputs with expected signable bytes, hashes and signatures
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Devices with in-memory ledgers and helpers for completed transfers
//!
//! ## Golden Vectors
//!
//! Any implementation of the signable encoding must reproduce these bytes:
//!
//! ```rust
//! use shareledger_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{}: {}", name, detail);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use shareledger_testkit::generators::{record_from_params, TransferParams};
//!
//! proptest! {
//!     #[test]
//!     fn record_id_is_deterministic(params: TransferParams) {
//!         prop_assert_eq!(record_from_params(&params).id, record_from_params(&params).id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use shareledger_testkit::fixtures::{complete_transfer, TestDevice};
//!
//! let alice = TestDevice::new(1);
//! let bob = TestDevice::new(2);
//! let record = complete_transfer(&alice, &bob, 4096).await;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{complete_transfer, fan_out_chain, multi_device_fixtures, signed_record, TestDevice};
pub use generators::{record_from_params, TransferParams};
pub use vectors::{all_vectors, verify_all_vectors, vectors_json, GoldenVector};
