//! # Share Ledger Credit
//!
//! Turns a device's signed transfer history into a bounded, usable balance.
//!
//! All functions are pure: they read records and a clock value supplied by
//! the caller and never touch storage or the system time.
//!
//! ## Formula
//!
//! ```text
//! decayed   = floor(bytes * 0.5 ^ ((now - t) / half_life))
//! per peer  = min(sum(decayed served to peer), per_peer_cap)
//! diversity = min(1, distinct_counterparties / diversity_target)
//! drip      = clamp(elapsed_days * drip_cap, 0, drip_cap)
//! balance   = min(drip, floor(sum(per peer) * diversity), max_balance)
//! ```

pub mod decay;
pub mod diversity;
pub mod drip;
pub mod engine;
pub mod error;
pub mod params;

pub use decay::{decay_factor, decayed_value};
pub use diversity::{counterparty_diversity, diversity_factor, recent_window};
pub use drip::drip_allowance;
pub use engine::{CreditEngine, CreditReport, PeerContribution};
pub use error::CreditError;
pub use params::{CreditParams, MB, MILLIS_PER_DAY};
