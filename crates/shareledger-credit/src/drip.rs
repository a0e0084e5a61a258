//! Drip allowance: a time-bootstrapped ceiling for new devices.

use crate::params::MILLIS_PER_DAY;

/// `clamp(elapsed_days * cap, 0, cap)` with fractional days.
///
/// The cap itself is scaled by elapsed days, so the allowance reaches the cap
/// after one day. A device created in the future gets 0.
pub fn drip_allowance(created_at: i64, now: i64, cap: u64) -> u64 {
    if now < created_at {
        return 0;
    }
    let days = now.saturating_sub(created_at) as f64 / MILLIS_PER_DAY as f64;
    let drip = days * cap as f64;
    if drip >= cap as f64 {
        return cap;
    }
    if drip <= 0.0 {
        return 0;
    }
    drip as u64
}
