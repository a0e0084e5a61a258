//! Counterparty diversity over a device's recent history.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use shareledger_core::{Ed25519PublicKey, ShareRecord};

/// The `window` most recent records involving `device`, newest first.
///
/// Ordered by timestamp, then by the device's own chain index so that records
/// sharing a timestamp still have a stable order.
pub fn recent_window<'a>(
    device: &Ed25519PublicKey,
    records: &'a [ShareRecord],
    window: usize,
) -> Vec<&'a ShareRecord> {
    let mut involved: Vec<&ShareRecord> = records.iter().filter(|r| r.involves(device)).collect();
    involved.sort_by_key(|r| Reverse((r.timestamp(), r.index_for(device).unwrap_or(0))));
    involved.truncate(window);
    involved
}

/// Interaction counts per counterparty over the most recent `window` records.
pub fn counterparty_diversity(
    device: &Ed25519PublicKey,
    records: &[ShareRecord],
    window: usize,
) -> BTreeMap<Ed25519PublicKey, u32> {
    let mut counts = BTreeMap::new();
    for record in recent_window(device, records, window) {
        if let Some(peer) = record.counterparty_of(device) {
            *counts.entry(peer).or_insert(0u32) += 1;
        }
    }
    counts
}

/// `min(1, distinct / target)`. A target of 0 disables scaling.
pub fn diversity_factor(distinct_counterparties: usize, target: u64) -> f64 {
    if target == 0 {
        return 1.0;
    }
    (distinct_counterparties as f64 / target as f64).min(1.0)
}
