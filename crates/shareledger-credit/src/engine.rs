//! Balance computation.
//!
//! A device earns credit by serving bytes. Each served transfer decays with
//! age, each counterparty's contribution is capped, the total is scaled by
//! counterparty diversity, and the result can never exceed the drip allowance
//! or the absolute maximum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shareledger_core::{Ed25519PublicKey, ShareRecord};

use crate::decay::{decay_factor, decayed_value};
use crate::diversity::{counterparty_diversity, diversity_factor};
use crate::drip::drip_allowance;
use crate::error::Result;
use crate::params::{CreditParams, Policy};

/// What one counterparty contributed to a device's credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerContribution {
    pub counterparty: Ed25519PublicKey,
    /// Bytes served to this counterparty, undecayed.
    pub raw: u64,
    /// Sum of decayed transfer values.
    pub decayed: u64,
    /// `min(decayed, per_peer_cap)`.
    pub capped: u64,
}

/// Breakdown of a balance computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    pub device: Ed25519PublicKey,
    pub evaluated_at: i64,
    pub drip_allowance: u64,
    /// Sum of decayed contributions before per-peer caps.
    pub decayed_total: u64,
    /// Sum of capped contributions.
    pub capped_total: u64,
    pub distinct_counterparties: usize,
    pub diversity_factor: f64,
    /// `floor(capped_total * diversity_factor)`.
    pub diversity_adjusted: u64,
    /// The usable credit.
    pub balance: u64,
    pub contributions: Vec<PeerContribution>,
}

impl CreditReport {
    /// Report for a device with no usable credit.
    pub fn empty(device: Ed25519PublicKey, evaluated_at: i64) -> Self {
        Self {
            device,
            evaluated_at,
            drip_allowance: 0,
            decayed_total: 0,
            capped_total: 0,
            distinct_counterparties: 0,
            diversity_factor: 0.0,
            diversity_adjusted: 0,
            balance: 0,
            contributions: Vec::new(),
        }
    }
}

/// Pure credit computation over validated parameters.
#[derive(Debug, Clone)]
pub struct CreditEngine {
    params: CreditParams,
    policy: Policy,
}

impl CreditEngine {
    /// Build an engine. Invalid parameters fail here, before any computation.
    pub fn new(params: CreditParams) -> Result<Self> {
        let policy = params.to_policy()?;
        Ok(Self { params, policy })
    }

    pub fn params(&self) -> &CreditParams {
        &self.params
    }

    pub fn decay_factor(&self, interaction_time: i64, now: i64) -> f64 {
        decay_factor(interaction_time, now, self.policy.half_life_ms)
    }

    pub fn decayed_value(&self, raw_bytes: u64, interaction_time: i64, now: i64) -> u64 {
        decayed_value(raw_bytes, interaction_time, now, self.policy.half_life_ms)
    }

    pub fn drip_allowance(&self, created_at: i64, now: i64) -> u64 {
        drip_allowance(created_at, now, self.policy.drip_cap)
    }

    /// Counterparty counts over the configured window.
    pub fn counterparty_diversity(
        &self,
        device: &Ed25519PublicKey,
        records: &[ShareRecord],
    ) -> BTreeMap<Ed25519PublicKey, u32> {
        counterparty_diversity(device, records, self.policy.diversity_window)
    }

    /// Decayed, per-peer-capped contributions from every counterparty the
    /// device has served, ordered by counterparty key.
    pub fn contributions(
        &self,
        device: &Ed25519PublicKey,
        records: &[ShareRecord],
        now: i64,
    ) -> Vec<PeerContribution> {
        let mut by_peer: BTreeMap<Ed25519PublicKey, (u64, u64)> = BTreeMap::new();
        for record in records.iter().filter(|r| r.sender() == device) {
            let entry = by_peer.entry(*record.receiver()).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(record.bytes_total());
            entry.1 = entry
                .1
                .saturating_add(self.decayed_value(record.bytes_total(), record.timestamp(), now));
        }

        by_peer
            .into_iter()
            .map(|(counterparty, (raw, decayed))| PeerContribution {
                counterparty,
                raw,
                decayed,
                capped: decayed.min(self.policy.per_peer_cap),
            })
            .collect()
    }

    /// Credit a single counterparty contributes to `device`.
    pub fn pair_credit(
        &self,
        device: &Ed25519PublicKey,
        counterparty: &Ed25519PublicKey,
        records: &[ShareRecord],
        now: i64,
    ) -> u64 {
        let decayed = records
            .iter()
            .filter(|r| r.sender() == device && r.receiver() == counterparty)
            .fold(0u64, |acc, r| {
                acc.saturating_add(self.decayed_value(r.bytes_total(), r.timestamp(), now))
            });
        decayed.min(self.policy.per_peer_cap)
    }

    /// Balance with diversity computed from `records`.
    pub fn compute(
        &self,
        device: &Ed25519PublicKey,
        created_at: i64,
        records: &[ShareRecord],
        now: i64,
    ) -> CreditReport {
        let diversity = self.counterparty_diversity(device, records);
        self.compute_with_diversity(device, created_at, records, &diversity, now)
    }

    /// Balance with a diversity map supplied by the caller, typically the
    /// store's windowed query.
    pub fn compute_with_diversity(
        &self,
        device: &Ed25519PublicKey,
        created_at: i64,
        records: &[ShareRecord],
        diversity: &BTreeMap<Ed25519PublicKey, u32>,
        now: i64,
    ) -> CreditReport {
        let mut report = CreditReport::empty(*device, now);
        report.drip_allowance = self.drip_allowance(created_at, now);

        let involved = records.iter().any(|r| r.involves(device));
        if !involved {
            return report;
        }

        let contributions = self.contributions(device, records, now);
        report.decayed_total = contributions
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.decayed));
        report.capped_total = contributions
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.capped));
        report.contributions = contributions;

        report.distinct_counterparties = diversity.len();
        report.diversity_factor =
            diversity_factor(report.distinct_counterparties, self.policy.diversity_target);
        report.diversity_adjusted =
            (report.capped_total as f64 * report.diversity_factor).floor() as u64;

        report.balance = report
            .drip_allowance
            .min(report.capped_total)
            .min(report.diversity_adjusted)
            .min(self.policy.max_balance);
        report
    }

    /// The usable balance alone.
    pub fn balance(
        &self,
        device: &Ed25519PublicKey,
        created_at: i64,
        records: &[ShareRecord],
        now: i64,
    ) -> u64 {
        self.compute(device, created_at, records, now).balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CreditError;
    use crate::params::{MB, MILLIS_PER_DAY};
    use shareledger_core::{ChainPosition, Keypair, ShareRecordBuilder};

    fn record(from: &Keypair, to: &Keypair, bytes: u64, timestamp: i64) -> ShareRecord {
        ShareRecordBuilder::new(
            ChainPosition::genesis(from.public_key()),
            ChainPosition::genesis(to.public_key()),
        )
        .bytes_total(bytes)
        .timestamp(timestamp)
        .build()
        .sign_as_sender(from)
        .unwrap()
        .countersign(to)
        .unwrap()
    }

    fn engine() -> CreditEngine {
        CreditEngine::new(CreditParams::default()).unwrap()
    }

    #[test]
    fn test_invalid_params_fail_fast() {
        let result = CreditEngine::new(CreditParams {
            half_life_ms: -5,
            ..CreditParams::default()
        });
        assert!(matches!(result, Err(CreditError::Configuration { .. })));
    }

    #[test]
    fn test_empty_history_is_zero() {
        let a = Keypair::from_seed(&[1; 32]).public_key();
        let report = engine().compute(&a, 0, &[], 30 * MILLIS_PER_DAY);
        assert_eq!(report.balance, 0);
        assert_eq!(report.drip_allowance, 50 * MB as u64);
    }

    #[test]
    fn test_fresh_device_bounded_by_drip() {
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let records = vec![record(&a, &b, 10 * MB as u64, 0)];

        // Day 0: drip is 0, so nothing is usable yet.
        assert_eq!(engine().balance(&a.public_key(), 0, &records, 0), 0);
    }

    #[test]
    fn test_25_day_scenario() {
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let raw = 10 * MB as u64;
        let records = vec![record(&a, &b, raw, 0)];
        let now = 25 * MILLIS_PER_DAY;

        let report = engine().compute(&a.public_key(), 0, &records, now);

        // 1. Decay: 10 MiB at 90-day half-life after 25 days.
        let expected_decayed = (raw as f64 * 0.5f64.powf(25.0 / 90.0)).floor() as u64;
        assert_eq!(report.decayed_total, expected_decayed);
        assert_eq!(report.capped_total, expected_decayed);

        // 2. Drip is already at the cap.
        assert_eq!(report.drip_allowance, 50 * MB as u64);

        // 3. One counterparty out of a target of five.
        assert_eq!(report.distinct_counterparties, 1);
        assert_eq!(report.diversity_factor, 0.2);

        // 4. Balance is the diversity-scaled sum.
        let adjusted = (expected_decayed as f64 * 0.2).floor() as u64;
        assert_eq!(report.diversity_adjusted, adjusted);
        assert_eq!(report.balance, adjusted);
    }

    #[test]
    fn test_received_bytes_earn_nothing() {
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let records = vec![record(&b, &a, 10 * MB as u64, 0)];

        let report = engine().compute(&a.public_key(), 0, &records, 10 * MILLIS_PER_DAY);
        assert_eq!(report.capped_total, 0);
        assert_eq!(report.balance, 0);
        assert_eq!(report.distinct_counterparties, 1);
    }

    #[test]
    fn test_per_peer_cap() {
        let engine = CreditEngine::new(CreditParams {
            per_peer_cap: MB,
            diversity_target: 0,
            ..CreditParams::default()
        })
        .unwrap();
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let c = Keypair::from_seed(&[3; 32]);
        let records = vec![
            record(&a, &b, 10 * MB as u64, 0),
            record(&a, &b, 10 * MB as u64, 1),
            record(&a, &c, MB as u64 / 2, 2),
        ];

        let report = engine.compute(&a.public_key(), 0, &records, 2);
        assert_eq!(report.contributions.len(), 2);
        assert_eq!(report.capped_total, MB as u64 + MB as u64 / 2);
        assert_eq!(
            engine.pair_credit(&a.public_key(), &b.public_key(), &records, 2),
            MB as u64
        );
        // Day 0 plus 2ms: drip still binds.
        assert!(report.balance <= report.drip_allowance);
    }

    #[test]
    fn test_full_diversity_and_max_balance() {
        let engine = CreditEngine::new(CreditParams {
            max_balance: 3 * MB,
            diversity_target: 2,
            ..CreditParams::default()
        })
        .unwrap();
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let c = Keypair::from_seed(&[3; 32]);
        let now = 10 * MILLIS_PER_DAY;
        let records = vec![
            record(&a, &b, 4 * MB as u64, now),
            record(&a, &c, 4 * MB as u64, now),
        ];

        let report = engine.compute(&a.public_key(), 0, &records, now);
        assert_eq!(report.diversity_factor, 1.0);
        assert_eq!(report.diversity_adjusted, 8 * MB as u64);
        assert_eq!(report.balance, 3 * MB as u64);
    }

    #[test]
    fn test_balance_never_exceeds_bounds() {
        let engine = engine();
        let a = Keypair::from_seed(&[1; 32]);
        let peers: Vec<Keypair> = (2..10u8).map(|i| Keypair::from_seed(&[i; 32])).collect();
        let records: Vec<ShareRecord> = peers
            .iter()
            .enumerate()
            .map(|(i, p)| record(&a, p, 100 * MB as u64, i as i64))
            .collect();

        for days in [0, 1, 30, 365] {
            let now = days * MILLIS_PER_DAY;
            let report = engine.compute(&a.public_key(), 0, &records, now);
            assert!(report.balance <= report.drip_allowance);
            assert!(report.balance <= report.capped_total);
            assert!(report.balance <= 1024 * MB as u64);
        }
    }
}
