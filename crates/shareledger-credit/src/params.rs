//! Economic parameters and their validation.

use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};

/// One mebibyte.
pub const MB: i64 = 1024 * 1024;

/// Milliseconds in a day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Credit parameters as configured.
///
/// Fields are signed so a bad config file is caught by [`CreditParams::validate`]
/// rather than silently wrapped. Byte amounts are bytes; durations are ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditParams {
    /// Daily drip rate. Validated but not used by the drip formula, which
    /// scales the cap itself.
    pub drip_rate: i64,
    /// Upper bound of the drip allowance.
    pub drip_cap: i64,
    /// Number of most recent records examined for counterparty diversity.
    pub diversity_window: i64,
    /// Distinct counterparties needed for full credit. 0 disables scaling.
    pub diversity_target: i64,
    /// Decay half-life. Must be positive.
    pub half_life_ms: i64,
    /// Most credit any single counterparty can contribute.
    pub per_peer_cap: i64,
    /// Checkpoint epoch length. Must be positive.
    pub epoch_len_ms: i64,
    /// Absolute upper bound on any balance.
    pub max_balance: i64,
}

impl Default for CreditParams {
    fn default() -> Self {
        Self {
            drip_rate: 2 * MB,
            drip_cap: 50 * MB,
            diversity_window: 50,
            diversity_target: 5,
            half_life_ms: 90 * MILLIS_PER_DAY,
            per_peer_cap: 500 * MB,
            epoch_len_ms: 7 * MILLIS_PER_DAY,
            max_balance: 1024 * MB,
        }
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(CreditError::Configuration {
            field,
            reason: format!("cannot be negative (got {})", value),
        });
    }
    Ok(())
}

fn positive(field: &'static str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(CreditError::Configuration {
            field,
            reason: format!("must be positive (got {})", value),
        });
    }
    Ok(())
}

impl CreditParams {
    /// Check every parameter. Call before any computation.
    pub fn validate(&self) -> Result<()> {
        non_negative("drip_rate", self.drip_rate)?;
        non_negative("drip_cap", self.drip_cap)?;
        non_negative("diversity_window", self.diversity_window)?;
        non_negative("diversity_target", self.diversity_target)?;
        positive("half_life_ms", self.half_life_ms)?;
        non_negative("per_peer_cap", self.per_peer_cap)?;
        positive("epoch_len_ms", self.epoch_len_ms)?;
        non_negative("max_balance", self.max_balance)?;
        Ok(())
    }

    /// Validate and convert into the unsigned form the engine computes with.
    pub(crate) fn to_policy(&self) -> Result<Policy> {
        self.validate()?;
        Ok(Policy {
            drip_cap: self.drip_cap as u64,
            diversity_window: self.diversity_window as usize,
            diversity_target: self.diversity_target as u64,
            half_life_ms: self.half_life_ms,
            per_peer_cap: self.per_peer_cap as u64,
            max_balance: self.max_balance as u64,
        })
    }
}

/// Validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Policy {
    pub drip_cap: u64,
    pub diversity_window: usize,
    pub diversity_target: u64,
    pub half_life_ms: i64,
    pub per_peer_cap: u64,
    pub max_balance: u64,
}
