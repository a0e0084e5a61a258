//! Ledger configuration.

use serde::{Deserialize, Serialize};

use shareledger_credit::CreditParams;

use crate::error::{LedgerError, Result};

/// Configuration for the Ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Credit parameters.
    pub credit: CreditParams,
    /// Most peers kept in the peer cache. Least recently seen go first.
    pub peer_cache_limit: usize,
    /// Most chain records read when computing a balance.
    pub history_limit: usize,
    /// Transport label recorded on newly seen peers.
    pub transport_type: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            credit: CreditParams::default(),
            peer_cache_limit: 1000,
            history_limit: 10_000,
            transport_type: "unknown".into(),
        }
    }
}

impl LedgerConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Configuration(e.to_string()))
    }

    /// Check every field, including the credit parameters.
    pub fn validate(&self) -> Result<()> {
        self.credit.validate()?;
        if self.peer_cache_limit == 0 {
            return Err(LedgerError::Configuration(
                "peer_cache_limit must be positive".into(),
            ));
        }
        if self.history_limit == 0 {
            return Err(LedgerError::Configuration("history_limit must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        LedgerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LedgerConfig::from_json(r#"{"history_limit": 50, "credit": {"drip_cap": 10}}"#)
            .unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.credit.drip_cap, 10);
        assert_eq!(config.credit.half_life_ms, CreditParams::default().half_life_ms);
        assert_eq!(config.peer_cache_limit, 1000);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LedgerConfig {
            transport_type: "ble".into(),
            ..LedgerConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(LedgerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LedgerConfig::from_json(r#"{"credit": {"half_life_ms": 0}}"#),
            Err(LedgerError::Credit(_))
        ));
        assert!(matches!(
            LedgerConfig::from_json(r#"{"peer_cache_limit": 0}"#),
            Err(LedgerError::Configuration(_))
        ));
        assert!(matches!(
            LedgerConfig::from_json("not json"),
            Err(LedgerError::Configuration(_))
        ));
    }
}
