use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decimal::Rate;
use crate::errors::{LedgerError, Result};
use crate::payments::OverpaymentPolicy;
use crate::types::Frequency;

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub lock: LockConfig,
    /// fraction of the outstanding balance charged on early payoff
    pub early_repayment_penalty_rate: Rate,
    pub overpayment_policy: OverpaymentPolicy,
    /// cadence used for schedules created from a disbursement
    pub schedule_frequency: Frequency,
    /// default look-ahead for payment reminders
    pub upcoming_window_days: u32,
}

/// lock lease and retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_seconds: u64,
    pub max_attempts: u32,
    /// backoff before attempt n is n * retry_backoff_ms
    pub retry_backoff_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 30,
            max_attempts: 5,
            retry_backoff_ms: 50,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            early_repayment_penalty_rate: Rate::from_decimal(dec!(0.02)),
            overpayment_policy: OverpaymentPolicy::Reject,
            schedule_frequency: Frequency::Monthly,
            upcoming_window_days: 7,
        }
    }
}

impl LedgerConfig {
    /// parse a (possibly partial) json document, missing fields take defaults
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(raw).map_err(|e| LedgerError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock.max_attempts == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "lock.max_attempts must be at least 1".to_string(),
            });
        }

        if self.lock.ttl_seconds == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "lock.ttl_seconds must be positive".to_string(),
            });
        }

        let penalty = self.early_repayment_penalty_rate;
        if penalty.is_negative() || penalty > Rate::ONE {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("early repayment penalty rate out of range: {}", penalty),
            });
        }

        Ok(())
    }

    pub fn with_overpayment_policy(mut self, policy: OverpaymentPolicy) -> Self {
        self.overpayment_policy = policy;
        self
    }

    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_schedule_frequency(mut self, frequency: Frequency) -> Self {
        self.schedule_frequency = frequency;
        self
    }
}
