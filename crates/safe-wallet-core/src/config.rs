//! Process configuration
//!
//! One explicit configuration struct, constructed once at process start and
//! passed into each component. No component reads ambient environment state
//! directly, and the engine never mutates loaded configuration.

use crate::types::MAX_ALLOWANCE_AMOUNT;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Retry policy for ledger reads that may observe pre-write state.
///
/// Injected into the read path wherever a read races a confirmed write
/// (the chain read-replica may lag). Exhausting the budget surfaces
/// `Error::StaleRead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum read attempts before the stale read becomes fatal
    pub max_attempts: u32,
    /// Delay before the first retry, milliseconds
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 2_000,
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.saturating_pow(attempt) as u64;
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }
}

/// Per-asset allowance granted to the delegate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceConfig {
    /// Asset address; the zero address denotes the native asset
    pub token: Address,
    /// Granted amount per reset window, smallest unit
    pub amount: u128,
    /// Reset interval in minutes
    pub reset_interval_min: u16,
}

/// Auto-refill trigger for the delegate's native balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowBalanceConfig {
    /// Refill when the delegate's native balance drops below this
    pub threshold: u128,
    /// Amount pulled through the allowance path on refill
    pub refill_amount: u128,
}

/// Complete wallet configuration, loaded once at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Chain identifier bound into every commitment
    pub chain_id: u64,
    /// JSON-RPC endpoints, tried in order with failover
    pub rpc_urls: Vec<String>,
    /// The co-signed account address
    pub account: Address,
    /// Allowance module contract address
    pub module: Address,
    /// The constrained delegate identity
    pub delegate: Address,
    /// Allowances configured during setup, in pipeline order
    pub allowances: Vec<AllowanceConfig>,
    /// Optional auto-refill trigger
    #[serde(default)]
    pub low_balance: Option<LowBalanceConfig>,
    /// Settle delay between dependent pipeline steps, seconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
    /// Retry policy for lag-prone ledger reads
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Off-chain proposal relay endpoint
    #[serde(default)]
    pub relay_url: Option<String>,
}

fn default_settle_delay() -> u64 {
    15
}

impl WalletConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.rpc_urls.is_empty() {
            return Err(Error::InvalidConfig("at least one RPC URL required".into()));
        }
        if self.allowances.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one allowance must be configured".into(),
            ));
        }
        for allowance in &self.allowances {
            if allowance.amount == 0 || allowance.amount > MAX_ALLOWANCE_AMOUNT {
                return Err(Error::InvalidConfig(format!(
                    "allowance amount for {} must be nonzero and fit 96 bits",
                    allowance.token
                )));
            }
            if allowance.reset_interval_min == 0 {
                return Err(Error::InvalidConfig(format!(
                    "reset interval for {} must be nonzero",
                    allowance.token
                )));
            }
        }
        Ok(())
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}
