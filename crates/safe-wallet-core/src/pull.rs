//! Autonomous allowance pulls
//!
//! The delegate-side execution path: evaluate a requested transfer against
//! the local policy engine, and only if it passes, submit the
//! signature-free module call. The module's own caller check is the real
//! gate; the local evaluation just avoids paying for a submission that is
//! already known to fail.

use crate::config::WalletConfig;
use crate::ledger::{SafeLedger, TxOutcome};
use crate::policy::{decide_transfer, now_minutes};
use crate::{Error, Result};
use alloy_primitives::Address;
use std::sync::Arc;

/// Executes allowance transfers on behalf of the delegate
pub struct AllowanceExecutor {
    ledger: Arc<dyn SafeLedger>,
    config: WalletConfig,
}

impl AllowanceExecutor {
    /// Create an executor over the configured account and module
    pub fn new(ledger: Arc<dyn SafeLedger>, config: WalletConfig) -> Self {
        Self { ledger, config }
    }

    /// Pull `amount` of `token` from the account to `to`.
    ///
    /// Denied pulls never reach the ledger and the denial is final for
    /// this window; the caller decides whether to come back after reset.
    pub async fn pull(&self, token: Address, to: Address, amount: u128) -> Result<TxOutcome> {
        let account = self.config.account;
        let module = self.config.module;
        let delegate = self.config.delegate;

        let delegates = self.ledger.delegates(module, account).await?;
        let state = self
            .ledger
            .allowance(module, account, delegate, token)
            .await?;

        let remaining = decide_transfer(
            &state,
            delegate,
            delegates.contains(&delegate),
            amount,
            now_minutes(),
        )
        .into_result()?;

        tracing::info!(%token, %to, amount, remaining, "allowance pull permitted");

        let outcome = self
            .ledger
            .submit_allowance_transfer(module, account, token, to, amount, delegate)
            .await?;

        if !outcome.success {
            // local view was behind the ledger's; the ledger's verdict wins
            return Err(Error::ChainError(format!(
                "allowance transfer reverted in block {}",
                outcome.block_number
            )));
        }

        tracing::info!(tx_hash = %outcome.tx_hash, "allowance pull confirmed");
        Ok(outcome)
    }

    /// Advisory remaining headroom for `token` in the current window
    pub async fn remaining(&self, token: Address) -> Result<u128> {
        let state = self
            .ledger
            .allowance(
                self.config.module,
                self.config.account,
                self.config.delegate,
                token,
            )
            .await?;
        Ok(state.remaining(now_minutes()))
    }

    /// Refill the delegate's native balance from the account when it has
    /// dropped below the configured floor. Returns `None` when no refill
    /// is configured or needed.
    pub async fn check_refill(&self) -> Result<Option<TxOutcome>> {
        let Some(low_balance) = &self.config.low_balance else {
            return Ok(None);
        };

        let balance = self.ledger.native_balance(self.config.delegate).await?;
        if balance >= low_balance.threshold {
            return Ok(None);
        }

        tracing::info!(
            balance,
            threshold = low_balance.threshold,
            "delegate balance below floor, refilling"
        );
        let outcome = self
            .pull(
                Address::ZERO,
                self.config.delegate,
                low_balance.refill_amount,
            )
            .await?;
        Ok(Some(outcome))
    }
}
