//! Setup pipeline sequencer
//!
//! Drives the account from "fresh" to "fully provisioned" through a fixed
//! order of administrative steps: activate the allowance module, register
//! the delegate, then grant each configured allowance. Every step probes
//! current ledger state first and is skipped when already satisfied, so
//! the whole pipeline can be re-run after a crash without duplicating
//! work. The fast path requires a single-owner account; multi-owner
//! accounts go through the proposal flow instead.

use crate::config::WalletConfig;
use crate::digest::{compute_commitment, DomainSeparator};
use crate::codec::signature_blob;
use crate::ledger::SafeLedger;
use crate::signer::DigestSigner;
use crate::types::AdminOp;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// What happened to one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Step was executed on-chain
    Executed { tx_hash: String },
    /// Ledger state already satisfied the step
    Skipped,
}

/// Report for one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// Step label
    pub step: String,
    /// Executed or skipped
    pub action: StepAction,
}

/// Full pipeline report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupReport {
    /// Steps in execution order
    pub steps: Vec<StepReport>,
}

impl SetupReport {
    /// Number of steps that reached the ledger
    pub fn executed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.action, StepAction::Executed { .. }))
            .count()
    }

    fn record(&mut self, step: &str, action: StepAction) {
        self.steps.push(StepReport {
            step: step.to_string(),
            action,
        });
    }
}

/// Runs the provisioning pipeline against a single-owner account
pub struct SetupSequencer {
    ledger: Arc<dyn SafeLedger>,
    signer: Arc<dyn DigestSigner>,
    config: WalletConfig,
    domain: DomainSeparator,
}

impl SetupSequencer {
    /// Create a sequencer. `signer` must hold the account's sole owner key.
    pub fn new(
        ledger: Arc<dyn SafeLedger>,
        signer: Arc<dyn DigestSigner>,
        config: WalletConfig,
    ) -> Self {
        let domain = DomainSeparator::new(config.chain_id, config.account);
        Self {
            ledger,
            signer,
            config,
            domain,
        }
    }

    /// Run the full pipeline. Aborts on the first on-chain rejection;
    /// already-completed steps remain safe to re-run.
    pub async fn run(&self) -> Result<SetupReport> {
        let account = self.config.account;
        let module = self.config.module;
        let delegate = self.config.delegate;

        let threshold = self.ledger.threshold(account).await?;
        if threshold != 1 {
            return Err(Error::SingleSignerRequired { threshold });
        }

        let mut report = SetupReport::default();

        // ===== Step 1: module activation =====
        if self.ledger.is_module_enabled(account, module).await? {
            tracing::info!("module already enabled, skipping");
            report.record("enable-module", StepAction::Skipped);
        } else {
            let tx_hash = self
                .execute_step(AdminOp::ModuleActivation { module })
                .await?;
            self.verify_with_retry("module activation", || {
                let ledger = self.ledger.clone();
                async move { ledger.is_module_enabled(account, module).await }
            })
            .await?;
            report.record("enable-module", StepAction::Executed { tx_hash });
            self.settle().await;
        }

        // ===== Step 2: delegate registration =====
        let delegates = self.ledger.delegates(module, account).await?;
        if delegates.contains(&delegate) {
            tracing::info!(%delegate, "delegate already registered, skipping");
            report.record("register-delegate", StepAction::Skipped);
        } else {
            let tx_hash = self
                .execute_step(AdminOp::DelegateRegistration { module, delegate })
                .await?;
            self.verify_with_retry("delegate registration", || {
                let ledger = self.ledger.clone();
                async move {
                    Ok(ledger
                        .delegates(module, account)
                        .await?
                        .contains(&delegate))
                }
            })
            .await?;
            report.record("register-delegate", StepAction::Executed { tx_hash });
            self.settle().await;
        }

        // ===== Step 3: allowance grants, in configuration order =====
        for allowance in &self.config.allowances {
            let step = format!("set-allowance:{}", allowance.token);
            let current = self
                .ledger
                .allowance(module, account, delegate, allowance.token)
                .await?;

            if current.amount == allowance.amount
                && current.reset_interval_min == allowance.reset_interval_min as u32
            {
                tracing::info!(token = %allowance.token, "allowance already set, skipping");
                report.record(&step, StepAction::Skipped);
                continue;
            }

            let tx_hash = self
                .execute_step(AdminOp::AllowanceUpdate {
                    module,
                    delegate,
                    token: allowance.token,
                    amount: allowance.amount,
                    reset_interval_min: allowance.reset_interval_min,
                })
                .await?;

            let (token, amount, interval) = (
                allowance.token,
                allowance.amount,
                allowance.reset_interval_min as u32,
            );
            self.verify_with_retry(&step, || {
                let ledger = self.ledger.clone();
                async move {
                    let state = ledger.allowance(module, account, delegate, token).await?;
                    Ok(state.amount == amount && state.reset_interval_min == interval)
                }
            })
            .await?;
            report.record(&step, StepAction::Executed { tx_hash });
            self.settle().await;
        }

        tracing::info!(
            executed = report.executed_count(),
            total = report.steps.len(),
            "setup pipeline complete"
        );
        Ok(report)
    }

    /// Execute one administrative operation outside the pipeline. Subject
    /// to the same single-owner requirement.
    pub async fn execute_admin(&self, op: AdminOp) -> Result<String> {
        let threshold = self.ledger.threshold(self.config.account).await?;
        if threshold != 1 {
            return Err(Error::SingleSignerRequired { threshold });
        }
        self.execute_step(op).await
    }

    /// Sign and submit one administrative operation at the current account
    /// nonce. An on-chain revert aborts the pipeline.
    async fn execute_step(&self, op: AdminOp) -> Result<String> {
        let step = op.label().to_string();
        let account = self.config.account;

        let nonce = self.ledger.account_nonce(account).await?;
        let tx = op.into_transaction(account, nonce)?;
        let commitment = compute_commitment(&self.domain, &tx);

        let signature = self.signer.sign_digest(commitment.as_bytes())?;
        let blob = signature_blob(&[(self.signer.address(), signature)]);

        tracing::info!(step = %step, nonce, %commitment, "executing setup step");
        let outcome = self.ledger.submit_execution(account, &tx, &blob).await?;

        if !outcome.success {
            return Err(Error::StepRejected {
                step,
                reason: format!("reverted in block {}", outcome.block_number),
            });
        }
        Ok(outcome.tx_hash)
    }

    /// Re-read until the write is visible, absorbing replica lag. The
    /// retry budget exhausted means the read path is persistently behind.
    async fn verify_with_retry<F, Fut>(&self, context: &str, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let retry = &self.config.retry;
        for attempt in 0..retry.max_attempts {
            if probe().await? {
                return Ok(());
            }
            tracing::debug!(context, attempt, "write not yet visible, retrying");
            tokio::time::sleep(retry.delay_for(attempt)).await;
        }
        Err(Error::StaleRead {
            attempts: retry.max_attempts,
            context: context.to_string(),
        })
    }

    async fn settle(&self) {
        tokio::time::sleep(self.config.settle_delay()).await;
    }
}
