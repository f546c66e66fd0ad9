//! State reconciliation
//!
//! Builds a consolidated view of configured intent versus actual ledger
//! state: module activation, delegate registration, per-asset allowances,
//! and the proposal store's pending items evaluated against the current
//! threshold. Read-only; operators act on the findings through the
//! sequencer or the proposal flow.

use crate::aggregator::SignatureAggregator;
use crate::config::WalletConfig;
use crate::ledger::SafeLedger;
use crate::policy::now_minutes;
use crate::types::{AllowanceState, OwnerSet, TxCommitment};
use crate::Result;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One configured allowance compared against the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceView {
    /// Asset address
    pub token: Address,
    /// Amount the configuration grants per window
    pub configured_amount: u128,
    /// Interval the configuration specifies, minutes
    pub configured_interval_min: u16,
    /// Tuple currently held by the ledger
    pub on_chain: AllowanceState,
    /// Headroom left in the current window
    pub remaining: u128,
    /// Whether ledger grant and interval match configuration
    pub in_sync: bool,
}

/// One pending proposal evaluated against the live owner set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSummary {
    /// Aggregation key
    pub commitment: TxCommitment,
    /// Nonce the proposal was built for
    pub nonce: u64,
    /// Distinct signatures collected
    pub collected: usize,
    /// Signatures still required
    pub threshold: usize,
    /// Ready to submit under the current threshold
    pub executable: bool,
    /// Another transaction consumed this nonce; the proposal is dead
    pub superseded: bool,
    /// Owners that have not signed
    pub missing_signers: Vec<Address>,
}

/// Consolidated account view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    /// The co-signed account
    pub account: Address,
    /// Current commitment-scope nonce
    pub account_nonce: u64,
    /// Live owner set and threshold
    pub owner_set: OwnerSet,
    /// Allowance module activated on the account
    pub module_enabled: bool,
    /// Delegate present in the module's registry
    pub delegate_registered: bool,
    /// Delegate's native balance, smallest units
    pub delegate_native_balance: u128,
    /// Configured allowances against ledger state
    pub allowances: Vec<AllowanceView>,
    /// Pending proposals, when a proposal store was supplied
    pub proposals: Vec<ProposalSummary>,
}

impl AccountView {
    /// Whether every provisioning step the configuration asks for is
    /// reflected on the ledger
    pub fn is_provisioned(&self) -> bool {
        self.module_enabled
            && self.delegate_registered
            && self.allowances.iter().all(|a| a.in_sync)
    }
}

/// Read-only comparison of configuration against the ledger
pub struct Reconciler {
    ledger: Arc<dyn SafeLedger>,
    config: WalletConfig,
}

impl Reconciler {
    /// Create a reconciler for the configured account
    pub fn new(ledger: Arc<dyn SafeLedger>, config: WalletConfig) -> Self {
        Self { ledger, config }
    }

    /// Take a full snapshot. Pass the aggregator to include pending
    /// proposals in the view.
    pub async fn snapshot(&self, aggregator: Option<&SignatureAggregator>) -> Result<AccountView> {
        let account = self.config.account;
        let module = self.config.module;
        let delegate = self.config.delegate;

        let account_nonce = self.ledger.account_nonce(account).await?;
        let owner_set = self.ledger.owner_set(account).await?;
        let module_enabled = self.ledger.is_module_enabled(account, module).await?;
        let delegates = self.ledger.delegates(module, account).await?;
        let delegate_native_balance = self.ledger.native_balance(delegate).await?;

        let now_min = now_minutes();
        let mut allowances = Vec::with_capacity(self.config.allowances.len());
        for configured in &self.config.allowances {
            let on_chain = self
                .ledger
                .allowance(module, account, delegate, configured.token)
                .await?;
            let in_sync = on_chain.amount == configured.amount
                && on_chain.reset_interval_min == configured.reset_interval_min as u32;
            if !in_sync {
                tracing::warn!(
                    token = %configured.token,
                    configured = configured.amount,
                    on_chain = on_chain.amount,
                    "allowance drift detected"
                );
            }
            allowances.push(AllowanceView {
                token: configured.token,
                configured_amount: configured.amount,
                configured_interval_min: configured.reset_interval_min,
                on_chain,
                remaining: on_chain.remaining(now_min),
                in_sync,
            });
        }

        let proposals = match aggregator {
            Some(aggregator) => aggregator
                .pending()
                .into_iter()
                .map(|p| {
                    let signed = p.signers();
                    ProposalSummary {
                        commitment: p.commitment,
                        nonce: p.tx.nonce,
                        collected: p.signer_count(),
                        threshold: owner_set.threshold,
                        executable: p.is_executable(owner_set.threshold)
                            && p.tx.nonce == account_nonce,
                        superseded: p.tx.nonce < account_nonce,
                        missing_signers: owner_set
                            .owners
                            .iter()
                            .filter(|owner| !signed.contains(owner))
                            .copied()
                            .collect(),
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(AccountView {
            account,
            account_nonce,
            owner_set,
            module_enabled,
            delegate_registered: delegates.contains(&delegate),
            delegate_native_balance,
            allowances,
            proposals,
        })
    }
}
