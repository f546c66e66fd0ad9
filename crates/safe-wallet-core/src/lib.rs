//! # Safe Wallet Core
//!
//! Client engine for a co-signed smart account with a delegated spending
//! module. An account controlled by N owner keys executes transactions
//! only when a threshold of owners has signed the same commitment, while
//! a registered delegate pulls limited amounts through a periodic
//! allowance without any co-signature.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Digest Engine**: domain-bound two-stage commitment hashing
//! - **Signature Codec**: 65-byte recoverable signatures in the offset
//!   convention, sorted and concatenated for on-chain verification
//! - **Aggregator**: collects co-signer signatures per commitment until
//!   the live threshold is met
//! - **Sequencer**: idempotent provisioning pipeline (module activation,
//!   delegate registration, allowance grants)
//! - **Policy Engine**: local advisory evaluation of allowance pulls
//! - **Reconciler**: configured intent versus ledger state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use safe_wallet_core::{
//!     AllowanceExecutor, RpcClient, SafeClient, SetupSequencer, Submitter,
//!     LocalSigner, WalletConfig,
//! };
//! use std::sync::Arc;
//!
//! let config = WalletConfig::from_file("wallet.json")?;
//! let rpc = RpcClient::new(config.rpc_urls.clone())?;
//! let key = Arc::new(LocalSigner::from_hex(&owner_key_hex)?);
//! let submitter = Submitter::new(rpc.clone(), config.chain_id, key.clone());
//! let ledger = Arc::new(SafeClient::new(rpc, submitter));
//!
//! // Provision the account (re-runnable; completed steps are skipped)
//! let report = SetupSequencer::new(ledger.clone(), key, config.clone())
//!     .run()
//!     .await?;
//!
//! // Pull within the allowance, no co-signature involved
//! let executor = AllowanceExecutor::new(ledger, config);
//! executor.pull(token, recipient, 25).await?;
//! ```
//!
//! ## Security Model
//!
//! Two disjoint authorization paths, both enforced by the ledger:
//! - co-signed execution requires `threshold` distinct owner signatures
//!   over the commitment; the threshold is re-read at evaluation time
//! - allowance pulls carry an empty signature and rest entirely on the
//!   module's caller check against the registered delegate set
//!
//! The local policy engine is advisory only and never substitutes for
//! either check.

pub mod abi;
pub mod aggregator;
pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod pull;
pub mod reconciler;
pub mod sequencer;
pub mod signer;
pub mod submit;
pub mod types;

pub use aggregator::{
    MemoryProposalStore, PendingProposal, ProposalState, ProposalStore, SignatureAggregator,
};
pub use codec::{recover_from_bytes, recover_signer, signature_blob, ETH_SIGN_V_OFFSET};
pub use config::{AllowanceConfig, LowBalanceConfig, RetryPolicy, WalletConfig};
pub use digest::{compute_commitment, keccak256, DomainSeparator};
pub use error::{Error, Result};
pub use ledger::{RpcClient, SafeClient, SafeLedger, TxOutcome};
pub use policy::{decide_transfer, now_minutes, DenyReason, TransferDecision};
pub use pull::AllowanceExecutor;
pub use reconciler::{AccountView, AllowanceView, ProposalSummary, Reconciler};
pub use sequencer::{SetupReport, SetupSequencer, StepAction, StepReport};
pub use signer::{DigestSigner, LocalSigner};
pub use submit::Submitter;
pub use types::{
    AdminOp, AllowanceState, Operation, OwnerSet, SafeTransaction, Signature, TxCommitment,
    MAX_ALLOWANCE_AMOUNT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
