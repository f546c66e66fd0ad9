//! # Safe Wallet Relay Service
//!
//! Store-and-forward relay for distributing transaction proposals and
//! collecting owner signatures when co-signers cannot talk to each other
//! directly.
//!
//! ## Features
//!
//! - **Proposal Publishing**: Share a canonical transaction under its commitment
//! - **Signature Collection**: Gather 65-byte owner signatures per proposal
//! - **TTL Expiry**: Stale proposals age out automatically
//! - **Untrusted by Design**: The relay validates shape only; clients
//!   re-verify every fetched signature by recovery
//!
//! ## Signing Flow
//!
//! ```text
//! Proposer ──► Relay ──► Co-signer
//!    │           │           │
//!    │           │           ▼
//!    │           │     Verify & Sign
//!    │           │           │
//!    │           ◄───────────┘
//!    │           │
//!    ◄───────────┘
//!    │
//!    ▼
//! Assemble blob & Execute
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use safe_wallet_relay::{ProposalRelayService, RelayConfig};
//!
//! // Create relay service with configuration
//! let config = RelayConfig::default()
//!     .with_proposal_ttl(3600)
//!     .with_request_timeout(60);
//!
//! let relay = ProposalRelayService::new(config);
//!
//! // Start server with graceful shutdown support
//! relay.serve("0.0.0.0:8080".parse::<std::net::SocketAddr>()?).await?;
//! ```

pub mod error;
pub mod store;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub mod client;

pub use error::{RelayError, Result};
pub use store::ProposalCache;
pub use types::{
    HealthResponse, PublishProposalRequest, SignatureCountResponse, StatsResponse,
    StoredProposal, StoredSignature, SubmitSignatureRequest,
};

#[cfg(feature = "server")]
pub use server::{ProposalRelayService, RelayConfig};

#[cfg(feature = "client")]
pub use client::{RelayClient, RelayClientConfig};

/// Re-export core types for convenience
pub use safe_wallet_core::{SafeTransaction, TxCommitment};
