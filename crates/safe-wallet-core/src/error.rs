//! Error types for wallet engine operations

use alloy_primitives::Address;
use thiserror::Error;

/// Result type alias for wallet engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while authorizing or executing transfers
#[derive(Debug, Error)]
pub enum Error {
    // ============ Encoding Errors ============
    /// Malformed signature or commitment input. Fatal, never retried.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ============ Aggregation Errors ============
    /// Aggregator asked about a commitment it never saw
    #[error("Unknown commitment: {0}")]
    UnknownCommitment(String),

    /// Signature count below the required threshold
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// Recovered signer does not match the claimed identity
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    // ============ Sequencer Errors ============
    /// On-chain revert during the setup pipeline. The pipeline aborts;
    /// completed steps stay safely re-runnable.
    #[error("Step rejected on-chain: {step} ({reason})")]
    StepRejected { step: String, reason: String },

    /// Read observed pre-write state past the retry budget
    #[error("Stale read after {attempts} attempts: {context}")]
    StaleRead { attempts: u32, context: String },

    /// Setup fast path requires an account threshold of exactly 1
    #[error("Single-signer setup requires threshold 1, account has {threshold}")]
    SingleSignerRequired { threshold: usize },

    // ============ Policy Denials ============
    /// Requested amount exceeds the remaining allowance for this period
    #[error("Insufficient allowance: requested {requested}, remaining {remaining}")]
    InsufficientAllowance { requested: u128, remaining: u128 },

    /// Identity is not in the registered delegate set
    #[error("Not a registered delegate: {0}")]
    NotADelegate(Address),

    // ============ Configuration Errors ============
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ============ Ledger Errors ============
    /// Ledger read/write failed
    #[error("Chain error: {0}")]
    ChainError(String),

    /// Timeout waiting for an external collaborator
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    // ============ Internal Errors ============
    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Encoding(e.to_string())
    }
}
