//! Error types for the proposal relay

use thiserror::Error;

/// Relay service errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Proposal not found
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    /// Proposal expired
    #[error("Proposal expired: {0}")]
    ProposalExpired(String),

    /// Malformed signature payload
    #[error("Invalid signature payload: {0}")]
    InvalidSignature(String),

    /// Malformed proposal payload
    #[error("Invalid proposal payload: {0}")]
    InvalidProposal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::ProposalNotFound(_) => 404,
            RelayError::ProposalExpired(_) => 410,
            RelayError::InvalidSignature(_) => 400,
            RelayError::InvalidProposal(_) => 400,
            RelayError::Serialization(_) => 400,
            RelayError::Network(_) => 503,
            RelayError::Internal(_) => 500,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Network(_))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
