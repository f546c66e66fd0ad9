//! Transport types shared by the relay client and server
//!
//! The relay stores opaque proposal payloads and 65-byte signature blobs.
//! It never verifies anything beyond shape: co-signers re-verify every
//! fetched signature by recovery before accepting it, so a compromised
//! relay can at worst withhold data.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use safe_wallet_core::{SafeTransaction, TxCommitment};
use serde::{Deserialize, Serialize};

/// A signature as the relay stores it: claimed signer plus raw bytes.
/// The claim is advisory; clients trust only recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSignature {
    /// Claimed signer identity
    pub signer: Address,
    /// 65-byte `r || s || v` signature
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    /// When the relay received it
    pub added_at: DateTime<Utc>,
}

/// A proposal as the relay stores it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProposal {
    /// Aggregation key
    pub commitment: TxCommitment,
    /// The canonical transaction being authorized
    pub tx: SafeTransaction,
    /// Signatures received so far
    pub signatures: Vec<StoredSignature>,
    /// When the proposal was published
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Publish a proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishProposalRequest {
    pub commitment: TxCommitment,
    pub tx: SafeTransaction,
}

/// Submit a signature for a proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSignatureRequest {
    pub signer: Address,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// Signature count after a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureCountResponse {
    pub commitment: TxCommitment,
    pub collected: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Service statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub proposals: usize,
    pub uptime_secs: u64,
}

/// Hex serde for signature bytes
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
