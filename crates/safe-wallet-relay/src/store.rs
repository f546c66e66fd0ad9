//! In-memory proposal store with TTL expiry

use crate::types::{StoredProposal, StoredSignature};
use crate::{RelayError, Result};
use alloy_primitives::Address;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use safe_wallet_core::{SafeTransaction, TxCommitment};

/// Expected signature length for shape validation
const SIGNATURE_LEN: usize = 65;

/// Concurrent proposal cache keyed by commitment
pub struct ProposalCache {
    proposals: DashMap<TxCommitment, StoredProposal>,
    ttl: Duration,
}

impl ProposalCache {
    /// Create a cache whose entries expire after `ttl_secs`
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            proposals: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Publish a proposal. Re-publishing the same commitment keeps the
    /// existing entry and its signatures.
    pub fn publish(&self, commitment: TxCommitment, tx: SafeTransaction) -> StoredProposal {
        self.proposals
            .entry(commitment)
            .or_insert_with(|| StoredProposal {
                commitment,
                tx,
                signatures: Vec::new(),
                created_at: Utc::now(),
            })
            .clone()
    }

    /// Fetch a proposal
    pub fn get(&self, commitment: &TxCommitment) -> Result<StoredProposal> {
        let entry = self
            .proposals
            .get(commitment)
            .ok_or_else(|| RelayError::ProposalNotFound(commitment.to_string()))?;
        if self.is_expired(&entry) {
            return Err(RelayError::ProposalExpired(commitment.to_string()));
        }
        Ok(entry.clone())
    }

    /// Record a signature, replacing any prior one from the same claimed
    /// signer. Only the shape is validated here.
    pub fn add_signature(
        &self,
        commitment: &TxCommitment,
        signer: Address,
        bytes: Vec<u8>,
    ) -> Result<usize> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(RelayError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let mut entry = self
            .proposals
            .get_mut(commitment)
            .ok_or_else(|| RelayError::ProposalNotFound(commitment.to_string()))?;

        let signature = StoredSignature {
            signer,
            bytes,
            added_at: Utc::now(),
        };
        match entry.signatures.iter_mut().find(|s| s.signer == signer) {
            Some(slot) => *slot = signature,
            None => entry.signatures.push(signature),
        }
        Ok(entry.signatures.len())
    }

    /// Remove a proposal, returning whether it existed
    pub fn remove(&self, commitment: &TxCommitment) -> bool {
        self.proposals.remove(commitment).is_some()
    }

    /// All live proposals
    pub fn list(&self) -> Vec<StoredProposal> {
        self.proposals
            .iter()
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.clone())
            .collect()
    }

    /// Number of stored proposals, expired included
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Drop expired proposals, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let expired: Vec<TxCommitment> = self
            .proposals
            .iter()
            .filter(|entry| self.is_expired(entry))
            .map(|entry| entry.commitment)
            .collect();
        let count = expired.len();
        for commitment in expired {
            self.proposals.remove(&commitment);
        }
        if count > 0 {
            tracing::debug!(count, "expired proposals removed");
        }
        count
    }

    fn is_expired(&self, proposal: &StoredProposal) -> bool {
        Utc::now() - proposal.created_at > self.ttl
    }
}
