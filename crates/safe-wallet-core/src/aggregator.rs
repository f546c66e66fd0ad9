//! Signature aggregation for pending proposals
//!
//! Collects co-signer signatures keyed by commitment until the on-chain
//! threshold is satisfied. Signatures are deterministic per signer per
//! commitment, so re-adding replaces rather than double-counts, and
//! concurrent additions from independent processes resolve last-writer-wins
//! per `(commitment, signer)` pair. The threshold itself is always supplied
//! by the caller from a fresh ledger read, since an administrative
//! operation may have changed it since the proposal was created.

use crate::codec::{recover_from_bytes, recover_signer, signature_blob};
use crate::digest::{compute_commitment, DomainSeparator};
use crate::signer::DigestSigner;
use crate::types::{OwnerSet, SafeTransaction, Signature, TxCommitment};
use crate::{Error, Result};
use alloy_primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A proposal accumulating signatures toward the threshold.
///
/// Created when the first party proposes the transaction; terminal once
/// submitted and confirmed (removed) or superseded by another transaction
/// at the same nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingProposal {
    /// Aggregation key
    pub commitment: TxCommitment,
    /// The canonical transaction being authorized
    pub tx: SafeTransaction,
    /// Collected `(signer, signature)` pairs in collection order
    pub signatures: Vec<(Address, Signature)>,
    /// Creation timestamp, Unix seconds
    pub created_at: i64,
}

impl PendingProposal {
    /// Create an empty proposal for a transaction
    pub fn new(commitment: TxCommitment, tx: SafeTransaction) -> Self {
        Self {
            commitment,
            tx,
            signatures: Vec::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Number of distinct signers collected so far
    pub fn signer_count(&self) -> usize {
        self.signatures.len()
    }

    /// Identities that have signed
    pub fn signers(&self) -> Vec<Address> {
        self.signatures.iter().map(|(signer, _)| *signer).collect()
    }

    /// Executable once distinct signer count reaches the threshold.
    /// Adding a signer can only move this from false to true; removal is
    /// not supported.
    pub fn is_executable(&self, threshold: usize) -> bool {
        threshold > 0 && self.signer_count() >= threshold
    }

    /// Deterministic concatenated encoding for on-chain verification
    pub fn signature_blob(&self) -> Vec<u8> {
        signature_blob(&self.signatures)
    }
}

/// Snapshot returned after a signature is recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalState {
    /// The proposal's commitment
    pub commitment: TxCommitment,
    /// Distinct signers collected
    pub collected: usize,
    /// Their identities
    pub signers: Vec<Address>,
}

/// Storage contract for pending proposals.
///
/// The default implementation is in-memory; any persistent store can be
/// substituted without changing the aggregation contract.
pub trait ProposalStore: Send + Sync {
    /// Fetch a proposal by commitment
    fn get(&self, commitment: &TxCommitment) -> Option<PendingProposal>;

    /// Insert a proposal; an existing proposal for the same commitment
    /// (with its collected signatures) is kept as-is.
    fn insert_if_absent(&self, proposal: PendingProposal);

    /// Record a signature atomically, replacing any prior signature from
    /// the same signer.
    fn add_signature(
        &self,
        commitment: &TxCommitment,
        signer: Address,
        signature: Signature,
    ) -> Result<ProposalState>;

    /// Discard a terminal proposal
    fn remove(&self, commitment: &TxCommitment) -> Option<PendingProposal>;

    /// All pending proposals
    fn list(&self) -> Vec<PendingProposal>;
}

/// Concurrent in-memory proposal store
#[derive(Debug, Default)]
pub struct MemoryProposalStore {
    proposals: DashMap<TxCommitment, PendingProposal>,
}

impl MemoryProposalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProposalStore for MemoryProposalStore {
    fn get(&self, commitment: &TxCommitment) -> Option<PendingProposal> {
        self.proposals.get(commitment).map(|entry| entry.clone())
    }

    fn insert_if_absent(&self, proposal: PendingProposal) {
        self.proposals
            .entry(proposal.commitment)
            .or_insert(proposal);
    }

    fn add_signature(
        &self,
        commitment: &TxCommitment,
        signer: Address,
        signature: Signature,
    ) -> Result<ProposalState> {
        // The shard lock held by `get_mut` makes replace-or-push atomic;
        // concurrent signers cannot lose each other's updates.
        let mut entry = self
            .proposals
            .get_mut(commitment)
            .ok_or_else(|| Error::UnknownCommitment(commitment.to_string()))?;

        match entry
            .signatures
            .iter_mut()
            .find(|(existing, _)| *existing == signer)
        {
            Some((_, slot)) => *slot = signature,
            None => entry.signatures.push((signer, signature)),
        }

        Ok(ProposalState {
            commitment: *commitment,
            collected: entry.signer_count(),
            signers: entry.signers(),
        })
    }

    fn remove(&self, commitment: &TxCommitment) -> Option<PendingProposal> {
        self.proposals.remove(commitment).map(|(_, p)| p)
    }

    fn list(&self) -> Vec<PendingProposal> {
        self.proposals.iter().map(|entry| entry.clone()).collect()
    }
}

/// Aggregates co-signer signatures per commitment
#[derive(Clone)]
pub struct SignatureAggregator {
    store: Arc<dyn ProposalStore>,
}

impl SignatureAggregator {
    /// Create over an explicit store
    pub fn new(store: Arc<dyn ProposalStore>) -> Self {
        Self { store }
    }

    /// Create with the in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryProposalStore::new()))
    }

    /// Register a transaction and return its commitment. Idempotent: a
    /// proposal already tracked for the same commitment keeps its
    /// collected signatures.
    pub fn propose(&self, domain: &DomainSeparator, tx: SafeTransaction) -> TxCommitment {
        let commitment = compute_commitment(domain, &tx);
        self.store
            .insert_if_absent(PendingProposal::new(commitment, tx));
        tracing::debug!(%commitment, "proposal registered");
        commitment
    }

    /// Sign a pending proposal's commitment and record the signature
    pub fn sign(&self, commitment: &TxCommitment, signer: &dyn DigestSigner) -> Result<ProposalState> {
        // Existence check first so the custody collaborator is never asked
        // to sign a digest the engine does not track.
        if self.store.get(commitment).is_none() {
            return Err(Error::UnknownCommitment(commitment.to_string()));
        }
        let signature = signer.sign_digest(commitment.as_bytes())?;
        self.add_signature(commitment, signer.address(), signature)
    }

    /// Record a signature after verifying it recovers to the claimed
    /// signer. Duplicate `(commitment, signer)` pairs replace.
    pub fn add_signature(
        &self,
        commitment: &TxCommitment,
        signer: Address,
        signature: Signature,
    ) -> Result<ProposalState> {
        let recovered = recover_signer(commitment.as_bytes(), &signature)?;
        if recovered != signer {
            return Err(Error::VerificationFailed(format!(
                "signature recovers to {}, claimed {}",
                recovered, signer
            )));
        }
        self.store.add_signature(commitment, signer, signature)
    }

    /// Ingest a 65-byte signature from the untrusted relay. The signer is
    /// taken from recovery, never from the relay's claim.
    pub fn add_unverified(
        &self,
        commitment: &TxCommitment,
        bytes: &[u8],
    ) -> Result<(Address, ProposalState)> {
        let (signer, signature) = recover_from_bytes(commitment.as_bytes(), bytes)?;
        let state = self.store.add_signature(commitment, signer, signature)?;
        Ok((signer, state))
    }

    /// Whether the proposal can be submitted under the threshold read
    /// from the ledger at evaluation time
    pub fn is_executable(&self, commitment: &TxCommitment, threshold: usize) -> Result<bool> {
        let proposal = self.get(commitment)?;
        Ok(proposal.is_executable(threshold))
    }

    /// Owners that have not signed yet
    pub fn missing_signers(
        &self,
        commitment: &TxCommitment,
        owners: &OwnerSet,
    ) -> Result<Vec<Address>> {
        let proposal = self.get(commitment)?;
        let signed = proposal.signers();
        Ok(owners
            .owners
            .iter()
            .filter(|owner| !signed.contains(owner))
            .copied()
            .collect())
    }

    /// Transaction plus deterministic signature blob, ready to submit.
    /// Fails with `ThresholdNotMet` when the proposal is not executable.
    pub fn executable_payload(
        &self,
        commitment: &TxCommitment,
        threshold: usize,
    ) -> Result<(SafeTransaction, Vec<u8>)> {
        let proposal = self.get(commitment)?;
        if !proposal.is_executable(threshold) {
            return Err(Error::ThresholdNotMet {
                required: threshold,
                actual: proposal.signer_count(),
            });
        }
        Ok((proposal.tx.clone(), proposal.signature_blob()))
    }

    /// Fetch a tracked proposal
    pub fn get(&self, commitment: &TxCommitment) -> Result<PendingProposal> {
        self.store
            .get(commitment)
            .ok_or_else(|| Error::UnknownCommitment(commitment.to_string()))
    }

    /// Discard a proposal once submitted and confirmed, or superseded
    pub fn discard(&self, commitment: &TxCommitment) -> Option<PendingProposal> {
        self.store.remove(commitment)
    }

    /// All pending proposals
    pub fn pending(&self) -> Vec<PendingProposal> {
        self.store.list()
    }
}
