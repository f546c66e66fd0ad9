//! End-to-end tests for the multi-owner proposal flow
//!
//! Two owners independently sign the same commitment; the transaction
//! submits only once the live threshold is met, and the mock verifies the
//! blob exactly like the on-chain contract (ordering, ownership, count).

use super::MockLedger;
use alloy_primitives::{Address, U256};
use safe_wallet_core::{
    AdminOp, DigestSigner, DomainSeparator, Error, LocalSigner, Reconciler, SafeLedger,
    SafeTransaction, SignatureAggregator, WalletConfig,
};
use std::sync::Arc;

const CHAIN_ID: u64 = 11155111;

fn account() -> Address {
    Address::from_slice(&[0xaa; 20])
}

fn domain() -> DomainSeparator {
    DomainSeparator::new(CHAIN_ID, account())
}

fn two_owner_setup() -> (Arc<MockLedger>, LocalSigner, LocalSigner) {
    let alice = LocalSigner::random();
    let bob = LocalSigner::random();
    let ledger = Arc::new(MockLedger::new(
        CHAIN_ID,
        account(),
        vec![alice.address(), bob.address()],
        2,
    ));
    (ledger, alice, bob)
}

#[tokio::test]
async fn test_threshold_change_needs_both_owners() {
    let (ledger, alice, bob) = two_owner_setup();
    let aggregator = SignatureAggregator::in_memory();

    let nonce = ledger.account_nonce(account()).await.unwrap();
    let tx = AdminOp::ThresholdChange { threshold: 1 }
        .into_transaction(account(), nonce)
        .unwrap();
    let commitment = aggregator.propose(&domain(), tx);

    aggregator.sign(&commitment, &alice).unwrap();
    let threshold = ledger.threshold(account()).await.unwrap();
    assert!(matches!(
        aggregator.executable_payload(&commitment, threshold),
        Err(Error::ThresholdNotMet {
            required: 2,
            actual: 1
        })
    ));

    aggregator.sign(&commitment, &bob).unwrap();
    let (tx, blob) = aggregator.executable_payload(&commitment, threshold).unwrap();
    assert_eq!(blob.len(), 130);

    let outcome = ledger.submit_execution(account(), &tx, &blob).await.unwrap();
    assert!(outcome.success);
    assert_eq!(ledger.threshold(account()).await.unwrap(), 1);
    assert_eq!(ledger.account_nonce(account()).await.unwrap(), 1);

    aggregator.discard(&commitment);
}

#[tokio::test]
async fn test_single_signature_rejected_on_chain() {
    // bypass the local threshold check and submit with one signature; the
    // verifier must revert
    let (ledger, alice, _bob) = two_owner_setup();
    let aggregator = SignatureAggregator::in_memory();

    let tx = AdminOp::ThresholdChange { threshold: 1 }
        .into_transaction(account(), 0)
        .unwrap();
    let commitment = aggregator.propose(&domain(), tx.clone());
    aggregator.sign(&commitment, &alice).unwrap();

    let blob = aggregator.get(&commitment).unwrap().signature_blob();
    let outcome = ledger.submit_execution(account(), &tx, &blob).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(ledger.threshold(account()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_non_owner_signature_rejected_on_chain() {
    let (ledger, alice, _bob) = two_owner_setup();
    let stranger = LocalSigner::random();
    let aggregator = SignatureAggregator::in_memory();

    let tx = AdminOp::ThresholdChange { threshold: 1 }
        .into_transaction(account(), 0)
        .unwrap();
    let commitment = aggregator.propose(&domain(), tx.clone());
    aggregator.sign(&commitment, &alice).unwrap();
    aggregator.sign(&commitment, &stranger).unwrap();

    let blob = aggregator.get(&commitment).unwrap().signature_blob();
    let outcome = ledger.submit_execution(account(), &tx, &blob).await.unwrap();
    assert!(!outcome.success);
}

#[tokio::test]
async fn test_stale_nonce_rejected_and_reported_superseded() {
    let (ledger, alice, bob) = two_owner_setup();
    let aggregator = SignatureAggregator::in_memory();

    // first proposal at nonce 0 executes
    let tx0 = AdminOp::DelegateRegistration {
        module: Address::from_slice(&[0xbb; 20]),
        delegate: Address::from_slice(&[0xd1; 20]),
    }
    .into_transaction(account(), 0)
    .unwrap();
    let c0 = aggregator.propose(&domain(), tx0);
    aggregator.sign(&c0, &alice).unwrap();
    aggregator.sign(&c0, &bob).unwrap();
    let (tx, blob) = aggregator.executable_payload(&c0, 2).unwrap();
    assert!(ledger
        .submit_execution(account(), &tx, &blob)
        .await
        .unwrap()
        .success);
    aggregator.discard(&c0);

    // a second proposal still pinned to nonce 0 is now dead
    let stale = SafeTransaction::call(
        Address::from_slice(&[0x44; 20]),
        U256::from(1u64),
        vec![],
        0,
    );
    let c1 = aggregator.propose(&domain(), stale.clone());
    aggregator.sign(&c1, &alice).unwrap();
    aggregator.sign(&c1, &bob).unwrap();

    let (tx, blob) = aggregator.executable_payload(&c1, 2).unwrap();
    let outcome = ledger.submit_execution(account(), &tx, &blob).await.unwrap();
    assert!(!outcome.success);

    // the reconciler flags it as superseded
    let config = WalletConfig::from_json(&format!(
        r#"{{
            "chain_id": {CHAIN_ID},
            "rpc_urls": ["http://localhost:8545"],
            "account": "{}",
            "module": "{}",
            "delegate": "{}",
            "allowances": [
                {{ "token": "0x0000000000000000000000000000000000000000",
                   "amount": 1, "reset_interval_min": 1440 }}
            ]
        }}"#,
        account(),
        Address::from_slice(&[0xbb; 20]),
        Address::from_slice(&[0xd1; 20]),
    ))
    .unwrap();

    let view = Reconciler::new(ledger.clone(), config)
        .snapshot(Some(&aggregator))
        .await
        .unwrap();
    assert_eq!(view.proposals.len(), 1);
    let summary = &view.proposals[0];
    assert!(summary.superseded);
    assert!(!summary.executable);
    assert_eq!(summary.collected, 2);
}

#[tokio::test]
async fn test_missing_signers_reported() {
    let (ledger, alice, bob) = two_owner_setup();
    let aggregator = SignatureAggregator::in_memory();

    let tx = SafeTransaction::call(
        Address::from_slice(&[0x44; 20]),
        U256::from(5u64),
        vec![],
        0,
    );
    let commitment = aggregator.propose(&domain(), tx);
    aggregator.sign(&commitment, &alice).unwrap();

    let owners = ledger.owner_set(account()).await.unwrap();
    let missing = aggregator.missing_signers(&commitment, &owners).unwrap();
    assert_eq!(missing, vec![bob.address()]);
}
