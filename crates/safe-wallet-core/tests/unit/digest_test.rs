//! Unit tests for the digest engine
//!
//! These verify:
//! - Typehash and domain-separator fixed vectors
//! - Full commitment fixed vectors
//! - Sensitivity of the commitment to every transaction field

use alloy_primitives::{Address, U256};
use safe_wallet_core::types::Operation;
use safe_wallet_core::{abi, compute_commitment, DomainSeparator, SafeTransaction};
use std::str::FromStr;

fn test_account() -> Address {
    Address::from_str("0x742d35cc6634c0532925a3b844bc9e7595f4e123").unwrap()
}

fn test_domain() -> DomainSeparator {
    DomainSeparator::new(11155111, test_account())
}

// ============================================================================
// Fixed Vectors
// ============================================================================

#[test]
fn test_domain_separator_vector() {
    assert_eq!(
        hex::encode(test_domain().as_bytes()),
        "98439a25cbab8693eb6cc6d194c0b04d951582d5607d521a223a987adef7b426"
    );
}

#[test]
fn test_module_activation_commitment_vector() {
    let module = Address::from_str("0xcfbfac74c26f8647cbdb8c5caf80bb5b32e43134").unwrap();
    let tx = SafeTransaction::call(
        test_account(),
        U256::ZERO,
        abi::encode_enable_module(module),
        0,
    );
    let commitment = compute_commitment(&test_domain(), &tx);
    assert_eq!(
        commitment.to_string(),
        "0x9866c8e551a89784160b15023e616798b8378de85cc88ca0ef0b3157964b29a9"
    );
}

#[test]
fn test_value_transfer_commitment_vector() {
    let to = Address::from_str("0x1111111111111111111111111111111111111111").unwrap();
    let tx = SafeTransaction::call(to, U256::from(10u128.pow(18)), vec![], 7);
    let commitment = compute_commitment(&test_domain(), &tx);
    assert_eq!(
        commitment.to_string(),
        "0x3b228a70525e2a1954a41dad1efe4b01b61d7d9ebf34c7d128514f0327b83808"
    );
}

// ============================================================================
// Field Sensitivity
// ============================================================================

fn base_tx() -> SafeTransaction {
    SafeTransaction::call(
        Address::from_slice(&[0x22; 20]),
        U256::from(1000u64),
        vec![0xde, 0xad, 0xbe, 0xef],
        5,
    )
}

#[test]
fn test_commitment_is_deterministic() {
    let domain = test_domain();
    assert_eq!(
        compute_commitment(&domain, &base_tx()),
        compute_commitment(&domain, &base_tx())
    );
}

#[test]
fn test_commitment_changes_with_target() {
    let domain = test_domain();
    let base = compute_commitment(&domain, &base_tx());
    let mut tx = base_tx();
    tx.to = Address::from_slice(&[0x23; 20]);
    assert_ne!(base, compute_commitment(&domain, &tx));
}

#[test]
fn test_commitment_changes_with_value() {
    let domain = test_domain();
    let base = compute_commitment(&domain, &base_tx());
    let mut tx = base_tx();
    tx.value = U256::from(1001u64);
    assert_ne!(base, compute_commitment(&domain, &tx));
}

#[test]
fn test_commitment_changes_with_payload() {
    let domain = test_domain();
    let base = compute_commitment(&domain, &base_tx());
    let mut tx = base_tx();
    tx.data.push(0x00);
    assert_ne!(base, compute_commitment(&domain, &tx));
}

#[test]
fn test_commitment_changes_with_operation() {
    let domain = test_domain();
    let base = compute_commitment(&domain, &base_tx());
    let mut tx = base_tx();
    tx.operation = Operation::DelegateCall;
    assert_ne!(base, compute_commitment(&domain, &tx));
}

#[test]
fn test_commitment_changes_with_nonce() {
    let domain = test_domain();
    let base = compute_commitment(&domain, &base_tx());
    let mut tx = base_tx();
    tx.nonce = 6;
    assert_ne!(base, compute_commitment(&domain, &tx));
}

#[test]
fn test_commitment_changes_with_chain() {
    let tx = base_tx();
    let sepolia = compute_commitment(&DomainSeparator::new(11155111, test_account()), &tx);
    let mainnet = compute_commitment(&DomainSeparator::new(1, test_account()), &tx);
    assert_ne!(sepolia, mainnet);
}

#[test]
fn test_commitment_changes_with_account() {
    let tx = base_tx();
    let a = compute_commitment(&DomainSeparator::new(1, test_account()), &tx);
    let b = compute_commitment(
        &DomainSeparator::new(1, Address::from_slice(&[0x99; 20])),
        &tx,
    );
    assert_ne!(a, b);
}

#[test]
fn test_empty_payload_is_hashed_not_skipped() {
    // the empty payload contributes keccak256("") to the struct hash, so
    // two transactions differing only in empty-vs-one-zero-byte payload
    // must differ
    let domain = test_domain();
    let empty = SafeTransaction::call(Address::from_slice(&[0x22; 20]), U256::ZERO, vec![], 0);
    let one_zero =
        SafeTransaction::call(Address::from_slice(&[0x22; 20]), U256::ZERO, vec![0x00], 0);
    assert_ne!(
        compute_commitment(&domain, &empty),
        compute_commitment(&domain, &one_zero)
    );
}
