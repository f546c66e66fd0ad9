//! Randomized property tests for the digest engine and codec
//!
//! Commitments must be deterministic and sensitive to every field, and
//! signatures must recover to their producer for arbitrary digests.

use alloy_primitives::{Address, U256};
use rand::{Rng, RngCore};
use safe_wallet_core::types::Operation;
use safe_wallet_core::{
    compute_commitment, recover_from_bytes, DigestSigner, DomainSeparator, LocalSigner,
    SafeTransaction,
};

fn random_address(rng: &mut impl RngCore) -> Address {
    let mut bytes = [0u8; 20];
    rng.fill_bytes(&mut bytes);
    Address::from_slice(&bytes)
}

fn random_tx(rng: &mut impl RngCore) -> SafeTransaction {
    let len = (rng.next_u32() % 200) as usize;
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    SafeTransaction {
        to: random_address(rng),
        value: U256::from(rng.next_u64()),
        data,
        operation: if rng.gen_bool(0.5) {
            Operation::Call
        } else {
            Operation::DelegateCall
        },
        nonce: rng.next_u64() % 1000,
    }
}

#[test]
fn fuzz_commitment_determinism() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let domain = DomainSeparator::new(rng.next_u64() % 100_000, random_address(&mut rng));
        let tx = random_tx(&mut rng);
        assert_eq!(
            compute_commitment(&domain, &tx),
            compute_commitment(&domain, &tx)
        );
    }
}

#[test]
fn fuzz_commitment_field_sensitivity() {
    let mut rng = rand::thread_rng();
    let domain = DomainSeparator::new(1, Address::from_slice(&[0x01; 20]));

    for _ in 0..100 {
        let tx = random_tx(&mut rng);
        let base = compute_commitment(&domain, &tx);

        let mut nonce_bumped = tx.clone();
        nonce_bumped.nonce += 1;
        assert_ne!(base, compute_commitment(&domain, &nonce_bumped));

        let mut value_bumped = tx.clone();
        value_bumped.value += U256::from(1u64);
        assert_ne!(base, compute_commitment(&domain, &value_bumped));

        let mut data_extended = tx.clone();
        data_extended.data.push(0xff);
        assert_ne!(base, compute_commitment(&domain, &data_extended));

        let mut retargeted = tx.clone();
        retargeted.to = random_address(&mut rng);
        if retargeted.to != tx.to {
            assert_ne!(base, compute_commitment(&domain, &retargeted));
        }
    }
}

#[test]
fn fuzz_sign_recover_round_trip() {
    let mut rng = rand::thread_rng();
    let signers: Vec<LocalSigner> = (0..4).map(|_| LocalSigner::random()).collect();

    for i in 0..100 {
        let mut digest = [0u8; 32];
        rng.fill_bytes(&mut digest);

        let signer = &signers[i % signers.len()];
        let signature = signer.sign_digest(&digest).unwrap();

        let bytes = if rng.gen_bool(0.5) {
            signature.to_offset_bytes()
        } else {
            signature.to_raw_bytes()
        };
        let (recovered, _) = recover_from_bytes(&digest, &bytes).unwrap();
        assert_eq!(recovered, signer.address());
    }
}
