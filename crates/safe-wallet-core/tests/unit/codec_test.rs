//! Unit tests for the signature codec
//!
//! These verify:
//! - Offset and raw recovery-byte conventions
//! - Recovery over the raw digest for both conventions
//! - Deterministic, address-ordered signature blobs

use alloy_primitives::Address;
use safe_wallet_core::{
    recover_from_bytes, recover_signer, signature_blob, DigestSigner, LocalSigner, Signature,
    ETH_SIGN_V_OFFSET,
};

#[test]
fn test_offset_constant() {
    assert_eq!(ETH_SIGN_V_OFFSET, 4);
}

#[test]
fn test_both_conventions_recover_same_signer() {
    let signer = LocalSigner::random();
    let digest = [0x5au8; 32];
    let sig = signer.sign_digest(&digest).unwrap();

    let (from_offset, _) = recover_from_bytes(&digest, &sig.to_offset_bytes()).unwrap();
    let (from_raw, _) = recover_from_bytes(&digest, &sig.to_raw_bytes()).unwrap();
    assert_eq!(from_offset, signer.address());
    assert_eq!(from_raw, signer.address());
}

#[test]
fn test_recovery_byte_values() {
    let sig = Signature::new([0x01; 32], [0x02; 32], 0);
    assert_eq!(sig.to_raw_bytes()[64], 27);
    assert_eq!(sig.to_offset_bytes()[64], 31);

    let sig = Signature::new([0x01; 32], [0x02; 32], 1);
    assert_eq!(sig.to_raw_bytes()[64], 28);
    assert_eq!(sig.to_offset_bytes()[64], 32);
}

#[test]
fn test_rejects_malformed_inputs() {
    assert!(Signature::from_bytes(&[0u8; 64]).is_err());
    assert!(Signature::from_bytes(&[0u8; 66]).is_err());

    let mut bad_v = [0x11u8; 65];
    bad_v[64] = 29;
    assert!(Signature::from_bytes(&bad_v).is_err());
    bad_v[64] = 30;
    assert!(Signature::from_bytes(&bad_v).is_err());
    bad_v[64] = 35;
    assert!(Signature::from_bytes(&bad_v).is_err());
}

#[test]
fn test_wrong_digest_recovers_different_signer() {
    let signer = LocalSigner::random();
    let sig = signer.sign_digest(&[0x01u8; 32]).unwrap();

    match recover_signer(&[0x02u8; 32], &sig) {
        Ok(address) => assert_ne!(address, signer.address()),
        Err(_) => {}
    }
}

#[test]
fn test_blob_is_ascending_and_deterministic() {
    let signers: Vec<LocalSigner> = (0..4).map(|_| LocalSigner::random()).collect();
    let digest = [0x33u8; 32];

    let mut pairs: Vec<(Address, Signature)> = signers
        .iter()
        .map(|s| (s.address(), s.sign_digest(&digest).unwrap()))
        .collect();

    let blob = signature_blob(&pairs);
    assert_eq!(blob.len(), 65 * pairs.len());

    // same blob regardless of collection order
    pairs.reverse();
    assert_eq!(signature_blob(&pairs), blob);

    // recovered signers come out in strictly ascending address order
    let mut previous: Option<Address> = None;
    for chunk in blob.chunks(65) {
        let (address, _) = recover_from_bytes(&digest, chunk).unwrap();
        if let Some(prev) = previous {
            assert!(prev < address, "blob not sorted ascending");
        }
        previous = Some(address);
    }
}

#[test]
fn test_blob_uses_offset_convention() {
    let signer = LocalSigner::random();
    let digest = [0x44u8; 32];
    let sig = signer.sign_digest(&digest).unwrap();

    let blob = signature_blob(&[(signer.address(), sig)]);
    assert!(blob[64] == 31 || blob[64] == 32);
}
