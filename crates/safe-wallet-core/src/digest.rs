//! Commitment computation for canonical transactions
//!
//! Binds a transaction's canonical field layout inside an account- and
//! chain-scoped domain separator via the standard two-stage structured-data
//! hash. This is the single most safety-critical piece of the engine: any
//! deviation in field order, the fixed-zero fee fields, or the payload
//! pre-hash produces a commitment the verifying contract rejects.

use crate::types::{SafeTransaction, TxCommitment};
use alloy_primitives::Address;
use tiny_keccak::{Hasher, Keccak};

/// `keccak256("EIP712Domain(uint256 chainId,address verifyingContract)")`
pub const DOMAIN_TYPEHASH: [u8; 32] = [
    0x47, 0xe7, 0x95, 0x34, 0xa2, 0x45, 0x95, 0x2e, 0x8b, 0x16, 0x89, 0x3a, 0x33, 0x6b, 0x85,
    0xa3, 0xd9, 0xea, 0x9f, 0xa8, 0xc5, 0x73, 0xf3, 0xd8, 0x03, 0xaf, 0xb9, 0x2a, 0x79, 0x46,
    0x92, 0x18,
];

/// `keccak256("SafeTx(address to,uint256 value,bytes data,uint8 operation,
/// uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,
/// address refundReceiver,uint256 nonce)")`
pub const SAFE_TX_TYPEHASH: [u8; 32] = [
    0xbb, 0x83, 0x10, 0xd4, 0x86, 0x36, 0x8d, 0xb6, 0xbd, 0x6f, 0x84, 0x94, 0x02, 0xfd, 0xd7,
    0x3a, 0xd5, 0x3d, 0x31, 0x6b, 0x5a, 0x4b, 0x26, 0x44, 0xad, 0x6e, 0xfe, 0x0f, 0x94, 0x12,
    0x86, 0xd8,
];

/// Compute Keccak-256 of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// Domain identifier binding commitments to one account on one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainSeparator([u8; 32]);

impl DomainSeparator {
    /// Derive the separator for an account address and chain id
    pub fn new(chain_id: u64, account: Address) -> Self {
        let mut preimage = Vec::with_capacity(96);
        preimage.extend_from_slice(&DOMAIN_TYPEHASH);
        preimage.extend_from_slice(&u256_word(chain_id));
        preimage.extend_from_slice(&address_word(account));
        Self(keccak256(&preimage))
    }

    /// Raw separator bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn u256_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

/// Compute the commitment for a canonical transaction under a domain.
///
/// Pure function: same inputs always yield the same commitment, and any
/// single differing field yields a different one. The payload is hashed
/// before inclusion, never embedded raw. Fee fields and fee-routing
/// addresses are fixed at zero in this system.
pub fn compute_commitment(domain: &DomainSeparator, tx: &SafeTransaction) -> TxCommitment {
    let mut encoded = Vec::with_capacity(11 * 32);
    encoded.extend_from_slice(&SAFE_TX_TYPEHASH);
    encoded.extend_from_slice(&address_word(tx.to));
    encoded.extend_from_slice(&tx.value.to_be_bytes::<32>());
    encoded.extend_from_slice(&keccak256(&tx.data));
    encoded.extend_from_slice(&u256_word(tx.operation.as_u8() as u64));
    encoded.extend_from_slice(&[0u8; 32]); // safeTxGas
    encoded.extend_from_slice(&[0u8; 32]); // baseGas
    encoded.extend_from_slice(&[0u8; 32]); // gasPrice
    encoded.extend_from_slice(&[0u8; 32]); // gasToken
    encoded.extend_from_slice(&[0u8; 32]); // refundReceiver
    encoded.extend_from_slice(&u256_word(tx.nonce));
    let struct_hash = keccak256(&encoded);

    let mut preimage = Vec::with_capacity(2 + 64);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain.as_bytes());
    preimage.extend_from_slice(&struct_hash);
    TxCommitment(keccak256(&preimage))
}
