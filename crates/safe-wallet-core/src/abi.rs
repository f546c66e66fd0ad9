//! Call encoding for the account and allowance-module contracts
//!
//! Hand-rolled ABI packing for the fixed set of calls this engine makes.
//! Selectors are `keccak256(signature)[..4]` of the canonical Solidity
//! signatures and must never change.

use crate::types::SafeTransaction;
use crate::{Error, Result};
use alloy_primitives::{Address, U256};

// Account contract
pub const SEL_EXEC_TRANSACTION: [u8; 4] = [0x6a, 0x76, 0x12, 0x02];
pub const SEL_ENABLE_MODULE: [u8; 4] = [0x61, 0x0b, 0x59, 0x25];
pub const SEL_IS_MODULE_ENABLED: [u8; 4] = [0x2d, 0x9a, 0xd5, 0x3d];
pub const SEL_GET_OWNERS: [u8; 4] = [0xa0, 0xe6, 0x7e, 0x2b];
pub const SEL_GET_THRESHOLD: [u8; 4] = [0xe7, 0x52, 0x35, 0xb8];
pub const SEL_NONCE: [u8; 4] = [0xaf, 0xfe, 0xd0, 0xe0];
pub const SEL_CHANGE_THRESHOLD: [u8; 4] = [0x69, 0x4e, 0x80, 0xc3];

// Allowance module
pub const SEL_ADD_DELEGATE: [u8; 4] = [0xe7, 0x1b, 0xdf, 0x41];
pub const SEL_SET_ALLOWANCE: [u8; 4] = [0xbe, 0xae, 0xb3, 0x88];
pub const SEL_GET_TOKEN_ALLOWANCE: [u8; 4] = [0x94, 0xb3, 0x1f, 0xbd];
pub const SEL_GET_DELEGATES: [u8; 4] = [0xeb, 0x37, 0xab, 0xe0];
pub const SEL_EXECUTE_ALLOWANCE_TRANSFER: [u8; 4] = [0x45, 0x15, 0x64, 0x1a];

// ERC-20
pub const SEL_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Left-pad an address into a 32-byte word
fn word_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

fn word_u256(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

fn word_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Append dynamic bytes as `length || data` padded to a word boundary
fn push_bytes_tail(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&word_u64(data.len() as u64));
    out.extend_from_slice(data);
    let padding = (32 - (data.len() % 32)) % 32;
    out.extend_from_slice(&vec![0u8; padding]);
}

fn padded_len(data: &[u8]) -> usize {
    32 + data.len() + (32 - (data.len() % 32)) % 32
}

pub fn encode_enable_module(module: Address) -> Vec<u8> {
    let mut out = SEL_ENABLE_MODULE.to_vec();
    out.extend_from_slice(&word_address(module));
    out
}

pub fn encode_is_module_enabled(module: Address) -> Vec<u8> {
    let mut out = SEL_IS_MODULE_ENABLED.to_vec();
    out.extend_from_slice(&word_address(module));
    out
}

pub fn encode_change_threshold(threshold: usize) -> Vec<u8> {
    let mut out = SEL_CHANGE_THRESHOLD.to_vec();
    out.extend_from_slice(&word_u64(threshold as u64));
    out
}

pub fn encode_add_delegate(delegate: Address) -> Vec<u8> {
    let mut out = SEL_ADD_DELEGATE.to_vec();
    out.extend_from_slice(&word_address(delegate));
    out
}

/// `setAllowance(address delegate, address token, uint96 amount,
/// uint16 resetTimeMin, uint32 resetBaseMin)`. The reset base is always
/// zero so the window anchors at the first pull.
pub fn encode_set_allowance(
    delegate: Address,
    token: Address,
    amount: u128,
    reset_interval_min: u16,
) -> Vec<u8> {
    let mut out = SEL_SET_ALLOWANCE.to_vec();
    out.extend_from_slice(&word_address(delegate));
    out.extend_from_slice(&word_address(token));
    out.extend_from_slice(&word_u128(amount));
    out.extend_from_slice(&word_u64(reset_interval_min as u64));
    out.extend_from_slice(&word_u64(0));
    out
}

pub fn encode_get_token_allowance(account: Address, delegate: Address, token: Address) -> Vec<u8> {
    let mut out = SEL_GET_TOKEN_ALLOWANCE.to_vec();
    out.extend_from_slice(&word_address(account));
    out.extend_from_slice(&word_address(delegate));
    out.extend_from_slice(&word_address(token));
    out
}

pub fn encode_get_delegates(account: Address, start: u64, page_size: u8) -> Vec<u8> {
    let mut out = SEL_GET_DELEGATES.to_vec();
    out.extend_from_slice(&word_address(account));
    out.extend_from_slice(&word_u64(start));
    out.extend_from_slice(&word_u64(page_size as u64));
    out
}

pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    let mut out = SEL_BALANCE_OF.to_vec();
    out.extend_from_slice(&word_address(owner));
    out
}

/// `execTransaction(address to, uint256 value, bytes data, uint8 operation,
/// uint256 safeTxGas, uint256 baseGas, uint256 gasPrice, address gasToken,
/// address refundReceiver, bytes signatures)`
///
/// Fee fields are fixed at zero and fee routing at the zero address,
/// matching the commitment the co-signers hashed.
pub fn encode_exec_transaction(tx: &SafeTransaction, signatures: &[u8]) -> Vec<u8> {
    let mut out = SEL_EXEC_TRANSACTION.to_vec();

    // Ten head slots; `data` tail starts right after the head.
    let data_offset = 10 * 32;
    let sigs_offset = data_offset + padded_len(&tx.data);

    out.extend_from_slice(&word_address(tx.to));
    out.extend_from_slice(&word_u256(tx.value));
    out.extend_from_slice(&word_u64(data_offset as u64));
    out.extend_from_slice(&word_u64(tx.operation.as_u8() as u64));
    out.extend_from_slice(&word_u256(U256::ZERO)); // safeTxGas
    out.extend_from_slice(&word_u256(U256::ZERO)); // baseGas
    out.extend_from_slice(&word_u256(U256::ZERO)); // gasPrice
    out.extend_from_slice(&word_address(Address::ZERO)); // gasToken
    out.extend_from_slice(&word_address(Address::ZERO)); // refundReceiver
    out.extend_from_slice(&word_u64(sigs_offset as u64));

    push_bytes_tail(&mut out, &tx.data);
    push_bytes_tail(&mut out, signatures);
    out
}

/// `executeAllowanceTransfer(address safe, address token, address payable to,
/// uint96 amount, address paymentToken, uint96 payment, address delegate,
/// bytes signature)`
///
/// The signature is empty: authorization rests entirely on the ledger's own
/// caller check against the registered delegate.
pub fn encode_execute_allowance_transfer(
    account: Address,
    token: Address,
    to: Address,
    amount: u128,
    delegate: Address,
) -> Vec<u8> {
    let mut out = SEL_EXECUTE_ALLOWANCE_TRANSFER.to_vec();

    let sig_offset = 8 * 32;
    out.extend_from_slice(&word_address(account));
    out.extend_from_slice(&word_address(token));
    out.extend_from_slice(&word_address(to));
    out.extend_from_slice(&word_u128(amount));
    out.extend_from_slice(&word_address(Address::ZERO)); // paymentToken
    out.extend_from_slice(&word_u128(0)); // payment
    out.extend_from_slice(&word_address(delegate));
    out.extend_from_slice(&word_u64(sig_offset as u64));
    push_bytes_tail(&mut out, &[]);
    out
}

// ============================================================================
// Return-data decoding
// ============================================================================

fn word_at<'a>(data: &'a [u8], index: usize) -> Result<&'a [u8]> {
    let start = index * 32;
    data.get(start..start + 32)
        .ok_or_else(|| Error::ChainError(format!("return data too short at word {}", index)))
}

pub fn decode_u256(data: &[u8]) -> Result<U256> {
    Ok(U256::from_be_slice(word_at(data, 0)?))
}

pub fn decode_u64(data: &[u8]) -> Result<u64> {
    let value = decode_u256(data)?;
    u64::try_from(value).map_err(|_| Error::ChainError("value exceeds u64".into()))
}

pub fn decode_bool(data: &[u8]) -> Result<bool> {
    Ok(word_at(data, 0)?.iter().any(|b| *b != 0))
}

fn address_from_word(word: &[u8]) -> Address {
    Address::from_slice(&word[12..])
}

fn u128_from_word(word: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..]);
    u128::from_be_bytes(buf)
}

fn u64_from_word(word: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    u64::from_be_bytes(buf)
}

/// Decode a dynamic `address[]` return value
pub fn decode_address_array(data: &[u8]) -> Result<Vec<Address>> {
    let offset = decode_u64(word_at(data, 0)?)? as usize;
    let len_word = data
        .get(offset..offset + 32)
        .ok_or_else(|| Error::ChainError("array offset out of range".into()))?;
    let len = u64_from_word(len_word) as usize;

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let start = offset + 32 + i * 32;
        let word = data
            .get(start..start + 32)
            .ok_or_else(|| Error::ChainError("array element out of range".into()))?;
        out.push(address_from_word(word));
    }
    Ok(out)
}

/// Decode the `(address[] results, uint48 next)` page from `getDelegates`
pub fn decode_delegates_page(data: &[u8]) -> Result<(Vec<Address>, u64)> {
    let next = u64_from_word(word_at(data, 1)?);
    let delegates = decode_address_array(data)?;
    Ok((delegates, next))
}

/// Decode the five-word `getTokenAllowance` tuple:
/// `{amount u96, spent u96, resetTimeMin u16, lastResetMin u32, nonce u16}`
pub fn decode_allowance(data: &[u8]) -> Result<crate::types::AllowanceState> {
    Ok(crate::types::AllowanceState {
        amount: u128_from_word(word_at(data, 0)?),
        spent: u128_from_word(word_at(data, 1)?),
        reset_interval_min: u64_from_word(word_at(data, 2)?) as u32,
        last_reset_min: u64_from_word(word_at(data, 3)?),
        usage_nonce: u64_from_word(word_at(data, 4)?),
    })
}
