//! Core types for the co-signed agent vault engine
//!
//! This module defines the canonical transaction representation, the
//! commitment newtype used as the aggregation key, signatures in the
//! on-chain `r || s || v` shape, and the closed set of administrative
//! operations the sequencer knows how to build.

use crate::abi;
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest amount representable in the ledger's 96-bit allowance slots
pub const MAX_ALLOWANCE_AMOUNT: u128 = (1 << 96) - 1;

/// How a transaction's payload is executed by the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Plain call from the account to the target
    Call,
    /// Context-preserving delegated call
    DelegateCall,
}

impl Operation {
    /// On-chain encoding of the operation kind
    pub fn as_u8(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

/// Canonical transaction, immutable once constructed.
///
/// Uniquely identifies one intended state change at one specific nonce.
/// Execution-fee parameters are fixed at zero in this system and the two
/// fee-routing addresses at the zero address; they appear only inside the
/// commitment hash, never as configurable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeTransaction {
    /// Target address
    pub to: Address,
    /// Native value moved with the call
    pub value: U256,
    /// Opaque call payload
    #[serde(with = "bytes_hex")]
    pub data: Vec<u8>,
    /// Call vs. delegated call
    pub operation: Operation,
    /// Commitment-scope nonce of the account
    pub nonce: u64,
}

impl SafeTransaction {
    /// Create a plain call transaction
    pub fn call(to: Address, value: U256, data: Vec<u8>, nonce: u64) -> Self {
        Self {
            to,
            value,
            data,
            operation: Operation::Call,
            nonce,
        }
    }
}

/// Hex serde for opaque byte payloads
pub(crate) mod bytes_hex {
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

/// Fixed-size commitment uniquely identifying one proposed state change
/// at one nonce. Primary key for signature aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxCommitment(#[serde(with = "commitment_hex")] pub [u8; 32]);

impl TxCommitment {
    /// Raw digest bytes handed to the key-custody collaborator
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a `0x`-prefixed or bare hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Encoding("commitment must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for TxCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

mod commitment_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// ECDSA signature in the on-chain `r || s || v` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery parameter (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }
}

/// On-chain owner set together with the required signature count.
///
/// Mutated only through successfully executed administrative transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSet {
    /// Ordered owner identities
    pub owners: Vec<Address>,
    /// Required distinct signature count
    pub threshold: usize,
}

impl OwnerSet {
    /// Check whether an identity is an owner
    pub fn contains(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }
}

/// Per-(delegate, asset) allowance tuple as held by the ledger.
///
/// Owned and mutated exclusively by the ledger; the engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceState {
    /// Granted amount per reset window (96-bit on chain)
    pub amount: u128,
    /// Amount spent in the current window
    pub spent: u128,
    /// Reset interval in minutes
    pub reset_interval_min: u32,
    /// Last reset timestamp, minutes since epoch
    pub last_reset_min: u64,
    /// Monotonic usage nonce
    pub usage_nonce: u64,
}

/// Closed set of administrative operations.
///
/// Each variant carries only its required fields; the sequencer never
/// infers intent from textual command names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdminOp {
    /// Activate the allowance module on the account
    ModuleActivation { module: Address },
    /// Register an identity as a constrained delegate
    DelegateRegistration { module: Address, delegate: Address },
    /// Grant or replace a per-asset allowance for a delegate
    AllowanceUpdate {
        module: Address,
        delegate: Address,
        token: Address,
        amount: u128,
        reset_interval_min: u16,
    },
    /// Change the account's required signature count
    ThresholdChange { threshold: usize },
}

impl AdminOp {
    /// Short human-readable label used in step reports and errors
    pub fn label(&self) -> &'static str {
        match self {
            AdminOp::ModuleActivation { .. } => "enable-module",
            AdminOp::DelegateRegistration { .. } => "register-delegate",
            AdminOp::AllowanceUpdate { .. } => "set-allowance",
            AdminOp::ThresholdChange { .. } => "change-threshold",
        }
    }

    /// Build the canonical transaction for this operation at the given
    /// account nonce. Module-targeted operations call the module contract;
    /// account-targeted operations call the account itself.
    pub fn into_transaction(self, account: Address, nonce: u64) -> Result<SafeTransaction> {
        let (to, data) = match self {
            AdminOp::ModuleActivation { module } => (account, abi::encode_enable_module(module)),
            AdminOp::DelegateRegistration { module, delegate } => {
                (module, abi::encode_add_delegate(delegate))
            }
            AdminOp::AllowanceUpdate {
                module,
                delegate,
                token,
                amount,
                reset_interval_min,
            } => {
                if amount > MAX_ALLOWANCE_AMOUNT {
                    return Err(Error::Encoding(format!(
                        "allowance amount {} exceeds 96 bits",
                        amount
                    )));
                }
                (
                    module,
                    abi::encode_set_allowance(delegate, token, amount, reset_interval_min),
                )
            }
            AdminOp::ThresholdChange { threshold } => {
                (account, abi::encode_change_threshold(threshold))
            }
        };
        Ok(SafeTransaction::call(to, U256::ZERO, data, nonce))
    }
}
