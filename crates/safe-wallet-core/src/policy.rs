//! Allowance policy engine
//!
//! Local, advisory evaluation of autonomous pulls against a delegate's
//! allowance state. The binding enforcement lives on the ledger; this
//! engine mirrors the ledger's reset-window arithmetic so the process
//! never pays for a submission it already knows will fail, and so denials
//! come with a clear reason. A denial here is final: it is never weakened
//! into a submission "just to see".

use crate::types::AllowanceState;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a local transfer evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TransferDecision {
    /// Pull is permitted; `remaining` is the post-transfer headroom
    Allow { remaining: u128 },
    /// Pull is denied with a reason; never retried, never bypassed
    Deny(DenyReason),
}

impl TransferDecision {
    /// Check if the decision permits the transfer
    pub fn is_allowed(&self) -> bool {
        matches!(self, TransferDecision::Allow { .. })
    }

    /// Convert a denial into its engine error; allowed decisions pass
    pub fn into_result(self) -> Result<u128> {
        match self {
            TransferDecision::Allow { remaining } => Ok(remaining),
            TransferDecision::Deny(reason) => Err(reason.into_error()),
        }
    }
}

/// Why a transfer was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// Requested amount exceeds what is left in the current window
    InsufficientAllowance { requested: u128, remaining: u128 },
    /// Identity is not in the registered delegate set
    NotADelegate { delegate: Address },
}

impl DenyReason {
    /// Lift into the engine error taxonomy
    pub fn into_error(self) -> Error {
        match self {
            DenyReason::InsufficientAllowance {
                requested,
                remaining,
            } => Error::InsufficientAllowance {
                requested,
                remaining,
            },
            DenyReason::NotADelegate { delegate } => Error::NotADelegate(delegate),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::InsufficientAllowance {
                requested,
                remaining,
            } => write!(
                f,
                "insufficient allowance: requested {}, remaining {}",
                requested, remaining
            ),
            DenyReason::NotADelegate { delegate } => {
                write!(f, "{} is not a registered delegate", delegate)
            }
        }
    }
}

impl AllowanceState {
    /// A reset is due once the full interval has elapsed since the last
    /// reset. Computed as `last + interval`, never wall-clock modulo, so a
    /// pull near a boundary can never trigger an early reset.
    pub fn reset_due(&self, now_min: u64) -> bool {
        self.reset_interval_min > 0
            && now_min >= self.last_reset_min.saturating_add(self.reset_interval_min as u64)
    }

    /// Spent amount as the ledger will see it at `now_min`. When a reset
    /// is due the counter is treated as zero locally; stored state is
    /// never mutated, the ledger alone performs the actual reset.
    pub fn effective_spent(&self, now_min: u64) -> u128 {
        if self.reset_due(now_min) {
            0
        } else {
            self.spent
        }
    }

    /// Amount still pullable in the current window
    pub fn remaining(&self, now_min: u64) -> u128 {
        self.amount.saturating_sub(self.effective_spent(now_min))
    }
}

/// Decide whether an autonomous pull is permitted.
///
/// `is_delegate` reflects the registered delegate set read from the
/// ledger; `now_min` is minutes since epoch. No signature is involved
/// anywhere on this path: the security boundary is ledger enforcement
/// only, so no client-side throttling is layered on top.
pub fn decide_transfer(
    state: &AllowanceState,
    delegate: Address,
    is_delegate: bool,
    requested: u128,
    now_min: u64,
) -> TransferDecision {
    if !is_delegate {
        return TransferDecision::Deny(DenyReason::NotADelegate { delegate });
    }

    let remaining = state.remaining(now_min);
    if requested > remaining {
        return TransferDecision::Deny(DenyReason::InsufficientAllowance {
            requested,
            remaining,
        });
    }

    TransferDecision::Allow {
        remaining: remaining - requested,
    }
}

/// Current time in minutes since epoch
pub fn now_minutes() -> u64 {
    (chrono::Utc::now().timestamp() / 60) as u64
}
