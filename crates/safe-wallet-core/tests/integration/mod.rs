//! Integration test support
//!
//! `MockLedger` simulates the account contract and the allowance module:
//! it verifies nonces and recovered signatures the way the on-chain
//! verifier does, applies administrative writes by decoding the calldata
//! selectors, and enforces the module's caller check and window
//! arithmetic for allowance pulls.

mod proposal_flow_test;
mod setup_flow_test;

use alloy_primitives::Address;
use async_trait::async_trait;
use safe_wallet_core::ledger::TxOutcome;
use safe_wallet_core::policy::now_minutes;
use safe_wallet_core::{
    abi, compute_commitment, recover_from_bytes, AllowanceState, DomainSeparator, Error,
    OwnerSet, Result, SafeLedger, SafeTransaction,
};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct MockState {
    pub owners: Vec<Address>,
    pub threshold: usize,
    pub nonce: u64,
    pub module_enabled: bool,
    pub delegates: Vec<Address>,
    pub allowances: HashMap<Address, AllowanceState>,
    /// Confirmed writes, both co-signed and allowance path
    pub writes: usize,
    /// Force every co-signed execution to revert
    pub force_revert: bool,
    /// Confirm writes without ever making them visible to reads,
    /// simulating a permanently lagging read replica
    pub swallow_writes: bool,
}

pub struct MockLedger {
    pub chain_id: u64,
    pub account: Address,
    pub state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(chain_id: u64, account: Address, owners: Vec<Address>, threshold: usize) -> Self {
        Self {
            chain_id,
            account,
            state: Mutex::new(MockState {
                owners,
                threshold,
                nonce: 0,
                module_enabled: false,
                delegates: vec![],
                allowances: HashMap::new(),
                writes: 0,
                force_revert: false,
                swallow_writes: false,
            }),
        }
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn word(data: &[u8], index: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        word.copy_from_slice(&data[4 + index * 32..4 + (index + 1) * 32]);
        word
    }

    fn word_address(data: &[u8], index: usize) -> Address {
        Address::from_slice(&Self::word(data, index)[12..])
    }

    fn word_u128(data: &[u8], index: usize) -> u128 {
        let word = Self::word(data, index);
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&word[16..]);
        u128::from_be_bytes(buf)
    }

    fn word_u64(data: &[u8], index: usize) -> u64 {
        let word = Self::word(data, index);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&word[24..]);
        u64::from_be_bytes(buf)
    }

    /// Apply an administrative call the way the contracts would
    fn apply(state: &mut MockState, tx: &SafeTransaction) {
        let selector: [u8; 4] = tx.data[..4].try_into().unwrap();
        match selector {
            abi::SEL_ENABLE_MODULE => {
                state.module_enabled = true;
            }
            abi::SEL_ADD_DELEGATE => {
                let delegate = Self::word_address(&tx.data, 0);
                if !state.delegates.contains(&delegate) {
                    state.delegates.push(delegate);
                }
            }
            abi::SEL_SET_ALLOWANCE => {
                let token = Self::word_address(&tx.data, 1);
                state.allowances.insert(
                    token,
                    AllowanceState {
                        amount: Self::word_u128(&tx.data, 2),
                        spent: 0,
                        reset_interval_min: Self::word_u64(&tx.data, 3) as u32,
                        last_reset_min: now_minutes(),
                        usage_nonce: 1,
                    },
                );
            }
            abi::SEL_CHANGE_THRESHOLD => {
                state.threshold = Self::word_u64(&tx.data, 0) as usize;
            }
            _ => panic!("mock ledger: unexpected selector {:02x?}", selector),
        }
    }
}

#[async_trait]
impl SafeLedger for MockLedger {
    async fn account_nonce(&self, _: Address) -> Result<u64> {
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn threshold(&self, _: Address) -> Result<usize> {
        Ok(self.state.lock().unwrap().threshold)
    }

    async fn owner_set(&self, _: Address) -> Result<OwnerSet> {
        let state = self.state.lock().unwrap();
        Ok(OwnerSet {
            owners: state.owners.clone(),
            threshold: state.threshold,
        })
    }

    async fn is_module_enabled(&self, _: Address, _: Address) -> Result<bool> {
        Ok(self.state.lock().unwrap().module_enabled)
    }

    async fn delegates(&self, _: Address, _: Address) -> Result<Vec<Address>> {
        Ok(self.state.lock().unwrap().delegates.clone())
    }

    async fn allowance(
        &self,
        _: Address,
        _: Address,
        _: Address,
        token: Address,
    ) -> Result<AllowanceState> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&token)
            .copied()
            .unwrap_or(AllowanceState {
                amount: 0,
                spent: 0,
                reset_interval_min: 0,
                last_reset_min: 0,
                usage_nonce: 0,
            }))
    }

    async fn native_balance(&self, _: Address) -> Result<u128> {
        Ok(10u128.pow(18))
    }

    async fn token_balance(&self, _: Address, _: Address) -> Result<alloy_primitives::U256> {
        Ok(alloy_primitives::U256::ZERO)
    }

    async fn submit_execution(
        &self,
        account: Address,
        tx: &SafeTransaction,
        signatures: &[u8],
    ) -> Result<TxOutcome> {
        let mut state = self.state.lock().unwrap();

        let reverted = TxOutcome {
            tx_hash: format!("0xmock{}", state.writes),
            block_number: state.writes as u64 + 1,
            success: false,
            gas_used: None,
        };

        if state.force_revert || tx.nonce != state.nonce {
            return Ok(reverted);
        }

        // verify like the contract: signatures over the commitment, in
        // strictly ascending signer order, all owners, threshold met
        let domain = DomainSeparator::new(self.chain_id, account);
        let commitment = compute_commitment(&domain, tx);

        if signatures.len() % 65 != 0 {
            return Err(Error::Encoding("blob not a multiple of 65".into()));
        }
        let mut previous: Option<Address> = None;
        let mut valid = 0usize;
        for chunk in signatures.chunks(65) {
            let (signer, _) = recover_from_bytes(commitment.as_bytes(), chunk)?;
            if let Some(prev) = previous {
                if signer <= prev {
                    return Ok(reverted);
                }
            }
            previous = Some(signer);
            if !state.owners.contains(&signer) {
                return Ok(reverted);
            }
            valid += 1;
        }
        if valid < state.threshold {
            return Ok(reverted);
        }

        state.nonce += 1;
        state.writes += 1;
        if !state.swallow_writes {
            Self::apply(&mut state, tx);
        }

        Ok(TxOutcome {
            tx_hash: format!("0xmock{}", state.writes),
            block_number: state.writes as u64 + 1,
            success: true,
            gas_used: Some(90_000),
        })
    }

    async fn submit_allowance_transfer(
        &self,
        _: Address,
        _: Address,
        token: Address,
        _: Address,
        amount: u128,
        delegate: Address,
    ) -> Result<TxOutcome> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let block_number = state.writes as u64 + 1;
        let reverted = TxOutcome {
            tx_hash: "0xmockpull".into(),
            block_number,
            success: false,
            gas_used: None,
        };

        if !state.delegates.contains(&delegate) {
            return Ok(reverted);
        }
        let now_min = now_minutes();
        let Some(entry) = state.allowances.get_mut(&token) else {
            return Ok(reverted);
        };
        if entry.reset_due(now_min) {
            entry.spent = 0;
            entry.last_reset_min = now_min;
        }
        if amount > entry.amount.saturating_sub(entry.spent) {
            return Ok(reverted);
        }
        entry.spent += amount;
        entry.usage_nonce += 1;
        state.writes += 1;

        Ok(TxOutcome {
            tx_hash: "0xmockpull".into(),
            block_number,
            success: true,
            gas_used: Some(60_000),
        })
    }
}
