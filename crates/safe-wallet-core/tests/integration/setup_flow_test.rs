//! End-to-end tests for the provisioning pipeline
//!
//! Cover the full happy path, idempotent re-runs, the single-owner
//! requirement, on-chain rejection, stale-read exhaustion, and the
//! delegate's pull path against the freshly provisioned account.

use super::MockLedger;
use alloy_primitives::Address;
use safe_wallet_core::{
    AllowanceExecutor, DigestSigner, Error, LocalSigner, Reconciler, SetupSequencer, WalletConfig,
};
use std::sync::Arc;

const CHAIN_ID: u64 = 11155111;

fn account() -> Address {
    Address::from_slice(&[0xaa; 20])
}

fn token() -> Address {
    Address::from_slice(&[0x70; 20])
}

fn delegate() -> Address {
    Address::from_slice(&[0xd1; 20])
}

fn config() -> WalletConfig {
    WalletConfig::from_json(&format!(
        r#"{{
            "chain_id": {CHAIN_ID},
            "rpc_urls": ["http://localhost:8545"],
            "account": "{}",
            "module": "{}",
            "delegate": "{}",
            "allowances": [
                {{ "token": "{}", "amount": 50, "reset_interval_min": 1440 }},
                {{ "token": "0x0000000000000000000000000000000000000000",
                   "amount": 50000000000000000, "reset_interval_min": 1440 }}
            ],
            "settle_delay_secs": 0,
            "retry": {{ "max_attempts": 3, "initial_delay_ms": 1, "backoff_multiplier": 1 }}
        }}"#,
        account(),
        Address::from_slice(&[0xbb; 20]),
        delegate(),
        token(),
    ))
    .unwrap()
}

fn single_owner_setup() -> (Arc<MockLedger>, Arc<LocalSigner>, WalletConfig) {
    let owner = Arc::new(LocalSigner::random());
    let ledger = Arc::new(MockLedger::new(
        CHAIN_ID,
        account(),
        vec![owner.address()],
        1,
    ));
    (ledger, owner, config())
}

#[tokio::test]
async fn test_fresh_account_runs_all_steps() {
    let (ledger, owner, config) = single_owner_setup();
    let sequencer = SetupSequencer::new(ledger.clone(), owner, config.clone());

    let report = sequencer.run().await.unwrap();
    // enable module, register delegate, two allowances
    assert_eq!(report.steps.len(), 4);
    assert_eq!(report.executed_count(), 4);
    assert_eq!(ledger.writes(), 4);

    let view = Reconciler::new(ledger.clone(), config)
        .snapshot(None)
        .await
        .unwrap();
    assert!(view.is_provisioned());
    assert!(view.module_enabled);
    assert!(view.delegate_registered);
    assert_eq!(view.account_nonce, 4);
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let (ledger, owner, config) = single_owner_setup();
    let sequencer = SetupSequencer::new(ledger.clone(), owner, config);

    sequencer.run().await.unwrap();
    let writes_after_first = ledger.writes();

    let report = sequencer.run().await.unwrap();
    assert_eq!(report.executed_count(), 0);
    assert_eq!(report.steps.len(), 4);
    assert_eq!(ledger.writes(), writes_after_first);
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_duplicates() {
    let (ledger, owner, config) = single_owner_setup();

    // simulate a crash after the first two steps by pre-applying them
    {
        let mut state = ledger.state.lock().unwrap();
        state.module_enabled = true;
        state.delegates.push(delegate());
    }

    let sequencer = SetupSequencer::new(ledger.clone(), owner, config);
    let report = sequencer.run().await.unwrap();

    // only the two allowance grants execute
    assert_eq!(report.executed_count(), 2);
    assert_eq!(ledger.writes(), 2);
}

#[tokio::test]
async fn test_multi_owner_account_refused() {
    let owner = Arc::new(LocalSigner::random());
    let other = LocalSigner::random();
    let ledger = Arc::new(MockLedger::new(
        CHAIN_ID,
        account(),
        vec![owner.address(), other.address()],
        2,
    ));

    let err = SetupSequencer::new(ledger, owner, config())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SingleSignerRequired { threshold: 2 }));
}

#[tokio::test]
async fn test_revert_aborts_pipeline() {
    let (ledger, owner, config) = single_owner_setup();
    ledger.state.lock().unwrap().force_revert = true;

    let err = SetupSequencer::new(ledger.clone(), owner, config)
        .run()
        .await
        .unwrap_err();
    match err {
        Error::StepRejected { step, .. } => assert_eq!(step, "enable-module"),
        other => panic!("expected StepRejected, got {:?}", other),
    }
    // nothing was applied
    assert!(!ledger.state.lock().unwrap().module_enabled);
}

#[tokio::test]
async fn test_invisible_write_exhausts_retries() {
    let (ledger, owner, config) = single_owner_setup();
    ledger.state.lock().unwrap().swallow_writes = true;

    let err = SetupSequencer::new(ledger, owner, config)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StaleRead { attempts: 3, .. }));
}

#[tokio::test]
async fn test_pull_against_provisioned_account() {
    let (ledger, owner, config) = single_owner_setup();
    SetupSequencer::new(ledger.clone(), owner, config.clone())
        .run()
        .await
        .unwrap();

    let executor = AllowanceExecutor::new(ledger.clone(), config);
    let recipient = Address::from_slice(&[0x99; 20]);

    executor.pull(token(), recipient, 30).await.unwrap();
    assert_eq!(executor.remaining(token()).await.unwrap(), 20);

    // the rest of the window only holds 20
    let err = executor.pull(token(), recipient, 25).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientAllowance {
            requested: 25,
            remaining: 20
        }
    ));

    executor.pull(token(), recipient, 20).await.unwrap();
    assert_eq!(executor.remaining(token()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_refill_pulls_native_allowance() {
    let (ledger, owner, mut config) = single_owner_setup();
    SetupSequencer::new(ledger.clone(), owner, config.clone())
        .run()
        .await
        .unwrap();

    // mock reports a delegate balance of 1 ether; no refill below floor
    config.low_balance = Some(safe_wallet_core::LowBalanceConfig {
        threshold: 10u128.pow(17),
        refill_amount: 2 * 10u128.pow(16),
    });
    let executor = AllowanceExecutor::new(ledger.clone(), config.clone());
    assert!(executor.check_refill().await.unwrap().is_none());

    // raise the floor above the balance; refill fires through the
    // native-asset allowance
    config.low_balance = Some(safe_wallet_core::LowBalanceConfig {
        threshold: 2 * 10u128.pow(18),
        refill_amount: 2 * 10u128.pow(16),
    });
    let executor = AllowanceExecutor::new(ledger.clone(), config);
    let outcome = executor.check_refill().await.unwrap();
    assert!(outcome.is_some());
}
