//! Safe Wallet CLI
//!
//! Operator tool for provisioning the co-signed account, driving the
//! proposal flow through the relay, and executing allowance pulls.

use anyhow::{anyhow, bail, Context, Result};
use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand};
use safe_wallet_core::{
    compute_commitment, AdminOp, AllowanceExecutor, DigestSigner, DomainSeparator, LocalSigner,
    Reconciler, RpcClient, SafeClient, SafeLedger, SafeTransaction, SetupSequencer,
    SignatureAggregator, StepAction, Submitter, TxCommitment, WalletConfig,
};
use safe_wallet_relay::RelayClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "safe-wallet")]
#[command(about = "Co-signed smart account CLI", version)]
struct Cli {
    /// Path to the wallet configuration file
    #[arg(short, long, default_value = "wallet.json", global = true)]
    config: String,

    /// Signing key as hex (owner key for admin flows, delegate key for pulls)
    #[arg(long, env = "SAFE_WALLET_KEY", global = true, hide_env_values = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the account: enable module, register delegate, grant allowances
    Setup,

    /// Show configured intent versus ledger state
    Status,

    /// Publish a transfer proposal to the relay and sign it
    Propose {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in smallest units
        #[arg(long, default_value = "0")]
        value: String,

        /// Optional calldata as hex
        #[arg(long)]
        data: Option<String>,
    },

    /// Publish a threshold-change proposal to the relay and sign it
    ChangeThreshold {
        /// New required signature count
        #[arg(long)]
        threshold: usize,
    },

    /// Fetch a proposal from the relay, verify it, and add this owner's signature
    Sign {
        /// Commitment hash identifying the proposal
        commitment: String,
    },

    /// Assemble collected signatures and execute the proposal on-chain
    Submit {
        /// Commitment hash identifying the proposal
        commitment: String,
    },

    /// Pull tokens through the allowance module (delegate key)
    Pull {
        /// Asset address; the zero address is the native asset
        #[arg(long)]
        token: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in smallest units
        #[arg(long)]
        amount: u128,
    },

    /// Refill the delegate's native balance if it is below the configured floor
    Refill,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = WalletConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    let key = cli.key;

    match cli.command {
        Commands::Setup => run_setup(&config, &require_key(&key)?).await,
        Commands::Status => show_status(&config).await,
        Commands::Propose { to, value, data } => {
            let tx = build_transfer(&config, &to, &value, data.as_deref()).await?;
            propose(&config, &require_key(&key)?, tx).await
        }
        Commands::ChangeThreshold { threshold } => {
            let tx = build_threshold_change(&config, threshold).await?;
            propose(&config, &require_key(&key)?, tx).await
        }
        Commands::Sign { commitment } => {
            sign_proposal(&config, &require_key(&key)?, &commitment).await
        }
        Commands::Submit { commitment } => {
            submit_proposal(&config, &require_key(&key)?, &commitment).await
        }
        Commands::Pull { token, to, amount } => {
            let token = parse_address(&token)?;
            let to = parse_address(&to)?;
            run_pull(&config, &require_key(&key)?, token, to, amount).await
        }
        Commands::Refill => run_refill(&config, &require_key(&key)?).await,
    }
}

fn require_key(key: &Option<String>) -> Result<String> {
    key.clone()
        .ok_or_else(|| anyhow!("signing key required: pass --key or set SAFE_WALLET_KEY"))
}

fn parse_address(s: &str) -> Result<Address> {
    s.parse()
        .map_err(|_| anyhow!("invalid address: {}", s))
}

fn parse_commitment(s: &str) -> Result<TxCommitment> {
    TxCommitment::from_hex(s).map_err(|_| anyhow!("invalid commitment: {}", s))
}

/// Wire up the ledger client with the given key paying for submissions
fn build_ledger(config: &WalletConfig, key: &str) -> Result<(Arc<SafeClient>, Arc<LocalSigner>)> {
    let signer = Arc::new(LocalSigner::from_hex(key)?);
    let rpc = RpcClient::new(config.rpc_urls.clone())?;
    let submitter = Submitter::new(rpc.clone(), config.chain_id, signer.clone());
    Ok((Arc::new(SafeClient::new(rpc, submitter)), signer))
}

fn relay_client(config: &WalletConfig) -> Result<RelayClient> {
    let url = config
        .relay_url
        .as_deref()
        .ok_or_else(|| anyhow!("relay_url not set in configuration"))?;
    Ok(RelayClient::with_url(url)?)
}

async fn run_setup(config: &WalletConfig, key: &str) -> Result<()> {
    let (ledger, signer) = build_ledger(config, key)?;

    println!("Provisioning account {}...", config.account);
    let report = SetupSequencer::new(ledger, signer, config.clone())
        .run()
        .await?;

    for step in &report.steps {
        match &step.action {
            StepAction::Executed { tx_hash } => {
                println!("  [EXECUTED] {} ({})", step.step, tx_hash);
            }
            StepAction::Skipped => {
                println!("  [SKIPPED]  {}", step.step);
            }
        }
    }
    println!(
        "\nSetup complete: {} of {} steps executed",
        report.executed_count(),
        report.steps.len()
    );
    Ok(())
}

async fn show_status(config: &WalletConfig) -> Result<()> {
    // status is read-only, any key works as the payer slot is never used
    let (ledger, _) = build_ledger(config, &hex::encode([0x01u8; 32]))?;
    let view = Reconciler::new(ledger, config.clone())
        .snapshot(None)
        .await?;

    println!("{}", serde_json::to_string_pretty(&view)?);
    if view.is_provisioned() {
        println!("\nAccount is fully provisioned");
    } else {
        println!("\nAccount is NOT fully provisioned; run `safe-wallet setup`");
    }
    Ok(())
}

/// Build a transfer at the current account nonce
async fn build_transfer(
    config: &WalletConfig,
    to: &str,
    value: &str,
    data: Option<&str>,
) -> Result<SafeTransaction> {
    let to = parse_address(to)?;
    let value: u128 = value.parse().context("value must be an integer")?;
    let data = match data {
        Some(hex_str) => hex::decode(hex_str.strip_prefix("0x").unwrap_or(hex_str))
            .context("data must be valid hex")?,
        None => Vec::new(),
    };

    let (ledger, _) = build_ledger(config, &hex::encode([0x01u8; 32]))?;
    let nonce = ledger.account_nonce(config.account).await?;
    Ok(SafeTransaction::call(to, U256::from(value), data, nonce))
}

/// Build a threshold change at the current account nonce
async fn build_threshold_change(config: &WalletConfig, threshold: usize) -> Result<SafeTransaction> {
    if threshold == 0 {
        bail!("threshold must be at least 1");
    }
    let (ledger, _) = build_ledger(config, &hex::encode([0x01u8; 32]))?;
    let nonce = ledger.account_nonce(config.account).await?;
    Ok(AdminOp::ThresholdChange { threshold }.into_transaction(config.account, nonce)?)
}

/// Publish a proposal to the relay and attach this owner's signature
async fn propose(config: &WalletConfig, key: &str, tx: SafeTransaction) -> Result<()> {
    let signer = LocalSigner::from_hex(key)?;
    let relay = relay_client(config)?;

    let domain = DomainSeparator::new(config.chain_id, config.account);
    let commitment = compute_commitment(&domain, &tx);

    relay.publish(commitment, tx).await?;
    let signature = signer.sign_digest(commitment.as_bytes())?;
    let collected = relay
        .submit_signature(&commitment, signer.address(), signature.to_offset_bytes().to_vec())
        .await?;

    println!("Proposal published");
    println!("  Commitment: {}", commitment);
    println!("  Signatures: {}", collected);
    println!("\nShare the commitment with co-signers, then run:");
    println!("  safe-wallet sign {}", commitment);
    Ok(())
}

/// Fetch, verify, and co-sign a pending proposal
async fn sign_proposal(config: &WalletConfig, key: &str, commitment: &str) -> Result<()> {
    let commitment = parse_commitment(commitment)?;
    let signer = LocalSigner::from_hex(key)?;
    let relay = relay_client(config)?;

    let proposal = relay.fetch(&commitment).await?;

    // Recompute the commitment locally; never sign what the relay claims
    let domain = DomainSeparator::new(config.chain_id, config.account);
    let recomputed = compute_commitment(&domain, &proposal.tx);
    if recomputed != commitment {
        bail!(
            "relay payload does not match commitment: expected {}, computed {}",
            commitment,
            recomputed
        );
    }

    println!("Proposal {}:", commitment);
    println!("  To:    {}", proposal.tx.to);
    println!("  Value: {}", proposal.tx.value);
    println!("  Nonce: {}", proposal.tx.nonce);

    let signature = signer.sign_digest(commitment.as_bytes())?;
    let collected = relay
        .submit_signature(&commitment, signer.address(), signature.to_offset_bytes().to_vec())
        .await?;
    println!("\nSigned as {} ({} signatures collected)", signer.address(), collected);
    Ok(())
}

/// Pull collected signatures from the relay and execute on-chain
async fn submit_proposal(config: &WalletConfig, key: &str, commitment: &str) -> Result<()> {
    let commitment = parse_commitment(commitment)?;
    let (ledger, _) = build_ledger(config, key)?;
    let relay = relay_client(config)?;

    let proposal = relay.fetch(&commitment).await?;
    let domain = DomainSeparator::new(config.chain_id, config.account);

    let aggregator = SignatureAggregator::in_memory();
    let tracked = aggregator.propose(&domain, proposal.tx.clone());
    if tracked != commitment {
        bail!(
            "relay payload does not match commitment: expected {}, computed {}",
            commitment,
            tracked
        );
    }

    // Relay claims are advisory; every signature is re-verified by recovery
    for stored in &proposal.signatures {
        match aggregator.add_unverified(&commitment, &stored.bytes) {
            Ok((signer, state)) => {
                tracing::info!(%signer, collected = state.collected, "signature accepted");
            }
            Err(e) => {
                tracing::warn!(claimed = %stored.signer, error = %e, "signature rejected");
            }
        }
    }

    let owner_set = ledger.owner_set(config.account).await?;
    let (tx, blob) = aggregator.executable_payload(&commitment, owner_set.threshold)?;

    println!(
        "Executing proposal {} with {} signatures...",
        commitment,
        blob.len() / 65
    );
    let outcome = ledger.submit_execution(config.account, &tx, &blob).await?;
    if !outcome.success {
        bail!("execution reverted in block {}", outcome.block_number);
    }

    println!("Executed in block {} ({})", outcome.block_number, outcome.tx_hash);
    if let Err(e) = relay.withdraw(&commitment).await {
        tracing::warn!(error = %e, "could not withdraw proposal from relay");
    }
    Ok(())
}

async fn run_pull(
    config: &WalletConfig,
    key: &str,
    token: Address,
    to: Address,
    amount: u128,
) -> Result<()> {
    let (ledger, signer) = build_ledger(config, key)?;
    if signer.address() != config.delegate {
        bail!(
            "pulls must be submitted by the delegate {}, key is {}",
            config.delegate,
            signer.address()
        );
    }

    let executor = AllowanceExecutor::new(ledger, config.clone());
    let remaining = executor.remaining(token).await?;
    println!("Remaining allowance for {}: {}", token, remaining);

    let outcome = executor.pull(token, to, amount).await?;
    println!(
        "Pulled {} to {} in block {} ({})",
        amount, to, outcome.block_number, outcome.tx_hash
    );
    Ok(())
}

async fn run_refill(config: &WalletConfig, key: &str) -> Result<()> {
    let (ledger, _) = build_ledger(config, key)?;
    let executor = AllowanceExecutor::new(ledger, config.clone());

    match executor.check_refill().await? {
        Some(outcome) => {
            println!(
                "Refilled delegate balance in block {} ({})",
                outcome.block_number, outcome.tx_hash
            );
        }
        None => {
            println!("No refill needed");
        }
    }
    Ok(())
}
