//! Outer transaction submission
//!
//! Every write the engine makes reaches the ledger wrapped in an ordinary
//! EIP-1559 transaction signed by the delegate's operational key. This
//! module builds, signs, broadcasts, and confirms those wrappers. Inner
//! authorization (co-signer threshold or allowance caller check) is
//! entirely separate and handled by the contracts themselves.

use crate::ledger::{parse_hex_u128, parse_hex_u64, RpcClient, TxOutcome};
use crate::signer::DigestSigner;
use crate::types::Signature;
use crate::Result;
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use serde::Deserialize;
use std::sync::Arc;
use tiny_keccak::{Hasher, Keccak};

/// Receipt polling cadence
const POLL_INTERVAL_SECS: u64 = 2;

/// Fallback priority fee when fee history is unavailable (2 gwei)
const DEFAULT_PRIORITY_FEE: u128 = 2_000_000_000;

// ============================================================================
// EIP-1559 Transaction
// ============================================================================

#[derive(Debug, Clone, RlpEncodable)]
struct Eip1559Transaction {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

#[derive(Debug, Clone, RlpEncodable)]
struct AccessListItem {
    address: Address,
    storage_keys: Vec<alloy_primitives::B256>,
}

impl Eip1559Transaction {
    /// Digest the operational key signs: `keccak256(0x02 || rlp(fields))`
    fn signing_hash(&self) -> [u8; 32] {
        let mut encoded = vec![0x02];
        self.encode(&mut encoded);

        let mut hasher = Keccak::v256();
        hasher.update(&encoded);
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);
        hash
    }

    /// Full signed encoding: `0x02 || rlp(fields || yParity || r || s)`
    fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let mut stream = alloy_rlp::BytesMut::new();

        alloy_rlp::Header {
            list: true,
            payload_length: self.rlp_payload_length() + signature_rlp_length(signature),
        }
        .encode(&mut stream);

        self.chain_id.encode(&mut stream);
        self.nonce.encode(&mut stream);
        self.max_priority_fee_per_gas.encode(&mut stream);
        self.max_fee_per_gas.encode(&mut stream);
        self.gas_limit.encode(&mut stream);
        self.to.encode(&mut stream);
        self.value.encode(&mut stream);
        self.data.encode(&mut stream);
        self.access_list.encode(&mut stream);

        signature.recovery_id.encode(&mut stream);
        U256::from_be_slice(&signature.r).encode(&mut stream);
        U256::from_be_slice(&signature.s).encode(&mut stream);

        let mut result = vec![0x02];
        result.extend_from_slice(&stream);
        result
    }

    fn rlp_payload_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + self.access_list.length()
    }
}

fn signature_rlp_length(sig: &Signature) -> usize {
    sig.recovery_id.length()
        + U256::from_be_slice(&sig.r).length()
        + U256::from_be_slice(&sig.s).length()
}

// ============================================================================
// Submitter
// ============================================================================

/// Signs and broadcasts outer transactions, then waits for inclusion.
///
/// Confirmation polling is unbounded: once broadcast, a transaction is
/// either included or the process is stopped by its operator. Giving up
/// midway would leave the pipeline unsure whether the write landed.
#[derive(Clone)]
pub struct Submitter {
    rpc: RpcClient,
    chain_id: u64,
    signer: Arc<dyn DigestSigner>,
}

impl Submitter {
    /// Create a submitter paying with the given operational key
    pub fn new(rpc: RpcClient, chain_id: u64, signer: Arc<dyn DigestSigner>) -> Self {
        Self {
            rpc,
            chain_id,
            signer,
        }
    }

    /// Address paying for outer transactions
    pub fn payer(&self) -> Address {
        self.signer.address()
    }

    /// Build, sign, broadcast, and confirm one outer transaction
    pub async fn send_and_confirm(
        &self,
        to: Address,
        value: U256,
        data: Vec<u8>,
    ) -> Result<TxOutcome> {
        let from = self.signer.address();

        let nonce: String = self
            .rpc
            .request(
                "eth_getTransactionCount",
                serde_json::json!([format!("{}", from), "pending"]),
            )
            .await?;
        let nonce = parse_hex_u64(&nonce)?;

        let (max_fee, max_priority_fee) = self.estimate_fees().await?;
        let gas_limit = self.estimate_gas(from, to, value, &data).await?;

        let tx = Eip1559Transaction {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: max_priority_fee,
            max_fee_per_gas: max_fee,
            gas_limit,
            to,
            value,
            data: Bytes::from(data),
            access_list: vec![],
        };

        let signature = self.signer.sign_digest(&tx.signing_hash())?;
        let raw = tx.encode_signed(&signature);

        let tx_hash: String = self
            .rpc
            .request(
                "eth_sendRawTransaction",
                serde_json::json!([format!("0x{}", hex::encode(&raw))]),
            )
            .await?;

        tracing::info!(%tx_hash, nonce, gas_limit, "transaction broadcast");
        self.wait_for_receipt(&tx_hash).await
    }

    /// Medium-tier fee estimate from recent fee history
    async fn estimate_fees(&self) -> Result<(u128, u128)> {
        #[derive(Deserialize)]
        struct FeeHistory {
            #[serde(rename = "baseFeePerGas")]
            base_fee_per_gas: Vec<String>,
            reward: Option<Vec<Vec<String>>>,
        }

        let history: FeeHistory = self
            .rpc
            .request("eth_feeHistory", serde_json::json!([10, "latest", [50]]))
            .await?;

        let base_fee = history
            .base_fee_per_gas
            .last()
            .and_then(|s| parse_hex_u128(s).ok())
            .unwrap_or(0);

        let tip = history
            .reward
            .as_ref()
            .map(|rewards| {
                let mut tips: Vec<u128> = rewards
                    .iter()
                    .filter_map(|r| r.first().and_then(|s| parse_hex_u128(s).ok()))
                    .collect();
                tips.sort_unstable();
                tips.get(tips.len() / 2).copied().unwrap_or(DEFAULT_PRIORITY_FEE)
            })
            .unwrap_or(DEFAULT_PRIORITY_FEE);

        Ok((base_fee * 2 + tip, tip))
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<u64> {
        let call_object = serde_json::json!({
            "from": format!("{}", from),
            "to": format!("{}", to),
            "value": format!("0x{:x}", value),
            "data": format!("0x{}", hex::encode(data)),
        });

        let result: String = self
            .rpc
            .request("eth_estimateGas", serde_json::json!([call_object]))
            .await?;

        let gas = parse_hex_u64(&result)?;
        // 20% headroom over the node's estimate
        Ok(gas * 120 / 100)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxOutcome> {
        #[derive(Deserialize)]
        struct Receipt {
            #[serde(rename = "blockNumber")]
            block_number: Option<String>,
            status: Option<String>,
            #[serde(rename = "gasUsed")]
            gas_used: Option<String>,
        }

        loop {
            let result: Option<Receipt> = self
                .rpc
                .request("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;

            if let Some(receipt) = result {
                if let Some(block_number) = receipt.block_number {
                    let success = receipt.status.as_deref() == Some("0x1");
                    return Ok(TxOutcome {
                        tx_hash: tx_hash.to_string(),
                        block_number: parse_hex_u64(&block_number)?,
                        success,
                        gas_used: receipt.gas_used.as_deref().and_then(|s| parse_hex_u64(s).ok()),
                    });
                }
            }

            tokio::time::sleep(std::time::Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("chain_id", &self.chain_id)
            .field("payer", &self.signer.address())
            .finish()
    }
}
