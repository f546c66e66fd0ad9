//! Ledger access
//!
//! JSON-RPC client with endpoint failover, plus the `SafeLedger` trait the
//! engine programs against. All contract state reads go through `eth_call`
//! against the latest block; writes are delegated to the submitter, which
//! wraps the calldata in an outer transaction paid for by the delegate's
//! operational key.

use crate::abi;
use crate::submit::Submitter;
use crate::types::{AllowanceState, OwnerSet, SafeTransaction};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Delegate-set page size for the paginated registry read
const DELEGATE_PAGE_SIZE: u8 = 100;

// ============================================================================
// RPC Client
// ============================================================================

/// HTTP JSON-RPC client with failover across configured endpoints
#[derive(Clone)]
pub struct RpcClient {
    urls: Vec<String>,
    client: reqwest::Client,
    current_index: Arc<AtomicUsize>,
}

impl RpcClient {
    /// Create a client over one or more endpoints
    pub fn new(urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::InvalidConfig("at least one RPC URL required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::ChainError(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            urls,
            client,
            current_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn current_url(&self) -> &str {
        let idx = self.current_index.load(Ordering::Relaxed);
        &self.urls[idx % self.urls.len()]
    }

    fn rotate_url(&self) {
        self.current_index.fetch_add(1, Ordering::Relaxed);
    }

    /// Make a JSON-RPC request, rotating to the next endpoint on failure
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let mut last_error = None;

        for _ in 0..self.urls.len() {
            let url = self.current_url();

            match self.make_request(url, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!("RPC request failed on {}: {}", url, e);
                    last_error = Some(e);
                    self.rotate_url();
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::ChainError("all RPC endpoints failed".into())))
    }

    async fn make_request<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::ChainError(format!("RPC request failed: {}", e)))?;

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ChainError(format!("failed to parse RPC response: {}", e)))?;

        if let Some(error) = response_body.get("error") {
            return Err(Error::ChainError(format!("RPC error: {}", error)));
        }

        let result = response_body
            .get("result")
            .ok_or_else(|| Error::ChainError("missing result in RPC response".into()))?;

        serde_json::from_value(result.clone())
            .map_err(|e| Error::ChainError(format!("failed to deserialize result: {}", e)))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("urls", &self.urls)
            .field("current_index", &self.current_index.load(Ordering::Relaxed))
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn parse_hex_u128(s: &str) -> Result<u128> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u128::from_str_radix(s, 16)
        .map_err(|e| Error::ChainError(format!("failed to parse hex: {}", e)))
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| Error::ChainError(format!("failed to parse hex: {}", e)))
}

pub(crate) fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| Error::ChainError(format!("failed to parse hex bytes: {}", e)))
}

// ============================================================================
// Ledger Trait
// ============================================================================

/// Outcome of a confirmed outer transaction
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// Transaction hash of the outer transaction
    pub tx_hash: String,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Whether execution succeeded (receipt status)
    pub success: bool,
    /// Gas used, when reported
    pub gas_used: Option<u64>,
}

/// Read and write access to the co-signed account, the allowance module,
/// and plain asset balances.
///
/// The engine treats every value returned here as potentially stale by one
/// replica lag; callers that depend on observing their own writes wrap the
/// read in a retry policy.
#[async_trait]
pub trait SafeLedger: Send + Sync {
    /// Commitment-scope nonce of the account
    async fn account_nonce(&self, account: Address) -> Result<u64>;

    /// Required signature count
    async fn threshold(&self, account: Address) -> Result<usize>;

    /// Owner identities together with the threshold
    async fn owner_set(&self, account: Address) -> Result<OwnerSet>;

    /// Whether the module is activated on the account
    async fn is_module_enabled(&self, account: Address, module: Address) -> Result<bool>;

    /// Full registered delegate set, following pagination to the end
    async fn delegates(&self, module: Address, account: Address) -> Result<Vec<Address>>;

    /// Allowance tuple for one `(delegate, token)` pair
    async fn allowance(
        &self,
        module: Address,
        account: Address,
        delegate: Address,
        token: Address,
    ) -> Result<AllowanceState>;

    /// Native asset balance in smallest units
    async fn native_balance(&self, address: Address) -> Result<u128>;

    /// ERC-20 balance in smallest units
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    /// Submit a co-signed transaction through the account's execution
    /// entry point and wait for confirmation
    async fn submit_execution(
        &self,
        account: Address,
        tx: &SafeTransaction,
        signatures: &[u8],
    ) -> Result<TxOutcome>;

    /// Submit a signature-free allowance pull through the module and wait
    /// for confirmation
    async fn submit_allowance_transfer(
        &self,
        module: Address,
        account: Address,
        token: Address,
        to: Address,
        amount: u128,
        delegate: Address,
    ) -> Result<TxOutcome>;
}

// ============================================================================
// Live Client
// ============================================================================

/// `SafeLedger` backed by JSON-RPC and the delegate's operational key
#[derive(Debug, Clone)]
pub struct SafeClient {
    rpc: RpcClient,
    submitter: Submitter,
}

impl SafeClient {
    /// Create a client over the given endpoints. The submitter signs and
    /// pays for all outer transactions.
    pub fn new(rpc: RpcClient, submitter: Submitter) -> Self {
        Self { rpc, submitter }
    }

    /// Read-only contract call against the latest block
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let call_object = serde_json::json!({
            "to": format!("{}", to),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result: String = self
            .rpc
            .request("eth_call", serde_json::json!([call_object, "latest"]))
            .await?;
        parse_hex_bytes(&result)
    }
}

#[async_trait]
impl SafeLedger for SafeClient {
    async fn account_nonce(&self, account: Address) -> Result<u64> {
        let data = self.call(account, abi::SEL_NONCE.to_vec()).await?;
        abi::decode_u64(&data)
    }

    async fn threshold(&self, account: Address) -> Result<usize> {
        let data = self.call(account, abi::SEL_GET_THRESHOLD.to_vec()).await?;
        Ok(abi::decode_u64(&data)? as usize)
    }

    async fn owner_set(&self, account: Address) -> Result<OwnerSet> {
        let owners_data = self.call(account, abi::SEL_GET_OWNERS.to_vec()).await?;
        let owners = abi::decode_address_array(&owners_data)?;
        let threshold = self.threshold(account).await?;
        Ok(OwnerSet { owners, threshold })
    }

    async fn is_module_enabled(&self, account: Address, module: Address) -> Result<bool> {
        let data = self
            .call(account, abi::encode_is_module_enabled(module))
            .await?;
        abi::decode_bool(&data)
    }

    async fn delegates(&self, module: Address, account: Address) -> Result<Vec<Address>> {
        let mut all = Vec::new();
        let mut start = 0u64;
        loop {
            let data = self
                .call(
                    module,
                    abi::encode_get_delegates(account, start, DELEGATE_PAGE_SIZE),
                )
                .await?;
            let (page, next) = abi::decode_delegates_page(&data)?;
            all.extend(page);
            if next == 0 {
                break;
            }
            start = next;
        }
        Ok(all)
    }

    async fn allowance(
        &self,
        module: Address,
        account: Address,
        delegate: Address,
        token: Address,
    ) -> Result<AllowanceState> {
        let data = self
            .call(module, abi::encode_get_token_allowance(account, delegate, token))
            .await?;
        abi::decode_allowance(&data)
    }

    async fn native_balance(&self, address: Address) -> Result<u128> {
        let result: String = self
            .rpc
            .request(
                "eth_getBalance",
                serde_json::json!([format!("{}", address), "latest"]),
            )
            .await?;
        parse_hex_u128(&result)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let data = self.call(token, abi::encode_balance_of(owner)).await?;
        abi::decode_u256(&data)
    }

    async fn submit_execution(
        &self,
        account: Address,
        tx: &SafeTransaction,
        signatures: &[u8],
    ) -> Result<TxOutcome> {
        let calldata = abi::encode_exec_transaction(tx, signatures);
        self.submitter
            .send_and_confirm(account, U256::ZERO, calldata)
            .await
    }

    async fn submit_allowance_transfer(
        &self,
        module: Address,
        account: Address,
        token: Address,
        to: Address,
        amount: u128,
        delegate: Address,
    ) -> Result<TxOutcome> {
        let calldata =
            abi::encode_execute_allowance_transfer(account, token, to, amount, delegate);
        self.submitter
            .send_and_confirm(module, U256::ZERO, calldata)
            .await
    }
}
