//! Relay client for co-signer processes
//!
//! Thin HTTP client over the relay's REST surface. Transport failures are
//! retried with a flat delay; every other error is surfaced as-is. The
//! client never verifies signatures; that is the aggregator's job on
//! ingest.

use crate::types::{
    PublishProposalRequest, SignatureCountResponse, StoredProposal, StoredSignature,
    SubmitSignatureRequest,
};
use crate::{RelayError, Result};
use alloy_primitives::Address;
use reqwest::Client;
use safe_wallet_core::{SafeTransaction, TxCommitment};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Relay client configuration
#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// Relay service URL
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transport failures
    pub max_retries: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl RelayClientConfig {
    /// Create a new config
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the retry budget
    pub fn with_retries(mut self, max_retries: u32, delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = delay_ms;
        self
    }
}

/// API response structure
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        if self.success {
            self.data
                .ok_or_else(|| RelayError::Internal("no data in response".to_string()))
        } else {
            Err(RelayError::Internal(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// HTTP client for the proposal relay
pub struct RelayClient {
    config: RelayClientConfig,
    client: Client,
}

impl RelayClient {
    /// Create a new relay client
    pub fn new(config: RelayClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Create with default configuration
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RelayClientConfig::new(url))
    }

    /// Publish a proposal so other co-signers can fetch and sign it
    pub async fn publish(
        &self,
        commitment: TxCommitment,
        tx: SafeTransaction,
    ) -> Result<StoredProposal> {
        let body = PublishProposalRequest { commitment, tx };
        self.send(|| {
            self.client
                .post(format!("{}/v1/proposals", self.config.url))
                .json(&body)
        })
        .await
    }

    /// Fetch a proposal with all signatures collected so far
    pub async fn fetch(&self, commitment: &TxCommitment) -> Result<StoredProposal> {
        self.send(|| {
            self.client
                .get(format!("{}/v1/proposals/{}", self.config.url, commitment))
        })
        .await
    }

    /// Submit this signer's signature over the commitment
    pub async fn submit_signature(
        &self,
        commitment: &TxCommitment,
        signer: Address,
        signature: Vec<u8>,
    ) -> Result<usize> {
        let body = SubmitSignatureRequest { signer, signature };
        let response: SignatureCountResponse = self
            .send(|| {
                self.client
                    .post(format!(
                        "{}/v1/proposals/{}/signatures",
                        self.config.url, commitment
                    ))
                    .json(&body)
            })
            .await?;
        Ok(response.collected)
    }

    /// Fetch just the signatures for a proposal
    pub async fn signatures(&self, commitment: &TxCommitment) -> Result<Vec<StoredSignature>> {
        self.send(|| {
            self.client.get(format!(
                "{}/v1/proposals/{}/signatures",
                self.config.url, commitment
            ))
        })
        .await
    }

    /// List all live proposals
    pub async fn pending(&self) -> Result<Vec<StoredProposal>> {
        self.send(|| self.client.get(format!("{}/v1/proposals", self.config.url)))
            .await
    }

    /// Withdraw a proposal once executed or superseded
    pub async fn withdraw(&self, commitment: &TxCommitment) -> Result<()> {
        let _: serde_json::Value = self
            .send(|| {
                self.client
                    .delete(format!("{}/v1/proposals/{}", self.config.url, commitment))
            })
            .await?;
        Ok(())
    }

    /// Send a request, retrying transport failures
    async fn send<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            match self.send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "relay request failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(
                        self.config.retry_delay_ms,
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| RelayError::Serialization(e.to_string()))?;
        body.into_result()
    }
}
