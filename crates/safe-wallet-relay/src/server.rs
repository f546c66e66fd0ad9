//! HTTP server for the proposal relay
//!
//! REST endpoints for publishing proposals, collecting signatures, and
//! fetching them back. The server stores opaque payloads only; it has no
//! keys and performs no verification beyond shape, so it never needs to
//! be trusted with more than availability.
//!
//! ## Production Features
//!
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Request timeout middleware
//! - CORS configuration
//! - Periodic expiry of stale proposals

use crate::store::ProposalCache;
use crate::types::{HealthResponse, PublishProposalRequest, SignatureCountResponse,
    StatsResponse, StoredProposal, StoredSignature, SubmitSignatureRequest};
use crate::RelayError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use safe_wallet_core::TxCommitment;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Relay service configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Proposal TTL in seconds
    pub proposal_ttl_secs: i64,
    /// Cleanup interval in seconds
    pub cleanup_interval_secs: u64,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            // proposals outlive a long signing session but not a weekend
            proposal_ttl_secs: 86_400,
            cleanup_interval_secs: 60,
            cors_enabled: true,
            request_timeout_secs: 30,
        }
    }
}

impl RelayConfig {
    /// Set the proposal TTL
    pub fn with_proposal_ttl(mut self, secs: i64) -> Self {
        self.proposal_ttl_secs = secs;
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Disable CORS
    pub fn without_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Proposal store
    pub store: ProposalCache,
    /// Service start time
    pub started_at: Instant,
    /// Configuration
    pub config: RelayConfig,
}

/// Proposal relay service
pub struct ProposalRelayService {
    state: Arc<AppState>,
}

impl ProposalRelayService {
    /// Create a new relay service
    pub fn new(config: RelayConfig) -> Self {
        let state = Arc::new(AppState {
            store: ProposalCache::new(config.proposal_ttl_secs),
            started_at: Instant::now(),
            config,
        });
        Self { state }
    }

    /// Get a reference to the proposal store
    pub fn store(&self) -> &ProposalCache {
        &self.state.store
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        let timeout = Duration::from_secs(self.state.config.request_timeout_secs);

        let mut router = Router::new()
            // Health and stats
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/stats", get(stats))
            // Proposal lifecycle
            .route("/v1/proposals", post(publish_proposal))
            .route("/v1/proposals", get(list_proposals))
            .route("/v1/proposals/:commitment", get(get_proposal))
            .route("/v1/proposals/:commitment", delete(withdraw_proposal))
            // Signature collection
            .route(
                "/v1/proposals/:commitment/signatures",
                post(submit_signature),
            )
            .route("/v1/proposals/:commitment/signatures", get(get_signatures))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(timeout)),
            )
            .with_state(state);

        if self.state.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Start the relay service with graceful shutdown
    pub async fn serve(self, addr: impl Into<SocketAddr>) -> anyhow::Result<()> {
        let addr = addr.into();
        let state = Arc::clone(&self.state);

        // Start cleanup task
        let cleanup_state = Arc::clone(&state);
        let cleanup_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                cleanup_state.config.cleanup_interval_secs,
            ));
            loop {
                interval.tick().await;
                cleanup_state.store.cleanup();
            }
        });

        info!(address = %addr, "Starting proposal relay service");

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shutdown signal received, cleaning up...");
        cleanup_handle.abort();
        info!("Relay service stopped");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// API error response that implements IntoResponse
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(&self.message));
        (self.status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: e.to_string(),
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_commitment(raw: &str) -> Result<TxCommitment, ApiError> {
    TxCommitment::from_hex(raw)
        .map_err(|_| ApiError::bad_request(format!("invalid commitment: {}", raw)))
}

/// Health check (for load balancers)
async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

/// Readiness check
async fn ready() -> StatusCode {
    StatusCode::OK
}

/// Service statistics
async fn stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsResponse>> {
    Json(ApiResponse::success(StatsResponse {
        proposals: state.store.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

/// Publish a proposal
async fn publish_proposal(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishProposalRequest>,
) -> Result<Json<ApiResponse<StoredProposal>>, ApiError> {
    let proposal = state.store.publish(request.commitment, request.tx);
    info!(commitment = %proposal.commitment, "proposal published");
    Ok(Json(ApiResponse::success(proposal)))
}

/// List live proposals
async fn list_proposals(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<StoredProposal>>> {
    Json(ApiResponse::success(state.store.list()))
}

/// Fetch one proposal
async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(commitment): Path<String>,
) -> Result<Json<ApiResponse<StoredProposal>>, ApiError> {
    let commitment = parse_commitment(&commitment)?;
    Ok(Json(ApiResponse::success(state.store.get(&commitment)?)))
}

/// Withdraw a proposal
async fn withdraw_proposal(
    State(state): State<Arc<AppState>>,
    Path(commitment): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let commitment = parse_commitment(&commitment)?;
    if !state.store.remove(&commitment) {
        return Err(RelayError::ProposalNotFound(commitment.to_string()).into());
    }
    info!(%commitment, "proposal withdrawn");
    Ok(Json(ApiResponse::success(serde_json::json!({}))))
}

/// Submit a signature
async fn submit_signature(
    State(state): State<Arc<AppState>>,
    Path(commitment): Path<String>,
    Json(request): Json<SubmitSignatureRequest>,
) -> Result<Json<ApiResponse<SignatureCountResponse>>, ApiError> {
    let commitment = parse_commitment(&commitment)?;
    let collected = state
        .store
        .add_signature(&commitment, request.signer, request.signature)?;
    info!(%commitment, signer = %request.signer, collected, "signature stored");
    Ok(Json(ApiResponse::success(SignatureCountResponse {
        commitment,
        collected,
    })))
}

/// Fetch the signatures for a proposal
async fn get_signatures(
    State(state): State<Arc<AppState>>,
    Path(commitment): Path<String>,
) -> Result<Json<ApiResponse<Vec<StoredSignature>>>, ApiError> {
    let commitment = parse_commitment(&commitment)?;
    Ok(Json(ApiResponse::success(
        state.store.get(&commitment)?.signatures,
    )))
}
