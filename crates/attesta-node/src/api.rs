//! HTTP API for the Attesta node.
//!
//! The issuer exposes issuance, publisher metrics, and dead-letter
//! reprocessing; the verifier exposes verification, sync inspection, and
//! failed-event replay. Both serve a health endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use attesta_core::{Credential, CredentialRequest, FailedEventEnvelope, RecordStore, SyncRecord};
use attesta_pipeline::{ConsumerMetrics, EventMetrics, EventPublisher, EventSubscriber, QueueStats};

use crate::issuance::{IssuanceService, IssueError};
use crate::verification::{VerificationOutcome, VerificationService};

/// Shared state behind the issuer's handlers.
pub struct IssuerState {
    pub issuance: Arc<IssuanceService>,
    pub publisher: Arc<EventPublisher>,
    pub store: Arc<dyn RecordStore>,
}

/// Shared state behind the verifier's handlers.
pub struct VerifierState {
    pub verification: Arc<VerificationService>,
    pub subscriber: Arc<EventSubscriber>,
    pub store: Arc<dyn RecordStore>,
}

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listening: Option<bool>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct IssuerMetricsResponse {
    pub events: EventMetrics,
    pub queues: QueueStats,
}

#[derive(Serialize)]
pub struct ReprocessResponse {
    pub reprocessed: usize,
}

#[derive(Serialize)]
pub struct SyncsResponse {
    pub syncs: Vec<SyncRecord>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct FailedEventsResponse {
    pub events: Vec<FailedEventEnvelope>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "credentialId")]
    pub credential_id: String,
}

#[derive(Deserialize)]
pub struct SyncsQuery {
    pub limit: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Issuer handlers ---

async fn handle_issuer_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: "issuer".into(),
        listening: None,
    })
}

async fn handle_issue(
    State(state): State<Arc<IssuerState>>,
    Json(request): Json<CredentialRequest>,
) -> Result<(StatusCode, Json<Credential>), ApiError> {
    match state.issuance.issue(request).await {
        Ok(credential) => Ok((StatusCode::CREATED, Json(credential))),
        Err(e @ IssueError::MissingField(_)) => Err(error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ IssueError::AlreadyExists { .. }) => Err(error(StatusCode::CONFLICT, e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "issuance failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn handle_issuer_metrics(
    State(state): State<Arc<IssuerState>>,
) -> Result<Json<IssuerMetricsResponse>, ApiError> {
    let events = state.publisher.metrics().await;
    let queues = state
        .publisher
        .queue_stats()
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(IssuerMetricsResponse { events, queues }))
}

async fn handle_reprocess_dead_letter(
    State(state): State<Arc<IssuerState>>,
) -> Json<ReprocessResponse> {
    let reprocessed = state.publisher.reprocess_dead_letter().await;
    Json(ReprocessResponse { reprocessed })
}

async fn handle_issuer_get_credential(
    State(state): State<Arc<IssuerState>>,
    Path(id): Path<String>,
) -> Result<Json<Credential>, ApiError> {
    get_credential(state.store.as_ref(), &id).await
}

// --- Verifier handlers ---

async fn handle_verifier_health(State(state): State<Arc<VerifierState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: "verifier".into(),
        listening: Some(state.subscriber.is_listening()),
    })
}

async fn handle_verify(
    State(state): State<Arc<VerifierState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    state
        .verification
        .verify(&request.credential_id)
        .await
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn handle_syncs(
    State(state): State<Arc<VerifierState>>,
    Query(query): Query<SyncsQuery>,
) -> Result<Json<SyncsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(20);
    let syncs = state
        .subscriber
        .recent_syncs(limit)
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let count = syncs.len();
    Ok(Json(SyncsResponse { syncs, count }))
}

async fn handle_failed_events(
    State(state): State<Arc<VerifierState>>,
) -> Result<Json<FailedEventsResponse>, ApiError> {
    let events = state
        .subscriber
        .failed_events()
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let count = events.len();
    Ok(Json(FailedEventsResponse { events, count }))
}

async fn handle_reprocess_failed(
    State(state): State<Arc<VerifierState>>,
) -> Json<ReprocessResponse> {
    let reprocessed = state.subscriber.reprocess_failed_events().await;
    Json(ReprocessResponse { reprocessed })
}

async fn handle_verifier_metrics(
    State(state): State<Arc<VerifierState>>,
) -> Json<ConsumerMetrics> {
    Json(state.subscriber.metrics().await)
}

async fn handle_verifier_get_credential(
    State(state): State<Arc<VerifierState>>,
    Path(id): Path<String>,
) -> Result<Json<Credential>, ApiError> {
    get_credential(state.store.as_ref(), &id).await
}

async fn get_credential(
    store: &dyn RecordStore,
    id: &str,
) -> Result<Json<Credential>, ApiError> {
    match store.get_by_id(id).await {
        Ok(Some(credential)) => Ok(Json(credential)),
        Ok(None) => Err(error(
            StatusCode::NOT_FOUND,
            format!("credential not found: {}", id),
        )),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// --- Routers ---

pub fn issuer_router(state: Arc<IssuerState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_issuer_health))
        .route("/api/v1/credentials", post(handle_issue))
        .route("/api/v1/credentials/{id}", get(handle_issuer_get_credential))
        .route("/api/v1/metrics", get(handle_issuer_metrics))
        .route("/api/v1/events/reprocess", post(handle_reprocess_dead_letter))
        .with_state(state)
}

pub fn verifier_router(state: Arc<VerifierState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_verifier_health))
        .route("/api/v1/credentials/verify", post(handle_verify))
        .route(
            "/api/v1/credentials/{id}",
            get(handle_verifier_get_credential),
        )
        .route("/api/v1/syncs", get(handle_syncs))
        .route("/api/v1/events/failed", get(handle_failed_events))
        .route("/api/v1/events/reprocess", post(handle_reprocess_failed))
        .route("/api/v1/metrics", get(handle_verifier_metrics))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    router: Router,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    tracing::info!("HTTP API server stopped");
    Ok(())
}
