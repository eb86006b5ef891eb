//! # Talk-Ingest HTTP Service
//!
//! HTTP server that receives chat-platform webhooks and drives them through
//! the ingestion pipeline.
//!
//! This service provides:
//! - Webhook endpoint (`POST`; `OPTIONS` is answered by the CORS layer)
//! - Health and readiness endpoints
//! - A self-test endpoint that runs a sample event through the pipeline
//! - Admin endpoints for listing and replaying unprocessed events

pub mod config;
pub mod errors;
pub mod responses;

pub use config::{
    LoggingConfig, ServerConfig, ServiceConfig, StoreBackend, StoreConfig, WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use responses::{
    HealthResponse, PendingEvent, PendingEventsResponse, PendingParams, ReadinessResponse,
    TestData, TestWebhookResponse, WebhookResponse,
};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderName, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::{net::SocketAddr, sync::Arc};
use talk_ingest_core::{
    sample::{sample_chat_event, test_event_id, SAMPLE_CONTACT_NAME, SAMPLE_MESSAGE_CONTENT},
    EventId, IngestPipeline, PipelineOutcome, PipelineResult, Timestamp,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, instrument, warn};

/// Page size for `/admin/events/pending` when no limit is given
pub const DEFAULT_PENDING_LIMIT: usize = 50;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Pipeline that parses, normalizes and persists events
    pub pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(config: ServiceConfig, pipeline: Arc<IngestPipeline>) -> Self {
        Self { config, pipeline }
    }
}

// ============================================================================
// HTTP Server Setup
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        &state.config.webhooks.endpoint_path,
        post(handle_webhook).fallback(handle_method_not_allowed),
    );

    let health_routes = Router::new()
        .route("/api/health", get(handle_health_check))
        .route("/api/ready", get(handle_readiness_check));

    let mut router = Router::new().merge(webhook_routes).merge(health_routes);

    if state.config.webhooks.enable_test_endpoint {
        router = router.route("/api/test-webhook", post(handle_test_webhook));
    }

    if state.config.webhooks.enable_admin_routes {
        let admin_routes = Router::new()
            .route("/admin/events/pending", get(list_pending_events))
            .route("/admin/events/{event_id}/replay", post(replay_event));
        router = router.merge(admin_routes);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    pipeline: Arc<IngestPipeline>,
) -> Result<(), ServiceError> {
    let state = AppState::new(config.clone(), pipeline);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e: std::net::AddrParseError| ServiceError::BindFailed {
            address: format!("{}:{}", config.server.host, config.server.port),
            message: e.to_string(),
        })?;

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);

    // In-flight requests drain before serve returns
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal(shutdown_timeout: std::time::Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle a webhook delivery
///
/// The response is sent only after the event has been logged, so a `2xx`
/// means the outcome is durable.
#[instrument(skip(state, body), fields(body_size = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    info!("Received webhook request");

    let result = state.pipeline.ingest(&body).await;
    into_webhook_response(result).map(Json)
}

async fn handle_method_not_allowed() -> WebhookHandlerError {
    WebhookHandlerError::MethodNotAllowed
}

/// Map a pipeline result onto the HTTP contract
pub fn into_webhook_response(result: PipelineResult) -> Result<WebhookResponse, WebhookHandlerError> {
    for warning in &result.audit_warnings {
        warn!(
            event_id = %warning.event_id,
            operation = warning.operation,
            "Webhook log write failed: {}", warning.message
        );
    }

    match (result.outcome, result.error) {
        (PipelineOutcome::Logged, _) => Ok(WebhookResponse::processed(result.event_id)),
        (PipelineOutcome::Skipped, _) => Ok(WebhookResponse::acknowledged(result.event_id)),
        (PipelineOutcome::Rejected, Some(error)) => Err(WebhookHandlerError::InvalidPayload(error)),
        (PipelineOutcome::Failed, Some(error)) => Err(WebhookHandlerError::ProcessingFailed {
            event_id: result.event_id,
            error,
        }),
        (outcome, None) => Err(WebhookHandlerError::InternalError {
            message: format!("pipeline returned {:?} without an error", outcome),
        }),
    }
}

/// Run the sample chat event through the pipeline
#[instrument(skip(state))]
async fn handle_test_webhook(
    State(state): State<AppState>,
) -> (StatusCode, Json<TestWebhookResponse>) {
    let event_id = test_event_id();
    info!(event_id = %event_id, "Running test webhook");

    let body = sample_chat_event(&event_id).to_string();
    let result = state.pipeline.ingest(body.as_bytes()).await;

    let (status, webhook_response) = match into_webhook_response(result) {
        Ok(response) => (StatusCode::OK, response),
        Err(e) => (e.status_code(), e.body()),
    };

    let response = TestWebhookResponse {
        success: webhook_response.success,
        message: "Test webhook sent".to_string(),
        webhook_response,
        test_data: TestData {
            event_id,
            contact_name: SAMPLE_CONTACT_NAME.to_string(),
            message_content: SAMPLE_MESSAGE_CONTENT.to_string(),
        },
    };

    (status, Json(response))
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check; fails while the store is unreachable
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.pipeline.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                timestamp: Timestamp::now(),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Store is not ready");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    timestamp: Timestamp::now(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// List unprocessed events, newest first
#[instrument(skip(state))]
async fn list_pending_events(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Result<Json<PendingEventsResponse>, WebhookHandlerError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PENDING_LIMIT)
        .min(state.config.webhooks.max_pending_limit);

    let events: Vec<PendingEvent> = state
        .pipeline
        .pending(limit)
        .await?
        .into_iter()
        .map(PendingEvent::from)
        .collect();

    Ok(Json(PendingEventsResponse {
        total: events.len(),
        events,
    }))
}

/// Re-run a stored, unprocessed event
#[instrument(skip(state))]
async fn replay_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let event_id = EventId::new(event_id)?;
    info!(event_id = %event_id, "Replay requested");

    let result = state.pipeline.replay(&event_id).await?;
    into_webhook_response(result).map(Json)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
