//! Error types for the HTTP service

use crate::responses::WebhookResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use talk_ingest_core::{EventId, IngestError, ParseError, ReplayError, StoreError};
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the body is not a valid envelope, or an event id in
///   the path is empty
/// - `404 Not Found` / `409 Conflict`: replay of an unknown or already
///   processed event
/// - `405 Method Not Allowed`: anything but `POST` (and `OPTIONS`) on the
///   webhook path
/// - `422 Unprocessable Entity`: the envelope was valid and logged, but the
///   chat payload failed normalization (permanent, do not retry)
/// - `500 Internal Server Error`: a required entity write failed and the
///   event was recorded as failed
/// - `503 Service Unavailable`: the store is unreachable for an admin query
///
/// Every variant renders the same JSON shape as a successful webhook call
/// (`{success: false, error, message, eventId}`).
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Body failed envelope validation
    ///
    /// Maps to: `400 Bad Request` (permanent error, do not retry)
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(IngestError),

    /// Event was parsed and logged, but a fatal error stopped processing
    ///
    /// Maps to: `422 Unprocessable Entity` for a malformed chat payload,
    /// otherwise `500 Internal Server Error` with `Retry-After` when the
    /// underlying store error is transient
    #[error("Processing failed: {error}")]
    ProcessingFailed {
        event_id: Option<EventId>,
        error: IngestError,
    },

    /// Maps to: `405 Method Not Allowed`
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Maps to: `400 Bad Request`
    #[error("Invalid event id: {0}")]
    InvalidEventId(#[from] ParseError),

    /// Replay could not start
    #[error("Replay failed: {0}")]
    Replay(#[from] ReplayError),

    /// Store query failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Unexpected internal server error
    ///
    /// Maps to: `500 Internal Server Error`. Details are logged but a generic
    /// message is returned to the client.
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

fn store_status(error: &StoreError) -> StatusCode {
    if error.is_transient() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl WebhookHandlerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::ProcessingFailed {
                error: IngestError::Malformed(_),
                ..
            } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ProcessingFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidEventId(_) => StatusCode::BAD_REQUEST,
            Self::Replay(ReplayError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Replay(ReplayError::AlreadyProcessed { .. }) => StatusCode::CONFLICT,
            Self::Replay(ReplayError::MissingPayload { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Replay(ReplayError::Store(e)) => store_status(e),
            Self::Store(e) => store_status(e),
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error
    pub fn body(&self) -> WebhookResponse {
        match self {
            Self::InvalidPayload(e) => {
                WebhookResponse::failure(None, e.to_string(), Some("Invalid webhook payload"))
            }
            Self::ProcessingFailed { event_id, error } => WebhookResponse::failure(
                event_id.clone(),
                error.to_string(),
                Some("Error processing webhook"),
            ),
            Self::MethodNotAllowed => WebhookResponse::failure(None, "Method not allowed", None),
            Self::InvalidEventId(e) => WebhookResponse::failure(None, e.to_string(), None),
            Self::Replay(e) => {
                let event_id = match e {
                    ReplayError::NotFound { event_id }
                    | ReplayError::AlreadyProcessed { event_id }
                    | ReplayError::MissingPayload { event_id } => Some(event_id.clone()),
                    ReplayError::Store(_) => None,
                };
                WebhookResponse::failure(event_id, e.to_string(), Some("Replay not started"))
            }
            Self::Store(e) => WebhookResponse::failure(None, e.to_string(), None),
            Self::InternalError { .. } => WebhookResponse::failure(
                None,
                "Internal server error occurred. Please try again later.",
                None,
            ),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        let transient = match self {
            Self::ProcessingFailed { error, .. } => error.is_transient(),
            Self::Store(e) | Self::Replay(ReplayError::Store(e)) => e.is_transient(),
            _ => false,
        };
        transient.then_some(60)
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::InternalError { message } => {
                error!(error = %message, "Internal server error occurred");
            }
            Self::ProcessingFailed { event_id, error } => {
                error!(
                    event_id = event_id.as_ref().map(EventId::as_str).unwrap_or(""),
                    error = %error,
                    category = ?error.error_category(),
                    "Webhook processing failed"
                );
            }
            other => {
                warn!(status = status.as_u16(), error = %other, "Request failed");
            }
        }

        let mut response = (status, Json(self.body())).into_response();

        // Add Retry-After header for retryable errors
        if let Some(retry_seconds) = self.retry_after() {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Store initialization failed: {message}")]
    StoreInitialization { message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}
