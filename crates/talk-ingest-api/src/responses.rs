//! Response types and query parameters for the API.

use serde::{Deserialize, Serialize};
use talk_ingest_core::{EventId, Timestamp, WebhookLogRecord};

// ============================================================================
// Response Types
// ============================================================================

/// Body returned by the webhook and replay endpoints
///
/// Success carries `message`; failure carries `error` and usually a
/// `message` describing the stage that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
}

impl WebhookResponse {
    /// Entities persisted
    pub fn processed(event_id: Option<EventId>) -> Self {
        Self {
            success: true,
            message: Some("Webhook processed successfully".to_string()),
            error: None,
            event_id,
        }
    }

    /// Event type acknowledged without entity writes
    pub fn acknowledged(event_id: Option<EventId>) -> Self {
        Self {
            success: true,
            message: Some("Event type not processed; acknowledged".to_string()),
            error: None,
            event_id,
        }
    }

    pub fn failure(
        event_id: Option<EventId>,
        error: impl Into<String>,
        message: Option<&str>,
    ) -> Self {
        Self {
            success: false,
            message: message.map(str::to_string),
            error: Some(error.into()),
            event_id,
        }
    }
}

/// Self-test response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookResponse {
    pub success: bool,
    pub message: String,
    pub webhook_response: WebhookResponse,
    pub test_data: TestData,
}

/// Summary of the sample event sent by the self-test
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestData {
    pub event_id: String,
    pub contact_name: String,
    pub message_content: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Unprocessed webhook log row as shown to operators
#[derive(Debug, Serialize)]
pub struct PendingEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub event_date: Timestamp,
    pub received_at: Timestamp,
    pub error_message: Option<String>,
    pub has_payload: bool,
}

impl From<WebhookLogRecord> for PendingEvent {
    fn from(record: WebhookLogRecord) -> Self {
        Self {
            event_id: record.event_id,
            event_type: record.event_type,
            event_date: record.event_date,
            received_at: record.received_at,
            error_message: record.error_message,
            has_payload: record.raw_payload.is_some(),
        }
    }
}

/// Pending event list response
#[derive(Debug, Serialize)]
pub struct PendingEventsResponse {
    pub events: Vec<PendingEvent>,
    pub total: usize,
}

// ============================================================================
// Query Parameter Types
// ============================================================================

/// Parameters for pending event listing
#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub limit: Option<usize>,
}
