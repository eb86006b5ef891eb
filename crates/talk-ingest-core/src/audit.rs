//! # Audit Log Recorder
//!
//! Maintains one `webhook_logs` row per event id. The row is created with
//! `processed = false` before any entity write and updated once the event
//! reaches a terminal state. Audit write failures never change the outcome
//! of the event; they are logged and returned as [`AuditWriteWarning`].

use crate::{
    entities::WebhookLogRecord, envelope::EventEnvelope, error::AuditWriteWarning,
    store::EntityStore, EventId, Timestamp,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Terminal processing state written back to the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Entities persisted, or the event type was acknowledged without writes
    Processed,
    /// Fatal failure; the message is stored as `error_message`
    Failed(String),
}

impl ProcessingOutcome {
    fn processed(&self) -> bool {
        matches!(self, Self::Processed)
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            Self::Processed => None,
            Self::Failed(message) => Some(message.as_str()),
        }
    }
}

/// Writes webhook log rows through the entity store
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn EntityStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Record receipt of a parsed envelope
    ///
    /// Returns `true` when a new row was created and `false` when the event
    /// had already been logged by an earlier delivery.
    pub async fn record_received(&self, envelope: &EventEnvelope) -> Result<bool, AuditWriteWarning> {
        let record = WebhookLogRecord {
            event_id: envelope.event_id.clone(),
            event_type: envelope.event_type.clone(),
            event_date: envelope.event_date,
            raw_payload: Some(envelope.raw.clone()),
            processed: false,
            error_message: None,
            received_at: Timestamp::now(),
        };

        match self.store.insert_webhook_log(&record).await {
            Ok(created) => {
                debug!(event_id = %envelope.event_id, created, "Webhook receipt recorded");
                Ok(created)
            }
            Err(e) => Err(warning(&envelope.event_id, "insert", e.to_string())),
        }
    }

    /// Record the terminal outcome of an event
    pub async fn record_outcome(
        &self,
        event_id: &EventId,
        outcome: &ProcessingOutcome,
    ) -> Result<(), AuditWriteWarning> {
        self.store
            .update_webhook_log(event_id, outcome.processed(), outcome.error_message())
            .await
            .map_err(|e| warning(event_id, "update", e.to_string()))?;

        debug!(
            event_id = %event_id,
            processed = outcome.processed(),
            "Webhook outcome recorded"
        );
        Ok(())
    }
}

fn warning(event_id: &EventId, operation: &'static str, message: String) -> AuditWriteWarning {
    warn!(
        event_id = %event_id,
        operation,
        error = %message,
        "Audit log write failed, continuing"
    );
    AuditWriteWarning {
        event_id: event_id.clone(),
        operation,
        message,
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
