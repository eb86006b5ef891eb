//! # Pipeline Orchestrator
//!
//! Drives one webhook event through its lifecycle:
//!
//! ```text
//! Received → Validated → ( Skipped | Normalized → Persisted ) → Logged
//!                  └──────────────── Failed ─────────────────────┘
//! ```
//!
//! Parse failures are `Rejected` and never touch the store. Every parsed
//! event gets exactly one webhook log row keyed by its event id.

use crate::{
    audit::{AuditRecorder, ProcessingOutcome},
    entities::WebhookLogRecord,
    envelope::{envelope_from_value, parse_envelope, EventEnvelope},
    error::{AuditWriteWarning, IngestError},
    executor::{ExecutionReport, UpsertExecutor},
    normalizer::{normalize, Normalization},
    store::{EntityStore, StoreError},
    CorrelationId, EventId, Timestamp,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

// ============================================================================
// Pipeline Results
// ============================================================================

/// Terminal state of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineOutcome {
    /// Body failed envelope validation; nothing was recorded
    Rejected,
    /// Envelope acknowledged without entity writes
    Skipped,
    /// Entities persisted and outcome logged
    Logged,
    /// Fatal error during normalization or persistence
    Failed,
}

impl PipelineOutcome {
    /// Whether the sender should see a success response
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Skipped | Self::Logged)
    }
}

/// Everything known about one processed event
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Absent only when the envelope could not be parsed
    pub event_id: Option<EventId>,
    pub correlation_id: CorrelationId,
    pub outcome: PipelineOutcome,
    /// Present when the executor ran to completion
    pub report: Option<ExecutionReport>,
    pub error: Option<IngestError>,
    pub audit_warnings: Vec<AuditWriteWarning>,
}

impl PipelineResult {
    fn new(correlation_id: CorrelationId, outcome: PipelineOutcome) -> Self {
        Self {
            event_id: None,
            correlation_id,
            outcome,
            report: None,
            error: None,
            audit_warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Errors returned by [`IngestPipeline::replay`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplayError {
    #[error("No webhook log for event {event_id}")]
    NotFound { event_id: EventId },

    #[error("Event {event_id} is already processed")]
    AlreadyProcessed { event_id: EventId },

    #[error("Event {event_id} has no stored payload")]
    MissingPayload { event_id: EventId },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Pipeline
// ============================================================================

/// Webhook ingestion pipeline over an injected store
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn EntityStore>,
    executor: UpsertExecutor,
    recorder: AuditRecorder,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            executor: UpsertExecutor::new(store.clone()),
            recorder: AuditRecorder::new(store.clone()),
            store,
        }
    }

    /// Store handle shared by the executor and recorder
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Process a raw webhook body
    pub async fn ingest(&self, body: &[u8]) -> PipelineResult {
        let correlation_id = CorrelationId::new();

        let envelope = match parse_envelope(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Webhook rejected"
                );
                let mut result = PipelineResult::new(correlation_id, PipelineOutcome::Rejected);
                result.error = Some(IngestError::Malformed(e));
                return result;
            }
        };

        let span = info_span!(
            "ingest",
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            correlation_id = %correlation_id
        );
        self.process(envelope, correlation_id).instrument(span).await
    }

    /// Re-submit the stored payload of an unprocessed event
    pub async fn replay(&self, event_id: &EventId) -> Result<PipelineResult, ReplayError> {
        let log = self
            .store
            .get_webhook_log(event_id)
            .await?
            .ok_or_else(|| ReplayError::NotFound {
                event_id: event_id.clone(),
            })?;

        if log.processed {
            return Err(ReplayError::AlreadyProcessed {
                event_id: event_id.clone(),
            });
        }

        let raw = log.raw_payload.ok_or_else(|| ReplayError::MissingPayload {
            event_id: event_id.clone(),
        })?;

        let correlation_id = CorrelationId::new();
        let span = info_span!(
            "replay",
            event_id = %event_id,
            correlation_id = %correlation_id
        );

        async {
            info!("Replaying stored webhook");
            match envelope_from_value(raw) {
                Ok(envelope) => Ok(self.process(envelope, correlation_id).await),
                Err(e) => {
                    // The stored payload can no longer be parsed; keep the row failed.
                    let mut result =
                        PipelineResult::new(correlation_id, PipelineOutcome::Failed);
                    result.event_id = Some(event_id.clone());
                    let outcome = ProcessingOutcome::Failed(e.to_string());
                    if let Err(w) = self.recorder.record_outcome(event_id, &outcome).await {
                        result.audit_warnings.push(w);
                    }
                    result.error = Some(IngestError::Malformed(e));
                    Ok(result)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Unprocessed webhook log rows, newest first
    pub async fn pending(&self, limit: usize) -> Result<Vec<WebhookLogRecord>, StoreError> {
        self.store.list_unprocessed_logs(limit).await
    }

    async fn process(&self, envelope: EventEnvelope, correlation_id: CorrelationId) -> PipelineResult {
        let mut result = PipelineResult::new(correlation_id, PipelineOutcome::Failed);
        result.event_id = Some(envelope.event_id.clone());

        match self.recorder.record_received(&envelope).await {
            Ok(false) => info!("Event already logged, reusing existing row"),
            Ok(true) => {}
            Err(w) => result.audit_warnings.push(w),
        }

        let outcome = match normalize(&envelope, Timestamp::now()) {
            Ok(Normalization::Unsupported {
                event_type,
                payload_type,
            }) => {
                info!(
                    event_type = %event_type,
                    payload_type = payload_type.as_deref().unwrap_or("<none>"),
                    "Unsupported event acknowledged without entity writes"
                );
                result.outcome = PipelineOutcome::Skipped;
                ProcessingOutcome::Processed
            }
            Ok(Normalization::Chat(event)) => match self.executor.execute(&event).await {
                Ok(report) => {
                    info!(
                        written = report.written.len(),
                        tag_warnings = report.warnings.len(),
                        "Webhook processed"
                    );
                    result.outcome = PipelineOutcome::Logged;
                    result.report = Some(report);
                    ProcessingOutcome::Processed
                }
                Err(failure) => {
                    error!(
                        entity = %failure.entity,
                        error = %failure.source,
                        "Entity persistence failed"
                    );
                    let message = failure.to_string();
                    result.error = Some(IngestError::Dependency(failure));
                    ProcessingOutcome::Failed(message)
                }
            },
            Err(e) => {
                error!(error = %e, "Chat payload failed normalization");
                let message = e.to_string();
                result.error = Some(IngestError::Malformed(e));
                ProcessingOutcome::Failed(message)
            }
        };

        if let Err(w) = self
            .recorder
            .record_outcome(&envelope.event_id, &outcome)
            .await
        {
            result.audit_warnings.push(w);
        }

        result
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
