//! # Ingestion Error Taxonomy
//!
//! Fatal errors ([`IngestError`]) abort the pipeline and reach both the
//! caller and the audit log. Warnings ([`TagWriteWarning`],
//! [`AuditWriteWarning`]) are logged where they occur and never fail an event.

use crate::{entities::EntityRef, store::StoreError, ErrorCategory, EventId};
use serde::{Deserialize, Serialize};

/// Envelope or required entity field missing or invalid
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedPayload {
    #[error("Body is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid field format: {field} - {message}")]
    InvalidField { field: String, message: String },
}

impl MalformedPayload {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A required-predecessor (or the terminal Message) write failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("{entity} upsert failed: {source}")]
pub struct DependencyFailure {
    pub entity: EntityRef,
    #[source]
    pub source: StoreError,
}

/// Top-level error for a failed pipeline invocation
#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] MalformedPayload),

    #[error("Dependency failure: {0}")]
    Dependency(#[from] DependencyFailure),
}

impl IngestError {
    /// Check if error is transient and a redelivery may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Malformed(_) => false,
            Self::Dependency(failure) => failure.source.is_transient(),
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transient() {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }
}

/// Non-fatal failure normalizing or writing a tag or a contact/tag link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{entity} skipped: {message}")]
pub struct TagWriteWarning {
    pub entity: EntityRef,
    pub message: String,
}

/// Non-fatal failure persisting the webhook log itself
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Audit {operation} failed for event {event_id}: {message}")]
pub struct AuditWriteWarning {
    pub event_id: EventId,
    pub operation: &'static str,
    pub message: String,
}
