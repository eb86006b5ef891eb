//! # Talk-Ingest Core
//!
//! Core business logic for the Talk-Ingest webhook intake service.
//!
//! This crate receives chat-platform webhook envelopes, records them in the
//! audit log, normalizes the nested chat payload into flat entity records and
//! writes those records to a relational store in foreign-key order.
//!
//! ## Architecture
//!
//! - The pipeline depends only on the [`EntityStore`] trait
//! - Store implementations are injected at construction time
//! - Fatal and non-fatal write failures are an explicit policy
//!   ([`executor::WritePolicy`]), not control flow
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use talk_ingest_core::{adapters::InMemoryEntityStore, IngestPipeline};
//!
//! let store = Arc::new(InMemoryEntityStore::new());
//! let pipeline = IngestPipeline::new(store);
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Upstream-assigned identifier of a webhook event
///
/// Unlike entity ids this is the audit log key, so it must never be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create new event ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ParseError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ParseError::InvalidFormat {
                expected: "non-empty event id".to_string(),
                actual: value,
            });
        }
        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier for tracing one pipeline invocation across log lines
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Parse an upstream `...UTC` field
    ///
    /// The chat platform sends RFC3339 strings, but some deliveries omit the
    /// offset; a bare `YYYY-MM-DDTHH:MM:SS[.fff]` is read as UTC.
    pub fn from_utc_str(s: &str) -> Result<Self, ParseError> {
        if let Ok(ts) = Self::from_rfc3339(s) {
            return Ok(ts);
        }

        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self(naive.and_utc()))
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 or naive UTC datetime".to_string(),
                actual: s.to_string(),
            })
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures; the sender should redeliver
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Error taxonomy for the ingestion pipeline
pub mod error;

/// Webhook envelope decoding
pub mod envelope;

mod fields;

/// Normalized entity records
pub mod entities;

/// Payload to entity-record mapping
pub mod normalizer;

/// Store abstraction consumed by the executor and recorder
pub mod store;

/// Dependency-ordered upsert execution
pub mod executor;

/// Webhook log lifecycle
pub mod audit;

/// Pipeline entry point and replay
pub mod pipeline;

/// Built-in sample event used by the self-test endpoint
pub mod sample;

/// Store adapters
pub mod adapters;

pub use audit::{AuditRecorder, ProcessingOutcome};
pub use entities::{EntityKind, EntityRef, NormalizedEvent, WebhookLogRecord};
pub use envelope::{parse_envelope, EventEnvelope};
pub use error::{
    AuditWriteWarning, DependencyFailure, IngestError, MalformedPayload, TagWriteWarning,
};
pub use executor::{ExecutionReport, UpsertExecutor, WritePolicy};
pub use normalizer::{normalize, Normalization};
pub use pipeline::{IngestPipeline, PipelineOutcome, PipelineResult, ReplayError};
pub use store::{EntityStore, StoreError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
