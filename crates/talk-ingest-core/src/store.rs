//! # Entity Store Interface
//!
//! The relational store consumed by the pipeline. Every entity write is a
//! keyed upsert (insert-or-update, last write wins); nothing is ever deleted.
//! Coordination between concurrent deliveries is left entirely to the
//! store's per-row upsert semantics.

use crate::{
    entities::{
        ChannelRecord, ChatRecord, ContactRecord, ContactTagRecord, MessageRecord,
        OrganizationMemberRecord, OrganizationRecord, SectorRecord, TagRecord, WebhookLogRecord,
    },
    EventId,
};
use async_trait::async_trait;

/// Errors reported by store implementations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Store not available: {message}")]
    Unavailable { message: String },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Row not found: {key}")]
    NotFound { key: String },
}

impl StoreError {
    /// Check if store error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::OperationFailed { .. } => true,
            Self::Unavailable { .. } => true,
            Self::ConstraintViolation { .. } => false,
            Self::NotFound { .. } => false,
        }
    }
}

/// Upsert-by-key access to the ten ingestion tables
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn upsert_organization(&self, record: &OrganizationRecord) -> Result<(), StoreError>;

    async fn upsert_channel(&self, record: &ChannelRecord) -> Result<(), StoreError>;

    async fn upsert_sector(&self, record: &SectorRecord) -> Result<(), StoreError>;

    async fn upsert_member(&self, record: &OrganizationMemberRecord) -> Result<(), StoreError>;

    async fn upsert_contact(&self, record: &ContactRecord) -> Result<(), StoreError>;

    async fn upsert_tag(&self, record: &TagRecord) -> Result<(), StoreError>;

    /// Link a contact to a tag; a second insert of the same pair is a no-op
    async fn upsert_contact_tag(&self, record: &ContactTagRecord) -> Result<(), StoreError>;

    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), StoreError>;

    async fn upsert_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Insert a webhook log row unless one already exists for the event
    ///
    /// Returns `true` when a new row was created.
    async fn insert_webhook_log(&self, record: &WebhookLogRecord) -> Result<bool, StoreError>;

    /// Update the processing status of an existing webhook log row
    async fn update_webhook_log(
        &self,
        event_id: &EventId,
        processed: bool,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn get_webhook_log(&self, event_id: &EventId)
        -> Result<Option<WebhookLogRecord>, StoreError>;

    /// Unprocessed rows, newest first
    async fn list_unprocessed_logs(&self, limit: usize)
        -> Result<Vec<WebhookLogRecord>, StoreError>;

    /// Cheap round trip used by readiness checks
    async fn ping(&self) -> Result<(), StoreError>;
}
