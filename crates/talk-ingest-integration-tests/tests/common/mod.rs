//! Common test utilities for talk-ingest-api integration tests
//!
//! This module provides:
//! - A store double that can be switched offline
//! - Helpers for building the router over a fresh store
//! - Webhook payload builders

use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use talk_ingest_api::{create_router, AppState, ServiceConfig};
use talk_ingest_core::{
    adapters::InMemoryEntityStore,
    entities::{
        ChannelRecord, ChatRecord, ContactRecord, ContactTagRecord, MessageRecord,
        OrganizationMemberRecord, OrganizationRecord, SectorRecord, TagRecord, WebhookLogRecord,
    },
    EntityStore, EventId, IngestPipeline, StoreError,
};

// ============================================================================
// Switchable Store
// ============================================================================

/// In-memory store that reports `Unavailable` for every call while offline
#[derive(Clone, Default)]
pub struct SwitchableStore {
    inner: InMemoryEntityStore,
    offline: Arc<AtomicBool>,
}

impl SwitchableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryEntityStore {
        &self.inner
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityStore for SwitchableStore {
    async fn upsert_organization(&self, record: &OrganizationRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_organization(record).await
    }

    async fn upsert_channel(&self, record: &ChannelRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_channel(record).await
    }

    async fn upsert_sector(&self, record: &SectorRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_sector(record).await
    }

    async fn upsert_member(&self, record: &OrganizationMemberRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_member(record).await
    }

    async fn upsert_contact(&self, record: &ContactRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_contact(record).await
    }

    async fn upsert_tag(&self, record: &TagRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_tag(record).await
    }

    async fn upsert_contact_tag(&self, record: &ContactTagRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_contact_tag(record).await
    }

    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_chat(record).await
    }

    async fn upsert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_message(record).await
    }

    async fn insert_webhook_log(&self, record: &WebhookLogRecord) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.insert_webhook_log(record).await
    }

    async fn update_webhook_log(
        &self,
        event_id: &EventId,
        processed: bool,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .update_webhook_log(event_id, processed, error_message)
            .await
    }

    async fn get_webhook_log(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookLogRecord>, StoreError> {
        self.check()?;
        self.inner.get_webhook_log(event_id).await
    }

    async fn list_unprocessed_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<WebhookLogRecord>, StoreError> {
        self.check()?;
        self.inner.list_unprocessed_logs(limit).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.ping().await
    }
}

// ============================================================================
// Router helpers
// ============================================================================

/// Router over a fresh in-memory store with default configuration
#[allow(dead_code)]
pub fn create_test_app() -> (InMemoryEntityStore, Router) {
    let store = InMemoryEntityStore::new();
    let pipeline = Arc::new(IngestPipeline::new(Arc::new(store.clone())));
    let app = create_router(AppState::new(ServiceConfig::default(), pipeline));
    (store, app)
}

/// Router over a store that can be switched offline
#[allow(dead_code)]
pub fn create_switchable_app() -> (SwitchableStore, Router) {
    let store = SwitchableStore::new();
    let pipeline = Arc::new(IngestPipeline::new(Arc::new(store.clone())));
    let app = create_router(AppState::new(ServiceConfig::default(), pipeline));
    (store, app)
}

#[allow(dead_code)]
pub fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Payload builders
// ============================================================================

/// Chat event with one contact, no tags and a contact-sent message
#[allow(dead_code)]
pub fn chat_event(event_id: &str) -> Value {
    json!({
        "Type": "Message",
        "EventDate": "2024-03-01T12:00:00Z",
        "EventId": event_id,
        "Payload": {
            "Type": "Chat",
            "Content": {
                "Organization": { "Id": "org_1" },
                "Contact": { "Id": "c_1", "Name": "A", "PhoneNumber": "+1", "Tags": [] },
                "Channel": { "Id": "ch_1", "Name": "Main", "PhoneNumber": "+2", "ChannelType": "WhatsApp" },
                "Sector": { "Id": "s_1", "Name": "Sales" },
                "OrganizationMember": { "Id": "m_1" },
                "Id": "chat_1",
                "LastMessage": {
                    "Id": "msg_1",
                    "Content": "hi",
                    "MessageType": "Text",
                    "Source": "Contact",
                    "MessageState": "Sent",
                    "EventAtUTC": "2024-03-01T12:00:00Z"
                }
            }
        }
    })
}
