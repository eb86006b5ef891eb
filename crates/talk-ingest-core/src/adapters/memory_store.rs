//! # In-Memory Entity Store
//!
//! Thread-safe in-memory implementation for tests and local runs.
//! Supports injected failures per entity kind (optionally for a single id)
//! and records the order in which rows were written.

use crate::{
    entities::{
        ChannelRecord, ChatRecord, ContactRecord, ContactTagRecord, EntityKind, EntityRef,
        MessageRecord, OrganizationMemberRecord, OrganizationRecord, SectorRecord, TagRecord,
        WebhookLogRecord,
    },
    store::{EntityStore, StoreError},
    EventId,
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, PoisonError, RwLock},
};

/// Point-in-time copy of every table
///
/// Maps are ordered so two snapshots compare independently of insert order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub organizations: BTreeMap<String, OrganizationRecord>,
    pub channels: BTreeMap<String, ChannelRecord>,
    pub sectors: BTreeMap<String, SectorRecord>,
    pub members: BTreeMap<String, OrganizationMemberRecord>,
    pub contacts: BTreeMap<String, ContactRecord>,
    pub tags: BTreeMap<String, TagRecord>,
    pub contact_tags: BTreeSet<(String, String)>,
    pub chats: BTreeMap<String, ChatRecord>,
    pub messages: BTreeMap<String, MessageRecord>,
    pub webhook_logs: BTreeMap<EventId, WebhookLogRecord>,
}

impl StoreSnapshot {
    /// Number of rows in an entity table
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Organization => self.organizations.len(),
            EntityKind::Channel => self.channels.len(),
            EntityKind::Sector => self.sectors.len(),
            EntityKind::OrganizationMember => self.members.len(),
            EntityKind::Contact => self.contacts.len(),
            EntityKind::Tag => self.tags.len(),
            EntityKind::ContactTag => self.contact_tags.len(),
            EntityKind::Chat => self.chats.len(),
            EntityKind::Message => self.messages.len(),
        }
    }

    /// Total rows across all entity tables, excluding webhook logs
    pub fn entity_rows(&self) -> usize {
        [
            EntityKind::Organization,
            EntityKind::Channel,
            EntityKind::Sector,
            EntityKind::OrganizationMember,
            EntityKind::Contact,
            EntityKind::Tag,
            EntityKind::ContactTag,
            EntityKind::Chat,
            EntityKind::Message,
        ]
        .iter()
        .map(|kind| self.count(*kind))
        .sum()
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    kind: EntityKind,
    id: Option<String>,
}

#[derive(Debug, Default)]
struct Failures {
    rules: Vec<FailureRule>,
    audit: bool,
}

/// In-memory [`EntityStore`]
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<StoreSnapshot>>,
    writes: Arc<RwLock<Vec<EntityRef>>>,
    failures: Arc<RwLock<Failures>>,
}

impl InMemoryEntityStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write to the given table
    pub fn fail_on(&self, kind: EntityKind) {
        self.push_rule(FailureRule { kind, id: None });
    }

    /// Fail writes of a single row
    ///
    /// Contact/tag links are identified by `"{contact_id}/{tag_id}"`.
    pub fn fail_on_id(&self, kind: EntityKind, id: impl Into<String>) {
        self.push_rule(FailureRule {
            kind,
            id: Some(id.into()),
        });
    }

    /// Fail every webhook log insert and update
    pub fn fail_audit_writes(&self) {
        if let Ok(mut failures) = self.failures.write() {
            failures.audit = true;
        }
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.write() {
            *failures = Failures::default();
        }
    }

    /// Copy of all tables
    pub fn snapshot(&self) -> StoreSnapshot {
        self.tables
            .read()
            .map(|tables| tables.clone())
            .unwrap_or_default()
    }

    /// Successful entity writes in the order they were applied
    pub fn writes(&self) -> Vec<EntityRef> {
        self.writes
            .read()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    fn push_rule(&self, rule: FailureRule) {
        if let Ok(mut failures) = self.failures.write() {
            failures.rules.push(rule);
        }
    }

    fn check_entity(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let failures = self.failures.read().map_err(poisoned)?;
        let hit = failures
            .rules
            .iter()
            .any(|rule| rule.kind == kind && rule.id.as_deref().map_or(true, |r| r == id));
        if hit {
            return Err(StoreError::OperationFailed {
                message: format!("injected failure writing {} '{}'", kind.table_name(), id),
            });
        }
        Ok(())
    }

    fn check_audit(&self) -> Result<(), StoreError> {
        if self.failures.read().map_err(poisoned)?.audit {
            return Err(StoreError::Unavailable {
                message: "injected failure writing webhook_logs".to_string(),
            });
        }
        Ok(())
    }

    fn upsert<R: Clone>(
        &self,
        kind: EntityKind,
        id: &str,
        record: &R,
        table: impl FnOnce(&mut StoreSnapshot) -> &mut BTreeMap<String, R>,
    ) -> Result<(), StoreError> {
        self.check_entity(kind, id)?;
        {
            let mut tables = self.tables.write().map_err(poisoned)?;
            table(&mut tables).insert(id.to_string(), record.clone());
        }
        self.writes
            .write()
            .map_err(poisoned)?
            .push(EntityRef::new(kind, id));
        Ok(())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::OperationFailed {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn upsert_organization(&self, record: &OrganizationRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Organization, &record.id, record, |t| {
            &mut t.organizations
        })
    }

    async fn upsert_channel(&self, record: &ChannelRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Channel, &record.id, record, |t| &mut t.channels)
    }

    async fn upsert_sector(&self, record: &SectorRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Sector, &record.id, record, |t| &mut t.sectors)
    }

    async fn upsert_member(&self, record: &OrganizationMemberRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::OrganizationMember, &record.id, record, |t| {
            &mut t.members
        })
    }

    async fn upsert_contact(&self, record: &ContactRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Contact, &record.id, record, |t| &mut t.contacts)
    }

    async fn upsert_tag(&self, record: &TagRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Tag, &record.id, record, |t| &mut t.tags)
    }

    async fn upsert_contact_tag(&self, record: &ContactTagRecord) -> Result<(), StoreError> {
        let key = record.key();
        self.check_entity(EntityKind::ContactTag, &key)?;
        self.tables
            .write()
            .map_err(poisoned)?
            .contact_tags
            .insert((record.contact_id.clone(), record.tag_id.clone()));
        self.writes
            .write()
            .map_err(poisoned)?
            .push(EntityRef::new(EntityKind::ContactTag, key));
        Ok(())
    }

    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Chat, &record.id, record, |t| &mut t.chats)
    }

    async fn upsert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.upsert(EntityKind::Message, &record.id, record, |t| &mut t.messages)
    }

    async fn insert_webhook_log(&self, record: &WebhookLogRecord) -> Result<bool, StoreError> {
        self.check_audit()?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.webhook_logs.contains_key(&record.event_id) {
            return Ok(false);
        }
        tables
            .webhook_logs
            .insert(record.event_id.clone(), record.clone());
        Ok(true)
    }

    async fn update_webhook_log(
        &self,
        event_id: &EventId,
        processed: bool,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_audit()?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let row = tables
            .webhook_logs
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound {
                key: event_id.to_string(),
            })?;
        row.processed = processed;
        row.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn get_webhook_log(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookLogRecord>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.webhook_logs.get(event_id).cloned())
    }

    async fn list_unprocessed_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<WebhookLogRecord>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut rows: Vec<WebhookLogRecord> = tables
            .webhook_logs
            .values()
            .filter(|row| !row.processed)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _tables = self.tables.read().map_err(poisoned)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
