//! # Dependency-Ordered Upsert Executor
//!
//! Persists a [`NormalizedEvent`] in foreign-key order:
//!
//! ```text
//! Organization → Channel → Sector → OrganizationMember → Contact
//!     → (Tag → ContactTag)* → Chat → Message
//! ```
//!
//! Each entity kind carries a [`WritePolicy`]. A `Required` write that fails
//! aborts the remaining writes with a [`DependencyFailure`]; a `BestEffort`
//! write that fails becomes a [`TagWriteWarning`] in the [`ExecutionReport`],
//! after any tag entries the normalizer already dropped. Nothing already
//! written is rolled back.

use crate::{
    entities::{EntityKind, EntityRef, NormalizedEvent, TagAssignment},
    error::{DependencyFailure, TagWriteWarning},
    store::{EntityStore, StoreError},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a failed write of an entity kind affects the rest of the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WritePolicy {
    /// Failure aborts the event
    Required,
    /// Failure is recorded and the event continues
    BestEffort,
}

impl WritePolicy {
    /// Policy applied to each table
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Tag | EntityKind::ContactTag => Self::BestEffort,
            EntityKind::Organization
            | EntityKind::Channel
            | EntityKind::Sector
            | EntityKind::OrganizationMember
            | EntityKind::Contact
            | EntityKind::Chat
            | EntityKind::Message => Self::Required,
        }
    }
}

/// Tagged result of a single entity write that did not abort the event
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written(EntityRef),
    Skipped(TagWriteWarning),
}

/// Apply the entity's policy to a raw store result
fn settle(
    entity: EntityRef,
    result: Result<(), StoreError>,
) -> Result<WriteOutcome, DependencyFailure> {
    match (result, WritePolicy::for_kind(entity.kind)) {
        (Ok(()), _) => Ok(WriteOutcome::Written(entity)),
        (Err(source), WritePolicy::BestEffort) => {
            warn!(entity = %entity, error = %source, "Best-effort write failed, skipping");
            Ok(WriteOutcome::Skipped(TagWriteWarning {
                entity,
                message: source.to_string(),
            }))
        }
        (Err(source), WritePolicy::Required) => Err(DependencyFailure { entity, source }),
    }
}

/// Aggregate of all non-fatal outcomes for one event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Entities written, in write order
    pub written: Vec<EntityRef>,
    pub warnings: Vec<TagWriteWarning>,
}

impl ExecutionReport {
    fn record(&mut self, outcome: WriteOutcome) -> bool {
        match outcome {
            WriteOutcome::Written(entity) => {
                self.written.push(entity);
                true
            }
            WriteOutcome::Skipped(warning) => {
                self.warnings.push(warning);
                false
            }
        }
    }

    /// Whether every write succeeded
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of rows written for a table
    pub fn written_count(&self, kind: EntityKind) -> usize {
        self.written.iter().filter(|e| e.kind == kind).count()
    }
}

/// Writes normalized events through an injected store
#[derive(Clone)]
pub struct UpsertExecutor {
    store: Arc<dyn EntityStore>,
}

impl UpsertExecutor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Persist all entities of one event
    ///
    /// # Errors
    ///
    /// Returns [`DependencyFailure`] naming the first required entity whose
    /// write failed. Writes issued before the failure remain in the store.
    pub async fn execute(
        &self,
        event: &NormalizedEvent,
    ) -> Result<ExecutionReport, DependencyFailure> {
        let mut report = ExecutionReport {
            written: Vec::new(),
            warnings: event.tag_warnings.clone(),
        };
        let store = self.store.as_ref();

        report.record(settle(
            EntityRef::new(EntityKind::Organization, &event.organization.id),
            store.upsert_organization(&event.organization).await,
        )?);
        report.record(settle(
            EntityRef::new(EntityKind::Channel, &event.channel.id),
            store.upsert_channel(&event.channel).await,
        )?);
        report.record(settle(
            EntityRef::new(EntityKind::Sector, &event.sector.id),
            store.upsert_sector(&event.sector).await,
        )?);
        report.record(settle(
            EntityRef::new(EntityKind::OrganizationMember, &event.member.id),
            store.upsert_member(&event.member).await,
        )?);
        report.record(settle(
            EntityRef::new(EntityKind::Contact, &event.contact.id),
            store.upsert_contact(&event.contact).await,
        )?);

        for assignment in &event.tags {
            self.write_tag(assignment, &mut report).await?;
        }

        report.record(settle(
            EntityRef::new(EntityKind::Chat, &event.chat.id),
            store.upsert_chat(&event.chat).await,
        )?);
        report.record(settle(
            EntityRef::new(EntityKind::Message, &event.message.id),
            store.upsert_message(&event.message).await,
        )?);

        debug!(
            written = report.written.len(),
            warnings = report.warnings.len(),
            "Entity writes complete"
        );

        Ok(report)
    }

    async fn write_tag(
        &self,
        assignment: &TagAssignment,
        report: &mut ExecutionReport,
    ) -> Result<(), DependencyFailure> {
        let tag_written = report.record(settle(
            EntityRef::new(EntityKind::Tag, &assignment.tag.id),
            self.store.upsert_tag(&assignment.tag).await,
        )?);

        // A link to a tag row that may not exist is never attempted
        if tag_written {
            report.record(settle(
                EntityRef::new(EntityKind::ContactTag, assignment.link.key()),
                self.store.upsert_contact_tag(&assignment.link).await,
            )?);
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
