//! Tests for the dependency-ordered upsert executor.

use super::*;
use crate::{
    adapters::InMemoryEntityStore,
    envelope::envelope_from_value,
    normalizer::{normalize, Normalization},
    sample::sample_chat_event,
    Timestamp,
};

fn sample_event() -> NormalizedEvent {
    let envelope = envelope_from_value(sample_chat_event("evt_exec")).unwrap();
    match normalize(&envelope, Timestamp::now()).unwrap() {
        Normalization::Chat(event) => *event,
        other => panic!("expected chat normalization, got {:?}", other),
    }
}

fn setup() -> (Arc<InMemoryEntityStore>, UpsertExecutor) {
    let store = Arc::new(InMemoryEntityStore::new());
    let executor = UpsertExecutor::new(store.clone());
    (store, executor)
}

fn kinds(writes: &[EntityRef]) -> Vec<EntityKind> {
    writes.iter().map(|e| e.kind).collect()
}

#[test]
fn test_write_policy_per_kind() {
    assert_eq!(WritePolicy::for_kind(EntityKind::Tag), WritePolicy::BestEffort);
    assert_eq!(
        WritePolicy::for_kind(EntityKind::ContactTag),
        WritePolicy::BestEffort
    );

    for kind in [
        EntityKind::Organization,
        EntityKind::Channel,
        EntityKind::Sector,
        EntityKind::OrganizationMember,
        EntityKind::Contact,
        EntityKind::Chat,
        EntityKind::Message,
    ] {
        assert_eq!(WritePolicy::for_kind(kind), WritePolicy::Required);
    }
}

#[tokio::test]
async fn test_writes_follow_dependency_order() {
    let (store, executor) = setup();

    let report = executor.execute(&sample_event()).await.unwrap();

    let expected = vec![
        EntityKind::Organization,
        EntityKind::Channel,
        EntityKind::Sector,
        EntityKind::OrganizationMember,
        EntityKind::Contact,
        EntityKind::Tag,
        EntityKind::ContactTag,
        EntityKind::Tag,
        EntityKind::ContactTag,
        EntityKind::Chat,
        EntityKind::Message,
    ];
    assert_eq!(kinds(&store.writes()), expected);
    assert_eq!(kinds(&report.written), expected);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_contact_failure_aborts_before_chat() {
    let (store, executor) = setup();
    store.fail_on(EntityKind::Contact);

    let failure = executor.execute(&sample_event()).await.unwrap_err();

    assert_eq!(
        failure.entity,
        EntityRef::new(EntityKind::Contact, "contact_789")
    );
    assert!(failure.source.is_transient());

    let snapshot = store.snapshot();
    assert_eq!(snapshot.count(EntityKind::Organization), 1);
    assert_eq!(snapshot.count(EntityKind::OrganizationMember), 1);
    assert_eq!(snapshot.count(EntityKind::Contact), 0);
    assert_eq!(snapshot.count(EntityKind::Tag), 0);
    assert_eq!(snapshot.count(EntityKind::Chat), 0);
    assert_eq!(snapshot.count(EntityKind::Message), 0);
}

#[tokio::test]
async fn test_failed_tag_is_isolated() {
    let (store, executor) = setup();
    store.fail_on_id(EntityKind::Tag, "tag_1");

    let report = executor.execute(&sample_event()).await.unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(
        report.warnings[0].entity,
        EntityRef::new(EntityKind::Tag, "tag_1")
    );
    assert_eq!(report.written_count(EntityKind::Tag), 1);
    assert_eq!(report.written_count(EntityKind::ContactTag), 1);

    let snapshot = store.snapshot();
    assert!(snapshot.tags.contains_key("tag_2"));
    assert!(!snapshot.tags.contains_key("tag_1"));
    // The link to the failed tag is never attempted
    assert!(!snapshot
        .contact_tags
        .contains(&("contact_789".to_string(), "tag_1".to_string())));
    assert_eq!(snapshot.count(EntityKind::Chat), 1);
    assert_eq!(snapshot.count(EntityKind::Message), 1);
}

#[tokio::test]
async fn test_normalization_warnings_lead_the_report() {
    let (store, executor) = setup();
    let mut event = sample_event();
    let skipped = TagWriteWarning {
        entity: EntityRef::new(EntityKind::Tag, "Payload.Content.Contact.Tags[2]"),
        message: "Required field missing: Payload.Content.Contact.Tags[2].Id".to_string(),
    };
    event.tag_warnings.push(skipped.clone());
    store.fail_on_id(EntityKind::Tag, "tag_2");

    let report = executor.execute(&event).await.unwrap();

    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0], skipped);
    assert_eq!(report.warnings[1].entity, EntityRef::new(EntityKind::Tag, "tag_2"));
    assert!(!report.is_clean());
    assert_eq!(store.snapshot().count(EntityKind::Message), 1);
}

#[tokio::test]
async fn test_failed_contact_tag_is_warning() {
    let (store, executor) = setup();
    store.fail_on_id(EntityKind::ContactTag, "contact_789/tag_2");

    let report = executor.execute(&sample_event()).await.unwrap();

    assert!(!report.is_clean());
    assert_eq!(
        report.warnings[0].entity,
        EntityRef::new(EntityKind::ContactTag, "contact_789/tag_2")
    );
    assert_eq!(report.written_count(EntityKind::Tag), 2);
    assert_eq!(store.snapshot().count(EntityKind::ContactTag), 1);
    assert_eq!(store.snapshot().count(EntityKind::Message), 1);
}

#[tokio::test]
async fn test_chat_failure_leaves_no_message() {
    let (store, executor) = setup();
    store.fail_on(EntityKind::Chat);

    let failure = executor.execute(&sample_event()).await.unwrap_err();

    assert_eq!(failure.entity.kind, EntityKind::Chat);
    assert!(failure.to_string().contains("chat_456789"));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.count(EntityKind::Contact), 1);
    assert_eq!(snapshot.count(EntityKind::Tag), 2);
    assert_eq!(snapshot.count(EntityKind::Message), 0);
}

#[tokio::test]
async fn test_message_failure_is_fatal() {
    let (store, executor) = setup();
    store.fail_on(EntityKind::Message);

    let failure = executor.execute(&sample_event()).await.unwrap_err();

    assert_eq!(
        failure.entity,
        EntityRef::new(EntityKind::Message, "msg_12345")
    );
    assert_eq!(store.snapshot().count(EntityKind::Chat), 1);
}

#[tokio::test]
async fn test_event_without_tags_writes_seven_entities() {
    let (store, executor) = setup();
    let mut event = sample_event();
    event.tags.clear();

    let report = executor.execute(&event).await.unwrap();

    assert_eq!(report.written.len(), 7);
    assert_eq!(store.snapshot().entity_rows(), 7);
}

#[tokio::test]
async fn test_repeated_execution_is_idempotent() {
    let (store, executor) = setup();
    let event = sample_event();

    executor.execute(&event).await.unwrap();
    let first = store.snapshot();
    executor.execute(&event).await.unwrap();
    let second = store.snapshot();

    assert_eq!(first, second);
}
