//! Tests for the in-memory entity store.

use super::*;
use crate::Timestamp;
use serde_json::json;

fn organization(id: &str, name: &str) -> OrganizationRecord {
    OrganizationRecord {
        id: id.to_string(),
        name: name.to_string(),
        updated_at: Timestamp::now(),
    }
}

fn log(event_id: &str, received_at: &str) -> WebhookLogRecord {
    WebhookLogRecord {
        event_id: EventId::new(event_id).unwrap(),
        event_type: "Message".to_string(),
        event_date: Timestamp::from_rfc3339("2024-01-15T10:30:00Z").unwrap(),
        raw_payload: Some(json!({ "EventId": event_id })),
        processed: false,
        error_message: None,
        received_at: Timestamp::from_rfc3339(received_at).unwrap(),
    }
}

#[tokio::test]
async fn test_upsert_overwrites_by_key() {
    let store = InMemoryEntityStore::new();

    store
        .upsert_organization(&organization("org_1", "First"))
        .await
        .unwrap();
    store
        .upsert_organization(&organization("org_1", "Second"))
        .await
        .unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.count(EntityKind::Organization), 1);
    assert_eq!(snapshot.organizations["org_1"].name, "Second");
    assert_eq!(store.writes().len(), 2);
}

#[tokio::test]
async fn test_contact_tag_insert_is_idempotent() {
    let store = InMemoryEntityStore::new();
    let link = ContactTagRecord {
        contact_id: "c_1".to_string(),
        tag_id: "t_1".to_string(),
    };

    store.upsert_contact_tag(&link).await.unwrap();
    store.upsert_contact_tag(&link).await.unwrap();

    assert_eq!(store.snapshot().count(EntityKind::ContactTag), 1);
    assert_eq!(
        store.writes()[0],
        EntityRef::new(EntityKind::ContactTag, "c_1/t_1")
    );
}

#[tokio::test]
async fn test_failure_injection_by_kind_and_id() {
    let store = InMemoryEntityStore::new();
    store.fail_on_id(EntityKind::Organization, "org_bad");

    assert!(store
        .upsert_organization(&organization("org_ok", "Ok"))
        .await
        .is_ok());
    let error = store
        .upsert_organization(&organization("org_bad", "Bad"))
        .await
        .unwrap_err();
    assert!(matches!(error, StoreError::OperationFailed { .. }));

    store.fail_on(EntityKind::Organization);
    assert!(store
        .upsert_organization(&organization("org_ok", "Ok"))
        .await
        .is_err());

    store.clear_failures();
    assert!(store
        .upsert_organization(&organization("org_bad", "Bad"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_webhook_log_insert_if_absent() {
    let store = InMemoryEntityStore::new();
    let record = log("evt_1", "2024-01-15T10:30:01Z");

    assert!(store.insert_webhook_log(&record).await.unwrap());

    let mut changed = record.clone();
    changed.event_type = "Other".to_string();
    assert!(!store.insert_webhook_log(&changed).await.unwrap());

    let stored = store
        .get_webhook_log(&record.event_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.event_type, "Message");
}

#[tokio::test]
async fn test_update_missing_log_is_not_found() {
    let store = InMemoryEntityStore::new();
    let event_id = EventId::new("evt_missing").unwrap();

    let error = store
        .update_webhook_log(&event_id, true, None)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        StoreError::NotFound {
            key: "evt_missing".to_string()
        }
    );
    assert!(!error.is_transient());
}

#[tokio::test]
async fn test_unprocessed_logs_newest_first() {
    let store = InMemoryEntityStore::new();
    store
        .insert_webhook_log(&log("evt_old", "2024-01-15T10:00:00Z"))
        .await
        .unwrap();
    store
        .insert_webhook_log(&log("evt_new", "2024-01-15T12:00:00Z"))
        .await
        .unwrap();
    store
        .insert_webhook_log(&log("evt_done", "2024-01-15T13:00:00Z"))
        .await
        .unwrap();
    store
        .update_webhook_log(&EventId::new("evt_done").unwrap(), true, None)
        .await
        .unwrap();

    let pending = store.list_unprocessed_logs(10).await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt_new", "evt_old"]);

    let limited = store.list_unprocessed_logs(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].event_id.as_str(), "evt_new");
}

#[tokio::test]
async fn test_audit_failure_injection() {
    let store = InMemoryEntityStore::new();
    store.fail_audit_writes();

    let error = store
        .insert_webhook_log(&log("evt_1", "2024-01-15T10:30:01Z"))
        .await
        .unwrap_err();
    assert!(matches!(error, StoreError::Unavailable { .. }));
    assert!(store.ping().await.is_ok());
}
