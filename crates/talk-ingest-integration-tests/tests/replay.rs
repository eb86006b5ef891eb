//! Integration tests for the admin replay workflow

mod common;

use axum::http::StatusCode;
use common::{chat_event, create_switchable_app, get, json_body, post};
use talk_ingest_core::{EntityKind, EventId};
use tower::ServiceExt;

/// Verify that an event failed by an outage can be replayed once the store recovers
#[tokio::test]
async fn test_replay_after_outage() {
    // Arrange
    let (store, app) = create_switchable_app();
    store.inner().fail_on(EntityKind::Message);
    app.clone()
        .oneshot(post("/api/webhook", chat_event("evt_r1").to_string()))
        .await
        .unwrap();

    let pending = json_body(
        app.clone()
            .oneshot(get("/admin/events/pending"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(pending["total"], 1);
    assert!(pending["events"][0]["error_message"]
        .as_str()
        .unwrap()
        .contains("msg_1"));

    // Act
    store.inner().clear_failures();
    let response = app
        .clone()
        .oneshot(post("/admin/events/evt_r1/replay", ""))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["eventId"], "evt_r1");

    let snapshot = store.inner().snapshot();
    assert_eq!(snapshot.count(EntityKind::Message), 1);
    let log = &snapshot.webhook_logs[&EventId::new("evt_r1").unwrap()];
    assert!(log.processed);
    assert_eq!(log.error_message, None);

    let pending = json_body(app.oneshot(get("/admin/events/pending")).await.unwrap()).await;
    assert_eq!(pending["total"], 0);
}

/// Verify replay status codes for unknown and processed events
#[tokio::test]
async fn test_replay_status_codes() {
    // Arrange
    let (_store, app) = create_switchable_app();
    app.clone()
        .oneshot(post("/api/webhook", chat_event("evt_ok").to_string()))
        .await
        .unwrap();

    // Act
    let unknown = app
        .clone()
        .oneshot(post("/admin/events/evt_nope/replay", ""))
        .await
        .unwrap();
    let processed = app
        .oneshot(post("/admin/events/evt_ok/replay", ""))
        .await
        .unwrap();

    // Assert
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(processed.status(), StatusCode::CONFLICT);
}

/// Verify that listing pending events during an outage is a retryable 503
#[tokio::test]
async fn test_pending_during_outage() {
    // Arrange
    let (store, app) = create_switchable_app();
    store.set_offline(true);

    // Act
    let response = app.oneshot(get("/admin/events/pending")).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["Retry-After"], "60");
}
