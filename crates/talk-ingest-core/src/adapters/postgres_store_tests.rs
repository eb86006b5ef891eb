//! Tests for the sqlx error mapping.

use super::*;

#[test]
fn test_pool_timeout_is_unavailable() {
    let error = store_error("upsert chat", sqlx::Error::PoolTimedOut);

    assert!(matches!(error, StoreError::Unavailable { ref message } if message.starts_with("upsert chat: ")));
    assert!(error.is_transient());
}

#[test]
fn test_closed_pool_and_io_are_unavailable() {
    let closed = store_error("ping", sqlx::Error::PoolClosed);
    assert!(matches!(closed, StoreError::Unavailable { .. }));

    let io = store_error(
        "ping",
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )),
    );
    assert!(matches!(io, StoreError::Unavailable { ref message } if message.contains("reset by peer")));
}

#[test]
fn test_row_not_found_keeps_context_as_key() {
    let error = store_error("get webhook log", sqlx::Error::RowNotFound);

    assert_eq!(
        error,
        StoreError::NotFound {
            key: "get webhook log".to_string()
        }
    );
    assert!(!error.is_transient());
}

#[test]
fn test_other_errors_are_operation_failures() {
    let error = store_error(
        "upsert message",
        sqlx::Error::Protocol("unexpected message type".to_string()),
    );

    match error {
        StoreError::OperationFailed { ref message } => {
            assert!(message.starts_with("upsert message: "));
            assert!(message.contains("unexpected message type"));
        }
        other => panic!("expected OperationFailed, got {:?}", other),
    }
    assert!(error.is_transient());
}
