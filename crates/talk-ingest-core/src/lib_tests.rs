//! Tests for the talk-ingest-core library module.

use super::*;

#[test]
fn test_event_id_validation() {
    let id = EventId::new("evt_001").unwrap();
    assert_eq!(id.as_str(), "evt_001");
    assert_eq!(id.to_string(), "evt_001");

    assert!(matches!(
        EventId::new(""),
        Err(ParseError::InvalidFormat { .. })
    ));
    assert!(EventId::new("   ").is_err());
}

#[test]
fn test_event_id_from_str() {
    let id: EventId = "evt_42".parse().unwrap();
    assert_eq!(id, EventId::new("evt_42").unwrap());
}

#[test]
fn test_event_id_serializes_as_plain_string() {
    let id = EventId::new("evt_1").unwrap();
    assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("evt_1"));
}

#[test]
fn test_correlation_id_generation() {
    let id1 = CorrelationId::new();
    let id2 = CorrelationId::new();

    assert_ne!(id1, id2);
    assert!(!id1.to_string().is_empty());
}

#[test]
fn test_timestamp_rfc3339_parsing() {
    let ts = Timestamp::from_rfc3339("2024-01-15T10:30:00Z").unwrap();
    assert_eq!(ts.to_rfc3339(), "2024-01-15T10:30:00+00:00");

    let offset = Timestamp::from_rfc3339("2024-01-15T07:30:00-03:00").unwrap();
    assert_eq!(ts, offset);

    assert!(Timestamp::from_rfc3339("not a date").is_err());
}

#[test]
fn test_timestamp_without_offset_is_utc() {
    let naive = Timestamp::from_utc_str("2024-01-15T10:30:00").unwrap();
    let explicit = Timestamp::from_utc_str("2024-01-15T10:30:00Z").unwrap();
    assert_eq!(naive, explicit);

    let fractional = Timestamp::from_utc_str("2024-01-15T10:30:00.250").unwrap();
    assert!(fractional > explicit);

    assert!(Timestamp::from_utc_str("15/01/2024").is_err());
}
