//! # Webhook Envelope Parsing
//!
//! Decodes the top-level wrapper (`Type`, `EventDate`, `EventId`, `Payload`)
//! of a chat-platform webhook. Only the wrapper is validated here; whether the
//! nested payload is a supported chat event is decided by the normalizer.

use crate::{error::MalformedPayload, fields::Node, EventId, Timestamp};
use serde::Serialize;
use serde_json::Value;

/// Envelope type carrying chat updates
pub const MESSAGE_EVENT_TYPE: &str = "Message";

/// Payload type carrying a full chat snapshot
pub const CHAT_PAYLOAD_TYPE: &str = "Chat";

/// Validated webhook envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    pub event_date: Timestamp,
    /// The nested `Payload` object
    pub payload: Value,
    /// The full body exactly as received, kept for the audit log
    pub raw: Value,
}

impl EventEnvelope {
    /// `Payload.Type`, when present as a string
    pub fn payload_type(&self) -> Option<&str> {
        self.payload.get("Type").and_then(Value::as_str)
    }

    /// Whether the normalizer handles this envelope
    pub fn is_chat_message(&self) -> bool {
        self.event_type == MESSAGE_EVENT_TYPE && self.payload_type() == Some(CHAT_PAYLOAD_TYPE)
    }
}

/// Parse raw request bytes into an envelope
pub fn parse_envelope(body: &[u8]) -> Result<EventEnvelope, MalformedPayload> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| MalformedPayload::InvalidJson {
        message: e.to_string(),
    })?;
    envelope_from_value(raw)
}

/// Validate an already-decoded JSON value as an envelope
///
/// Used for replay, where the payload comes back from the audit log.
pub fn envelope_from_value(raw: Value) -> Result<EventEnvelope, MalformedPayload> {
    if !raw.is_object() {
        return Err(MalformedPayload::InvalidJson {
            message: "envelope must be a JSON object".to_string(),
        });
    }

    let root = Node::root(&raw);
    let event_id_raw = root.id("EventId")?;
    let event_id = EventId::new(event_id_raw)
        .map_err(|e| MalformedPayload::invalid("EventId", e.to_string()))?;
    let event_type = root.id("Type")?;
    let event_date = root.timestamp("EventDate")?;
    let payload = root.object("Payload")?.value().clone();

    Ok(EventEnvelope {
        event_id,
        event_type,
        event_date,
        payload,
        raw,
    })
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
