//! # Entity Normalizer
//!
//! Maps the nested `Payload.Content` of a chat event into one record per
//! table. All records of one event share a single `updated_at` stamp.

use crate::{
    entities::{
        ChannelRecord, ChatRecord, ContactRecord, ContactTagRecord, MessageRecord,
        EntityKind, EntityRef, NormalizedEvent, OrganizationMemberRecord, OrganizationRecord,
        SectorRecord, TagAssignment, TagRecord,
    },
    envelope::EventEnvelope,
    error::{MalformedPayload, TagWriteWarning},
    fields::Node,
    Timestamp,
};
use tracing::{debug, warn};

/// Color assigned to tags that arrive without one
pub const DEFAULT_TAG_COLOR: &str = "#3B82F6";

/// Result of normalizing an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Normalization {
    /// A `Message`/`Chat` event and its full entity set
    Chat(Box<NormalizedEvent>),

    /// Any other envelope; acknowledged without entity writes
    Unsupported {
        event_type: String,
        payload_type: Option<String>,
    },
}

/// Normalize an envelope into entity records
///
/// Unsupported envelope types are not errors. Only a supported event with a
/// missing or mistyped required field fails.
pub fn normalize(
    envelope: &EventEnvelope,
    updated_at: Timestamp,
) -> Result<Normalization, MalformedPayload> {
    if !envelope.is_chat_message() {
        return Ok(Normalization::Unsupported {
            event_type: envelope.event_type.clone(),
            payload_type: envelope.payload_type().map(str::to_string),
        });
    }

    let payload = Node::root(&envelope.payload);
    let content = payload.object("Content").map_err(qualify)?;
    let event = normalize_chat(&content, updated_at).map_err(qualify)?;

    debug!(
        event_id = %envelope.event_id,
        chat_id = %event.chat.id,
        tag_count = event.tags.len(),
        skipped_tags = event.tag_warnings.len(),
        "Chat event normalized"
    );

    Ok(Normalization::Chat(Box::new(event)))
}

/// Prefix field paths with `Payload.` so errors point into the envelope
fn qualify(error: MalformedPayload) -> MalformedPayload {
    match error {
        MalformedPayload::MissingField { field } => MalformedPayload::MissingField {
            field: format!("Payload.{}", field),
        },
        MalformedPayload::InvalidField { field, message } => MalformedPayload::InvalidField {
            field: format!("Payload.{}", field),
            message,
        },
        other => other,
    }
}

fn normalize_chat(
    content: &Node<'_>,
    updated_at: Timestamp,
) -> Result<NormalizedEvent, MalformedPayload> {
    let organization_id = content.object("Organization")?.id("Id")?;
    let organization = OrganizationRecord {
        name: format!("Organization {}", organization_id),
        id: organization_id.clone(),
        updated_at,
    };

    let channel_node = content.object("Channel")?;
    let channel = ChannelRecord {
        id: channel_node.id("Id")?,
        organization_id: organization_id.clone(),
        channel_type: channel_node.text("ChannelType")?,
        phone_number: channel_node.text("PhoneNumber")?,
        name: channel_node.text("Name")?,
        updated_at,
    };

    let sector_node = content.object("Sector")?;
    let sector = SectorRecord {
        id: sector_node.id("Id")?,
        organization_id: organization_id.clone(),
        name: sector_node.text("Name")?,
        is_default: sector_node.flag("Default")?,
        order_index: sector_node.counter("Order")?,
        updated_at,
    };

    let member_node = content.object("OrganizationMember")?;
    let member = OrganizationMemberRecord {
        id: member_node.id("Id")?,
        organization_id: organization_id.clone(),
        is_muted: member_node.flag("Muted")?,
        total_unread: member_node.counter("TotalUnread")?,
        updated_at,
    };

    let contact_node = content.object("Contact")?;
    let contact = ContactRecord {
        id: contact_node.id("Id")?,
        organization_id: organization_id.clone(),
        name: contact_node.text("Name")?,
        phone_number: contact_node.text("PhoneNumber")?,
        profile_picture_url: contact_node.optional_string("ProfilePictureUrl")?,
        is_blocked: contact_node.flag("IsBlocked")?,
        last_active_at: contact_node.optional_timestamp("LastActiveUTC")?,
        contact_type: contact_node.text("ContactType")?,
        updated_at,
    };

    let (tags, tag_warnings) = normalize_tags(&contact_node, &contact.id, updated_at)?;

    let first_contact = content.optional_object("FirstContactMessage")?;
    let first_reply = content.optional_object("FirstMemberReplyMessage")?;

    let chat = ChatRecord {
        id: content.id("Id")?,
        organization_id,
        contact_id: contact.id.clone(),
        channel_id: channel.id.clone(),
        sector_id: sector.id.clone(),
        assigned_member_id: member.id.clone(),
        is_open: content.flag("Open")?,
        is_private: content.flag("Private")?,
        is_waiting: content.flag("Waiting")?,
        waiting_since: content.optional_timestamp("WaitingSinceUTC")?,
        total_unread: content.counter("TotalUnread")?,
        first_contact_message_id: optional_id(first_contact.as_ref())?,
        first_member_reply_id: optional_id(first_reply.as_ref())?,
        first_contact_message_at: optional_event_at(first_contact.as_ref())?,
        first_member_reply_at: optional_event_at(first_reply.as_ref())?,
        updated_at,
    };

    let message_node = content.object("LastMessage")?;
    let message = MessageRecord {
        id: message_node.id("Id")?,
        chat_id: chat.id.clone(),
        contact_id: Some(contact.id.clone()),
        organization_member_id: message_node.optional_string("SentByOrganizationMember")?,
        content: message_node.text("Content")?,
        message_type: message_node.text("MessageType")?,
        source: message_node.text("Source")?,
        message_state: message_node.text("MessageState")?,
        is_private: message_node.flag("IsPrivate")?,
        event_at: message_node.timestamp("EventAtUTC")?,
        updated_at,
    };

    Ok(NormalizedEvent {
        organization,
        channel,
        sector,
        member,
        contact,
        tags,
        tag_warnings,
        chat,
        message,
    })
}

/// Tag assignments for the contact
///
/// An entry with a missing or mistyped field is skipped with a warning so
/// the remaining tags, the chat and the message are still written. Only a
/// `Tags` value that is not an array fails the event.
fn normalize_tags(
    contact: &Node<'_>,
    contact_id: &str,
    updated_at: Timestamp,
) -> Result<(Vec<TagAssignment>, Vec<TagWriteWarning>), MalformedPayload> {
    let mut tags = Vec::new();
    let mut warnings = Vec::new();

    for (index, value) in contact.list("Tags")?.iter().enumerate() {
        let node = contact.element("Tags", index, value);
        match normalize_tag(&node, contact_id, updated_at) {
            Ok(assignment) => tags.push(assignment),
            Err(e) => {
                let e = qualify(e);
                let entity = EntityRef::new(EntityKind::Tag, format!("Payload.{}", node.path()));
                warn!(entity = %entity, error = %e, "Invalid tag entry, skipping");
                warnings.push(TagWriteWarning {
                    entity,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok((tags, warnings))
}

fn normalize_tag(
    node: &Node<'_>,
    contact_id: &str,
    updated_at: Timestamp,
) -> Result<TagAssignment, MalformedPayload> {
    let tag_id = node.id("Id")?;
    Ok(TagAssignment {
        tag: TagRecord {
            id: tag_id.clone(),
            name: node.text("Name")?,
            color: node
                .optional_string("Color")?
                .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
            updated_at,
        },
        link: ContactTagRecord {
            contact_id: contact_id.to_string(),
            tag_id,
        },
    })
}

fn optional_id(node: Option<&Node<'_>>) -> Result<Option<String>, MalformedPayload> {
    node.map(|n| n.optional_string("Id"))
        .transpose()
        .map(Option::flatten)
}

fn optional_event_at(node: Option<&Node<'_>>) -> Result<Option<Timestamp>, MalformedPayload> {
    node.map(|n| n.optional_timestamp("EventAtUTC"))
        .transpose()
        .map(Option::flatten)
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
