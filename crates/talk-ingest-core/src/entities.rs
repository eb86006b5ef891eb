//! # Normalized Entity Records
//!
//! Flat, table-shaped records produced by the normalizer. Field names follow
//! the relational columns; optional columns are `Option` and are never filled
//! with zero values.

use crate::{error::TagWriteWarning, EventId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tables written by the pipeline, in mandatory write order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Organization,
    Channel,
    Sector,
    OrganizationMember,
    Contact,
    Tag,
    ContactTag,
    Chat,
    Message,
}

impl EntityKind {
    /// Table name in the relational schema
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Organization => "organizations",
            Self::Channel => "channels",
            Self::Sector => "sectors",
            Self::OrganizationMember => "organization_members",
            Self::Contact => "contacts",
            Self::Tag => "tags",
            Self::ContactTag => "contact_tags",
            Self::Chat => "chats",
            Self::Message => "messages",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Organization => "Organization",
            Self::Channel => "Channel",
            Self::Sector => "Sector",
            Self::OrganizationMember => "OrganizationMember",
            Self::Contact => "Contact",
            Self::Tag => "Tag",
            Self::ContactTag => "ContactTag",
            Self::Chat => "Chat",
            Self::Message => "Message",
        };
        f.write_str(name)
    }
}

/// One concrete row: its table and natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: String,
    pub name: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub organization_id: String,
    pub channel_type: String,
    pub phone_number: String,
    pub name: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub is_default: bool,
    pub order_index: i32,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationMemberRecord {
    pub id: String,
    pub organization_id: String,
    pub is_muted: bool,
    pub total_unread: i32,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub phone_number: String,
    pub profile_picture_url: Option<String>,
    pub is_blocked: bool,
    pub last_active_at: Option<Timestamp>,
    pub contact_type: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: String,
    pub name: String,
    pub color: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactTagRecord {
    pub contact_id: String,
    pub tag_id: String,
}

impl ContactTagRecord {
    /// Composite key rendered as a single string
    pub fn key(&self) -> String {
        format!("{}/{}", self.contact_id, self.tag_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub organization_id: String,
    pub contact_id: String,
    pub channel_id: String,
    pub sector_id: String,
    pub assigned_member_id: String,
    pub is_open: bool,
    pub is_private: bool,
    pub is_waiting: bool,
    pub waiting_since: Option<Timestamp>,
    pub total_unread: i32,
    pub first_contact_message_id: Option<String>,
    pub first_member_reply_id: Option<String>,
    pub first_contact_message_at: Option<Timestamp>,
    pub first_member_reply_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub contact_id: Option<String>,
    pub organization_member_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub source: String,
    pub message_state: String,
    pub is_private: bool,
    pub event_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A tag together with the link that attaches it to the event's contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub tag: TagRecord,
    pub link: ContactTagRecord,
}

/// Complete entity set derived from one chat event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub organization: OrganizationRecord,
    pub channel: ChannelRecord,
    pub sector: SectorRecord,
    pub member: OrganizationMemberRecord,
    pub contact: ContactRecord,
    pub tags: Vec<TagAssignment>,
    /// Tag entries dropped during normalization
    #[serde(default)]
    pub tag_warnings: Vec<TagWriteWarning>,
    pub chat: ChatRecord,
    pub message: MessageRecord,
}

/// Audit row for one received webhook event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookLogRecord {
    pub event_id: EventId,
    pub event_type: String,
    pub event_date: Timestamp,
    pub raw_payload: Option<serde_json::Value>,
    pub processed: bool,
    pub error_message: Option<String>,
    pub received_at: Timestamp,
}
