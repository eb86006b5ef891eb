//! Built-in `Message`/`Chat` event used by the self-test endpoint and tests.

use chrono::Utc;
use serde_json::{json, Value};

/// Contact name carried by the sample event
pub const SAMPLE_CONTACT_NAME: &str = "João Silva";

/// Last message text carried by the sample event
pub const SAMPLE_MESSAGE_CONTENT: &str = "Olá, preciso de ajuda com meu pedido";

/// Fresh self-test event id: `event_test_{unix millis}`
pub fn test_event_id() -> String {
    format!("event_test_{}", Utc::now().timestamp_millis())
}

/// Sample chat envelope with two tags and no member reply yet
pub fn sample_chat_event(event_id: &str) -> Value {
    json!({
        "Type": "Message",
        "EventDate": "2024-01-15T10:30:00Z",
        "Payload": {
            "Type": "Chat",
            "Content": {
                "Organization": { "Id": "org_123456" },
                "Contact": {
                    "Id": "contact_789",
                    "Name": SAMPLE_CONTACT_NAME,
                    "PhoneNumber": "+5511999999999",
                    "ProfilePictureUrl": "https://example.com/avatar.jpg",
                    "IsBlocked": false,
                    "LastActiveUTC": "2024-01-15T10:29:00Z",
                    "ContactType": "DirectMessage",
                    "Tags": [
                        { "Id": "tag_1", "Name": "Cliente VIP" },
                        { "Id": "tag_2", "Name": "Suporte" }
                    ]
                },
                "Channel": {
                    "Id": "channel_whatsapp_001",
                    "Name": "WhatsApp Business",
                    "PhoneNumber": "+5511888888888",
                    "ChannelType": "WhatsApp"
                },
                "Sector": {
                    "Id": "sector_support",
                    "Name": "Suporte Técnico",
                    "Default": true,
                    "Order": 1
                },
                "OrganizationMember": {
                    "Id": "member_001",
                    "Muted": false,
                    "TotalUnread": 2
                },
                "LastMessage": {
                    "Id": "msg_12345",
                    "Content": SAMPLE_MESSAGE_CONTENT,
                    "MessageType": "Text",
                    "Source": "Contact",
                    "MessageState": "Sent",
                    "EventAtUTC": "2024-01-15T10:30:00Z",
                    "SentByOrganizationMember": null,
                    "IsPrivate": false
                },
                "Id": "chat_456789",
                "Open": true,
                "Private": false,
                "Waiting": true,
                "WaitingSinceUTC": "2024-01-15T10:30:00Z",
                "TotalUnread": 1,
                "EventAtUTC": "2024-01-15T10:30:00Z",
                "FirstContactMessage": {
                    "Id": "msg_12345",
                    "EventAtUTC": "2024-01-15T10:30:00Z"
                },
                "FirstMemberReplyMessage": null,
                "CreatedAtUTC": "2024-01-15T10:30:00Z"
            }
        },
        "EventId": event_id
    })
}
