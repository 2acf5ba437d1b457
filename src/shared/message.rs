/**
 * Chat Message Payloads
 *
 * DTOs carried inside `new_message` and `message_read` events. Messages are
 * persisted by the REST layer before the realtime core ever sees them; these
 * types only describe what gets pushed to connected clients.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Kind of chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text
    #[default]
    Text,
    /// Image, video or file reference
    Media,
}

/// A chat message as pushed in a `new_message` event
///
/// # Example
/// ```rust
/// use roomchat::shared::message::ChatMessage;
/// use uuid::Uuid;
///
/// let message = ChatMessage::text("msg-1", "room-1", Uuid::new_v4(), "Hello");
/// assert!(message.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message ID assigned by the store
    pub id: String,
    /// Chatroom the message was posted to
    pub chatroom_id: String,
    /// Sender's user ID
    pub sender_id: Uuid,
    /// Text or media
    #[serde(default)]
    pub message_type: MessageKind,
    /// Message text (caption for media)
    #[serde(default)]
    pub content: String,
    /// Location of the uploaded media, for media messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// When the message was persisted
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a text message stamped with the current time
    pub fn text(
        id: impl Into<String>,
        chatroom_id: impl Into<String>,
        sender_id: Uuid,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chatroom_id: chatroom_id.into(),
            sender_id,
            message_type: MessageKind::Text,
            content: content.into(),
            media_url: None,
            created_at: Utc::now(),
        }
    }

    /// Create a media message stamped with the current time
    pub fn media(
        id: impl Into<String>,
        chatroom_id: impl Into<String>,
        sender_id: Uuid,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chatroom_id: chatroom_id.into(),
            sender_id,
            message_type: MessageKind::Media,
            content: String::new(),
            media_url: Some(media_url.into()),
            created_at: Utc::now(),
        }
    }

    /// Check the fields a client relies on to render the message.
    ///
    /// Text messages need content, media messages need a media URL.
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.id.trim().is_empty() {
            return Err(SharedError::validation("id", "message id must not be empty"));
        }
        if self.chatroom_id.trim().is_empty() {
            return Err(SharedError::validation("chatroom_id", "chatroom id must not be empty"));
        }
        match self.message_type {
            MessageKind::Text if self.content.trim().is_empty() => Err(SharedError::validation(
                "content",
                "text message content must not be empty",
            )),
            MessageKind::Media if self.media_url.as_deref().map_or(true, str::is_empty) => Err(
                SharedError::validation("media_url", "media message requires a media url"),
            ),
            _ => Ok(()),
        }
    }
}

/// A read receipt as reported by the REST layer after it stored the read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadReceipt {
    /// Message that was read
    pub message_id: String,
    /// Chatroom of the message
    pub chatroom_id: String,
    /// Original sender of the message
    pub sender_id: Uuid,
    /// User who just read the message
    pub reader_id: Uuid,
    /// Everyone who has read the message so far, including `reader_id`
    pub read_by: Vec<Uuid>,
    /// When the read was stored
    pub read_at: DateTime<Utc>,
}

impl ReadReceipt {
    /// Whether every current member except the sender has read the message.
    ///
    /// Membership is the snapshot at the time of the read, so members who
    /// joined after the message was sent count as recipients too. A room
    /// with no recipients besides the sender is never "read by all".
    pub fn read_by_all(&self, members: &[Uuid]) -> bool {
        let mut recipients = members.iter().filter(|id| **id != self.sender_id).peekable();
        if recipients.peek().is_none() {
            return false;
        }
        recipients.all(|id| self.read_by.contains(id))
    }

    /// Payload of the `message_read` event
    pub fn to_payload(&self, members: &[Uuid]) -> serde_json::Value {
        serde_json::json!({
            "message_id": self.message_id,
            "chatroom_id": self.chatroom_id,
            "reader_id": self.reader_id,
            "read_by": self.read_by,
            "read_by_all": self.read_by_all(members),
            "read_at": self.read_at.to_rfc3339(),
        })
    }
}
