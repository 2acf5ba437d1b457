/**
 * Realtime Wire Events
 *
 * Every frame exchanged over the realtime WebSocket is a JSON object of the
 * shape `{"type": string, "chatroom_id": string (optional), "data": object}`.
 *
 * Inbound (client → server) types recognised by the server are `heartbeat`
 * and `ping`; anything else is ignored so older servers keep working with
 * newer clients. Outbound (server → client) types are listed in `EventType`.
 */
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::message::{ChatMessage, ReadReceipt};

/// Outbound event type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Sent once after the connection is registered
    Connected,
    /// A message was persisted in a chatroom
    NewMessage,
    /// Read status of a message changed
    MessageRead,
    /// Unread counter of a chatroom changed for the receiving user
    UnreadCountUpdate,
    /// Reply to an inbound `heartbeat`
    HeartbeatAck,
    /// Reply to an inbound `ping`
    Pong,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::NewMessage => "new_message",
            Self::MessageRead => "message_read",
            Self::UnreadCountUpdate => "unread_count_update",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Pong => "pong",
        }
    }

    /// Whether the event may be fanned out through `Notify`.
    ///
    /// `connected` and the heartbeat replies are per-connection and only
    /// ever produced by the connection's own session.
    pub fn is_broadcastable(&self) -> bool {
        matches!(
            self,
            Self::NewMessage | Self::MessageRead | Self::UnreadCountUpdate
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of an inbound frame's `type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Application heartbeat, answered with `heartbeat_ack`
    Heartbeat,
    /// Application ping, answered with `pong`
    Ping,
    /// Anything else; ignored
    Unknown(String),
}

impl InboundKind {
    /// Classify a wire `type` value
    pub fn parse(kind: &str) -> Self {
        match kind {
            "heartbeat" => Self::Heartbeat,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The reply the server owes for this frame, if any
    pub fn reply(&self) -> Option<EventType> {
        match self {
            Self::Heartbeat => Some(EventType::HeartbeatAck),
            Self::Ping => Some(EventType::Pong),
            Self::Unknown(_) => None,
        }
    }

    /// Whether this frame proves the client is alive
    pub fn is_liveness(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A single JSON frame on the realtime socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    /// Frame type (`new_message`, `heartbeat`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Chatroom the frame relates to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatroom_id: Option<String>,
    /// Frame payload
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl WireMessage {
    /// Decode a text frame.
    ///
    /// Fails on malformed JSON or an empty `type`; an unrecognised `type`
    /// decodes fine and classifies as `InboundKind::Unknown`.
    pub fn decode(text: &str) -> Result<Self, SharedError> {
        let message: WireMessage = serde_json::from_str(text)?;
        if message.kind.trim().is_empty() {
            return Err(SharedError::validation("type", "frame type must not be empty"));
        }
        Ok(message)
    }

    /// Encode as a JSON text frame
    pub fn encode(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Classify the frame for inbound handling
    pub fn inbound_kind(&self) -> InboundKind {
        InboundKind::parse(&self.kind)
    }
}

/// Transient event handed to the dispatcher.
///
/// Constructed per mutation, fanned out to the resolved audience and then
/// dropped. Target user IDs are resolved at dispatch time and never stored
/// here.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    /// Type of event
    pub event_type: EventType,
    /// Chatroom the event belongs to
    pub chatroom_id: Option<String>,
    /// Event payload
    pub payload: Value,
}

impl BroadcastEvent {
    /// Create a new event
    pub fn new(event_type: EventType, chatroom_id: Option<String>, payload: Value) -> Self {
        Self {
            event_type,
            chatroom_id,
            payload,
        }
    }

    /// Greeting sent to a freshly registered connection
    pub fn connected(connection_id: Uuid, user_id: Uuid, chatroom_id: Option<String>) -> Self {
        Self::new(
            EventType::Connected,
            chatroom_id.clone(),
            serde_json::json!({
                "connection_id": connection_id,
                "user_id": user_id,
                "chatroom_id": chatroom_id,
            }),
        )
    }

    /// A message was sent to its chatroom
    pub fn new_message(message: &ChatMessage) -> Result<Self, SharedError> {
        Ok(Self::new(
            EventType::NewMessage,
            Some(message.chatroom_id.clone()),
            serde_json::to_value(message)?,
        ))
    }

    /// Read status of a message changed.
    ///
    /// `members` is the chatroom's current membership, used to decide
    /// whether every recipient has now read the message.
    pub fn message_read(receipt: &ReadReceipt, members: &[Uuid]) -> Self {
        Self::new(
            EventType::MessageRead,
            Some(receipt.chatroom_id.clone()),
            receipt.to_payload(members),
        )
    }

    /// The receiving user's unread counter for a chatroom changed
    pub fn unread_count_update(chatroom_id: impl Into<String>, unread_count: u64) -> Self {
        let chatroom_id = chatroom_id.into();
        Self::new(
            EventType::UnreadCountUpdate,
            Some(chatroom_id.clone()),
            serde_json::json!({
                "chatroom_id": chatroom_id,
                "unread_count": unread_count,
            }),
        )
    }

    /// Reply to an inbound heartbeat or ping
    pub fn reply(event_type: EventType) -> Self {
        Self::new(
            event_type,
            None,
            serde_json::json!({ "timestamp": chrono::Utc::now().to_rfc3339() }),
        )
    }

    /// Wire representation of the event
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            kind: self.event_type.as_str().to_string(),
            chatroom_id: self.chatroom_id.clone(),
            data: self.payload.clone(),
        }
    }

    /// Encode straight to a JSON text frame
    pub fn encode(&self) -> Result<String, SharedError> {
        self.to_wire().encode()
    }
}
