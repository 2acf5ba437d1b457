//! Inbound frame handling.
//!
//! Classifies every frame a client sends and decides what the session does
//! with it. Unrecognised or malformed text frames are ignored so older
//! servers keep working with newer clients.

use axum::extract::ws::Message;

use crate::shared::{BroadcastEvent, WireMessage};

/// What the session should do with one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Peer proved it is alive; queue `reply` if present
    Alive { reply: Option<Message> },
    /// Nothing to do
    Ignored,
    /// Peer is closing the socket
    Closed,
}

/// Decide how to handle `frame`
pub fn classify(frame: &Message) -> Inbound {
    match frame {
        Message::Text(text) => classify_text(text.as_str()),
        Message::Pong(_) => Inbound::Alive { reply: None },
        Message::Ping(payload) => Inbound::Alive {
            reply: Some(Message::Pong(payload.clone())),
        },
        Message::Close(_) => Inbound::Closed,
        Message::Binary(_) => {
            tracing::debug!("[Realtime] Ignoring binary frame");
            Inbound::Ignored
        }
    }
}

fn classify_text(text: &str) -> Inbound {
    let message = match WireMessage::decode(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(error = %err, "[Realtime] Ignoring malformed frame");
            return Inbound::Ignored;
        }
    };

    let kind = message.inbound_kind();
    if !kind.is_liveness() {
        tracing::debug!(frame_type = %message.kind, "[Realtime] Ignoring unknown frame type");
        return Inbound::Ignored;
    }

    let reply = kind.reply().and_then(|event_type| match BroadcastEvent::reply(event_type).encode() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(err) => {
            tracing::warn!(error = %err, "[Realtime] Failed to encode reply");
            None
        }
    });
    Inbound::Alive { reply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;

    fn reply_type(inbound: Inbound) -> String {
        match inbound {
            Inbound::Alive {
                reply: Some(Message::Text(text)),
            } => WireMessage::decode(text.as_str()).unwrap().kind,
            other => panic!("expected a text reply, got {:?}", other),
        }
    }

    #[test]
    fn test_heartbeat_gets_ack() {
        let inbound = classify(&Message::Text(r#"{"type":"heartbeat"}"#.into()));
        assert_eq!(reply_type(inbound), "heartbeat_ack");
    }

    #[test]
    fn test_ping_frame_type_gets_pong() {
        let inbound = classify(&Message::Text(r#"{"type":"ping","data":{}}"#.into()));
        assert_eq!(reply_type(inbound), "pong");
    }

    #[test]
    fn test_unknown_and_malformed_are_ignored() {
        assert_eq!(
            classify(&Message::Text(r#"{"type":"typing","data":{}}"#.into())),
            Inbound::Ignored
        );
        assert_eq!(classify(&Message::Text("{not json".into())), Inbound::Ignored);
        assert_eq!(classify(&Message::Binary(Bytes::from_static(b"\x00"))), Inbound::Ignored);
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(classify(&Message::Pong(Bytes::new())), Inbound::Alive { reply: None });
        assert_matches!(
            classify(&Message::Ping(Bytes::from_static(b"x"))),
            Inbound::Alive { reply: Some(Message::Pong(p)) } if p.as_ref() == b"x"
        );
        assert_eq!(classify(&Message::Close(None)), Inbound::Closed);
    }
}
