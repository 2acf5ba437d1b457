//! Shared Module
//!
//! Types used on both ends of the realtime socket. The server encodes them,
//! web and mobile clients decode them, so nothing in here depends on the
//! `ssr` feature.
//!
//! # Overview
//!
//! - **`event`** - the `{type, chatroom_id, data}` wire frame and event types
//! - **`message`** - chat message and read receipt payloads
//! - **`reconnect`** - client reconnect/backoff state machine
//! - **`error`** - shared error type

/// Wire frames and event types
pub mod event;

/// Chat message payloads
pub mod message;

/// Client reconnect state machine
pub mod reconnect;

/// Shared error types
pub mod error;

/// Re-export commonly used types for convenience
pub use error::SharedError;
pub use event::{BroadcastEvent, EventType, InboundKind, WireMessage};
pub use message::{ChatMessage, MessageKind, ReadReceipt};
pub use reconnect::{AttemptOutcome, ClientConnectionState, ReconnectPolicy, Reconnector};
