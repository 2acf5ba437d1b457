/**
 * Live Connection Handle
 *
 * A `Connection` is the shared face of one WebSocket session. The session
 * task owns the socket itself; everyone else (registry, dispatcher,
 * heartbeat) only holds an `Arc<Connection>` and talks to the socket through
 * it:
 *
 * - outbound frames go into a bounded queue drained by the session's single
 *   writer task, so concurrent broadcasts never interleave on the socket and
 *   a slow client can never block the sender
 * - closing is a one-shot signal; the first reason wins and the session tears
 *   the socket down when it observes it
 */
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Opaque connection identifier, generated at accept time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new unique connection ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identity slot a connection occupies in the registry.
///
/// At most one connection is registered per key. A user may hold several
/// keys at once (one per device, and per device one global plus one per
/// chatroom being viewed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub user_id: Uuid,
    pub device: String,
    pub chatroom_id: Option<String>,
}

impl ConnectionKey {
    /// Device name used when the client does not send one
    pub const DEFAULT_DEVICE: &'static str = "default";

    pub fn new(user_id: Uuid, device: impl Into<String>, chatroom_id: Option<String>) -> Self {
        Self {
            user_id,
            device: device.into(),
            chatroom_id,
        }
    }

    /// User-level connection on the default device
    pub fn user(user_id: Uuid) -> Self {
        Self::new(user_id, Self::DEFAULT_DEVICE, None)
    }

    /// Room-scoped connection on the default device
    pub fn in_room(user_id: Uuid, chatroom_id: impl Into<String>) -> Self {
        Self::new(user_id, Self::DEFAULT_DEVICE, Some(chatroom_id.into()))
    }
}

/// Why a connection was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// A newer connection took the same identity slot
    Superseded,
    /// No pong within the heartbeat timeout
    HeartbeatTimeout,
    /// Outbound queue overflowed
    SlowConsumer,
    /// Socket read or write failed
    TransportError,
    /// Server is shutting down
    ServerShutdown,
}

impl CloseReason {
    /// WebSocket close code sent to the client
    pub fn close_code(&self) -> u16 {
        match self {
            Self::ClientClosed => 1000,
            Self::ServerShutdown => 1001,
            Self::TransportError => 1011,
            Self::Superseded => 4000,
            Self::HeartbeatTimeout => 4001,
            Self::SlowConsumer => 4002,
        }
    }

    /// Close frame reason text
    pub fn description(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::Superseded => "superseded by a newer connection",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::SlowConsumer => "outbound queue overflow",
            Self::TransportError => "transport error",
            Self::ServerShutdown => "server shutting down",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure to hand a frame to one connection
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The bounded outbound queue is full; the client is not keeping up
    #[error("outbound queue full")]
    QueueFull,
    /// The connection is closed or its writer is gone
    #[error("connection closed")]
    Closed,
}

impl DeliveryError {
    /// Close reason to apply when this failure evicts the connection
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::QueueFull => CloseReason::SlowConsumer,
            Self::Closed => CloseReason::TransportError,
        }
    }
}

/// Receiving halves owned by the session task
pub struct ConnectionChannels {
    /// Frames to write to the socket, in order
    pub outbound: mpsc::Receiver<Message>,
    /// Becomes `Some` once the connection is closed
    pub closed: watch::Receiver<Option<CloseReason>>,
}

/// Shared handle to one live WebSocket session
pub struct Connection {
    id: ConnectionId,
    key: ConnectionKey,
    created_at: DateTime<Utc>,
    last_heartbeat_at: Mutex<DateTime<Utc>>,
    outbound: mpsc::Sender<Message>,
    close_tx: watch::Sender<Option<CloseReason>>,
}

impl Connection {
    /// Create a connection with an outbound queue of `queue_capacity` frames.
    ///
    /// `queue_capacity` must be non-zero.
    pub fn new(key: ConnectionKey, queue_capacity: usize) -> (Arc<Self>, ConnectionChannels) {
        let (outbound, outbound_rx) = mpsc::channel(queue_capacity);
        let (close_tx, closed) = watch::channel(None);
        let now = Utc::now();
        let connection = Arc::new(Self {
            id: ConnectionId::generate(),
            key,
            created_at: now,
            last_heartbeat_at: Mutex::new(now),
            outbound,
            close_tx,
        });
        (
            connection,
            ConnectionChannels {
                outbound: outbound_rx,
                closed,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn user_id(&self) -> Uuid {
        self.key.user_id
    }

    pub fn chatroom_id(&self) -> Option<&str> {
        self.key.chatroom_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_heartbeat_at(&self) -> DateTime<Utc> {
        *self.last_heartbeat_at.lock()
    }

    /// Refresh the liveness timestamp
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat_at.lock() = Utc::now();
    }

    /// Queue a frame for the writer task without waiting.
    pub fn send(&self, message: Message) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Queue a text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        let text: String = text.into();
        self.send(Message::Text(text.into()))
    }

    /// Signal the session to close. Returns `false` if it was already closed.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.close_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_closed(&self) -> bool {
        self.close_tx.borrow().is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_tx.borrow()
    }

    /// Another receiver for the close signal
    pub fn subscribe_close(&self) -> watch::Receiver<Option<CloseReason>> {
        self.close_tx.subscribe()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("close_reason", &self.close_reason())
            .finish()
    }
}

/// Wait until the close signal fires and return its reason.
///
/// A dropped sender means the `Connection` itself is gone, reported as a
/// transport error.
pub async fn wait_closed(closed: &mut watch::Receiver<Option<CloseReason>>) -> CloseReason {
    match closed.wait_for(Option::is_some).await {
        Ok(reason) => (*reason).unwrap_or(CloseReason::TransportError),
        Err(_) => CloseReason::TransportError,
    }
}
