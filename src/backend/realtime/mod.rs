//! Realtime Module
//!
//! Live delivery of chat events over WebSockets. REST handlers persist a
//! mutation and then call `RealtimeHub::notify`; the hub resolves who should
//! see it and pushes one frame to each of their open sockets.
//!
//! # Architecture
//!
//! - **`connection`** - one live socket: identity, bounded outbound queue, close signal
//! - **`registry`** - sharded index of live connections by identity, user and room
//! - **`admission`** - per-identity cooldown and attempt window, handshake budget
//! - **`heartbeat`** - ping/pong liveness state machine and its task
//! - **`dispatcher`** - room/user fan-out with per-connection failure isolation
//! - **`protocol`** - inbound frame classification
//! - **`session`** - connection lifecycle over any frame `Stream`/`Sink`
//! - **`handler`** - axum upgrade endpoint
//! - **`hub`** - owns the shared state; `notify`, `stats`, `shutdown`
//! - **`config`** - tunables
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs
//! ├── admission.rs
//! ├── config.rs
//! ├── connection.rs
//! ├── dispatcher.rs
//! ├── handler.rs
//! ├── heartbeat.rs
//! ├── hub.rs
//! ├── protocol.rs
//! ├── registry.rs
//! └── session.rs
//! ```
//!
//! # Delivery Guarantees
//!
//! At most once. Events sent while a client is disconnected are not
//! buffered; clients reconcile over REST after reconnecting.

/// Connection admission control
pub mod admission;

/// Realtime tunables
pub mod config;

/// Live connection handle
pub mod connection;

/// Broadcast fan-out
pub mod dispatcher;

/// WebSocket upgrade endpoint
pub mod handler;

/// Heartbeat monitor
pub mod heartbeat;

/// Shared realtime state
pub mod hub;

/// Inbound frame handling
pub mod protocol;

/// Connection registry
pub mod registry;

/// Connection lifecycle
pub mod session;

pub use admission::{Admission, AdmissionControl, HandshakePermit};
pub use config::{AdmissionConfig, DelayPolicy, HeartbeatConfig, RealtimeConfig};
pub use connection::{CloseReason, Connection, ConnectionId, ConnectionKey, DeliveryError};
pub use dispatcher::{BroadcastDispatcher, DeliveryReport, DispatchError};
pub use handler::{ws_upgrade, ConnectParams};
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor, HeartbeatState};
pub use hub::{HubStats, RealtimeHub};
pub use registry::{Audience, ConnectionRegistry};
pub use session::run_session;
