//! Backend Module
//!
//! Server-side code for roomchat: an Axum HTTP server that keeps WebSocket
//! connections to chat clients and pushes chat events to them as they
//! happen.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - configuration, application state, initialization
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`realtime`** - connection registry, admission, heartbeat, broadcast fan-out
//! - **`auth`** - session token validation
//! - **`membership`** - who belongs to which chatroom
//! - **`middleware`** - request extractors
//! - **`error`** - backend error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs
//! ├── main.rs         - binary entry point
//! ├── server/
//! ├── routes/
//! ├── realtime/
//! ├── auth/
//! ├── membership/
//! ├── middleware/
//! └── error/
//! ```
//!
//! # State Management
//!
//! `AppState` holds the `RealtimeHub` and the token validator behind `Arc`s.
//! The hub owns all realtime state; its indices use sharded locks that are
//! never held across an `.await`.

/// Authentication
pub mod auth;

/// Error types
pub mod error;

/// Chatroom membership lookups
pub mod membership;

/// Request middleware
pub mod middleware;

/// Realtime connections and broadcasting
pub mod realtime;

/// Route configuration
pub mod routes;

/// Server setup
pub mod server;
