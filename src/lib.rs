//! roomchat - Realtime Delivery for Chat Rooms
//!
//! WebSocket connection management and broadcast fan-out for a chat
//! application. REST handlers elsewhere persist messages and read receipts;
//! this crate keeps one socket per client device open and pushes the
//! resulting events (`new_message`, `message_read`, `unread_count_update`)
//! to everyone who should see them.
//!
//! # Module Structure
//!
//! - **`shared`** - wire events, chat payloads, the client reconnect policy
//!   and shared errors. Compiles without the server stack so clients can
//!   depend on it.
//! - **`backend`** - the Axum server (only compiled with the `ssr` feature)
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - server modules and the `roomchat-server` binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use roomchat::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load()?;
//! let app = create_app(&config)?;
//! let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
//! axum::serve(listener, app.router).await?;
//! app.hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
