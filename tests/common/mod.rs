//! Common test utilities and helpers
//!
//! - a real server bound to an ephemeral port
//! - token helpers
//! - a thin WebSocket client with event assertions

pub mod assertions;
pub mod auth_helpers;
#[cfg(feature = "ssr")]
pub mod server;

#[cfg(feature = "ssr")]
pub use auth_helpers::*;
#[cfg(feature = "ssr")]
pub use server::*;
