//! Server Module
//!
//! Initialization and configuration of the Axum HTTP server.
//!
//! - **`state`** - `AppState` and `FromRef` implementations
//! - **`config`** - configuration loading and validation
//! - **`init`** - wiring providers, hub and router together
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs
//! ├── state.rs
//! ├── config.rs
//! └── init.rs
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: defaults, optional TOML file, environment
//! 2. **State Creation**: membership provider, token validator, realtime hub
//! 3. **Background Tasks**: admission record sweeper
//! 4. **Router Creation**: routes plus HTTP tracing

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::{ConfigError, ServerConfig};
pub use init::{create_app, App};
pub use state::AppState;
