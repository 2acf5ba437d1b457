//! Route Configuration Module
//!
//! HTTP routes of the realtime server, grouped by concern.
//!
//! - **`router`** - main router creation and route assembly
//! - **`realtime_routes`** - WebSocket upgrade
//! - **`api_routes`** - notify, stats and health endpoints
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs
//! ├── router.rs
//! ├── realtime_routes.rs
//! └── api_routes.rs
//! ```

/// Main router creation
pub mod router;

/// WebSocket route
pub mod realtime_routes;

/// API endpoint handlers
pub mod api_routes;

pub use router::create_router;
