//! Backend Error Module
//!
//! Error types returned by HTTP handlers and their conversion into HTTP
//! responses.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - IntoResponse implementation
//! ```
//!
//! # Error Types
//!
//! - `Unauthorized` - token missing or invalid
//! - `Forbidden` - not a member of the requested chatroom
//! - `AdmissionRejected` - connection storm protection kicked in
//! - `Overloaded` - handshake cap reached or shutting down
//! - `Membership` - membership service failure
//! - `HandlerError` - anything else, with an explicit status

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::BackendError;
