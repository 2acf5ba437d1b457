//! Middleware Module
//!
//! Request processing shared by several routes.
//!
//! - **`auth`** - bearer token extraction, the `AuthUser` and `ServiceAuth` extractors

pub mod auth;

pub use auth::{bearer_token, AuthUser, ServiceAuth};
