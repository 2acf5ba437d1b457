//! Authentication Module
//!
//! Verifies the bearer tokens clients present when opening a realtime socket
//! or calling the realtime REST endpoints. Issuing tokens (signup, login) is
//! the chat REST service's job; this server only checks them.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs        - Module exports and AuthError
//! ├── sessions.rs   - JWT claims, creation and verification
//! └── validator.rs  - TokenValidator trait and JwtValidator
//! ```
//!
//! # Security
//!
//! - Tokens are HS256 JWTs signed with `JWT_SECRET`
//! - Expired or tampered tokens are rejected before any upgrade happens
//! - Failures map to 401 without saying which check failed
//! - Broadcast triggers need a `scope: "service"` token; user tokens get 403

use thiserror::Error;

/// JWT token generation and validation
pub mod sessions;

/// Token validation trait and JWT implementation
pub mod validator;

pub use sessions::{create_service_token, create_token, verify_token, Claims, SERVICE_SCOPE};
pub use validator::{AuthenticatedUser, JwtValidator, TokenValidator};

/// Authentication failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,

    #[error("invalid user ID in token: {0}")]
    InvalidSubject(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::InvalidToken(err.to_string()),
        }
    }
}
