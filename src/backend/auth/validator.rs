//! Token validation seam.
//!
//! The upgrade endpoint and the REST extractor only see `TokenValidator`, so
//! tests and alternative identity providers can swap the JWT check out.

use std::time::Duration;

use uuid::Uuid;

use super::sessions::{create_service_token, create_token, verify_token, DEFAULT_TOKEN_TTL};
use super::AuthError;

/// Identity resolved from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: Option<String>,
    /// Backend caller rather than an end user
    pub service: bool,
}

/// Turns a bearer token into an identity
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// HS256 JWT validator with a shared secret
#[derive(Clone)]
pub struct JwtValidator {
    secret: Vec<u8>,
}

impl JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mint a token this validator accepts
    pub fn issue(&self, user_id: Uuid, username: Option<String>) -> Result<String, AuthError> {
        self.issue_with_ttl(user_id, username, DEFAULT_TOKEN_TTL)
    }

    pub fn issue_with_ttl(&self, user_id: Uuid, username: Option<String>, ttl: Duration) -> Result<String, AuthError> {
        create_token(&self.secret, user_id, username, ttl)
    }

    /// Mint a service-scoped token for a backend caller
    pub fn issue_service(&self, service_id: Uuid) -> Result<String, AuthError> {
        create_service_token(&self.secret, service_id, DEFAULT_TOKEN_TTL)
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish_non_exhaustive()
    }
}

impl TokenValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let claims = verify_token(&self.secret, token)?;
        Ok(AuthenticatedUser {
            user_id: claims.user_id()?,
            service: claims.is_service(),
            username: claims.username,
        })
    }
}
