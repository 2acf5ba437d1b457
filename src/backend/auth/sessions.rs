/**
 * Session Tokens
 *
 * HS256 JWTs identifying a user. The REST service that logs users in issues
 * them; the realtime server only needs to verify them. `create_token` exists
 * for development tooling and tests.
 *
 * Tokens carrying `scope: "service"` identify a backend caller rather than an
 * end user. Only those may trigger broadcasts through the REST surface.
 */
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;

/// Default lifetime of tokens minted by `create_token`
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// `scope` claim of backend service tokens
pub const SERVICE_SCOPE: &str = "service";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Display name, if the issuer includes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// `"service"` for backend callers, absent for end users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

impl Claims {
    /// User ID carried in `sub`
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidSubject(self.sub.clone()))
    }

    pub fn is_service(&self) -> bool {
        self.scope.as_deref() == Some(SERVICE_SCOPE)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Create a JWT for `user_id`, signed with `secret`, valid for `ttl`
pub fn create_token(
    secret: &[u8],
    user_id: Uuid,
    username: Option<String>,
    ttl: Duration,
) -> Result<String, AuthError> {
    sign(secret, claims_for(user_id, username, None, ttl))
}

/// Create a service-scoped JWT for the backend caller `service_id`
pub fn create_service_token(secret: &[u8], service_id: Uuid, ttl: Duration) -> Result<String, AuthError> {
    sign(secret, claims_for(service_id, None, Some(SERVICE_SCOPE.to_string()), ttl))
}

fn claims_for(user_id: Uuid, username: Option<String>, scope: Option<String>, ttl: Duration) -> Claims {
    let now = unix_now();
    Claims {
        sub: user_id.to_string(),
        username,
        scope,
        exp: now + ttl.as_secs(),
        iat: now,
    }
}

fn sign(secret: &[u8], claims: Claims) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::Encoding(e.to_string()))
}

/// Verify a JWT against `secret` and decode its claims
pub fn verify_token(secret: &[u8], token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(AuthError::from)
}
