/**
 * Authentication Extractor
 *
 * Pulls the bearer token out of a request and resolves it through the
 * state's `TokenValidator`. REST handlers take `AuthUser` as a parameter;
 * a missing or invalid token short-circuits with 401 before the handler
 * runs.
 *
 * `ServiceAuth` additionally requires a service-scoped token and answers 403
 * to ordinary user tokens.
 */
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::backend::auth::{AuthError, AuthenticatedUser, TokenValidator};
use crate::backend::error::BackendError;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for an authenticated user
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<dyn TokenValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::warn!("[Auth] Missing Authorization header");
            BackendError::Unauthorized(AuthError::MissingToken)
        })?;

        let validator = Arc::<dyn TokenValidator>::from_ref(state);
        let user = validator.validate(token).map_err(|e| {
            tracing::warn!(error = %e, "[Auth] Invalid token");
            BackendError::Unauthorized(e)
        })?;
        Ok(AuthUser(user))
    }
}

/// Axum extractor for a backend service caller
#[derive(Clone, Debug)]
pub struct ServiceAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for ServiceAuth
where
    Arc<dyn TokenValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(caller) = AuthUser::from_request_parts(parts, state).await?;
        if !caller.service {
            tracing::warn!(user_id = %caller.user_id, "[Auth] User token used on a service endpoint");
            return Err(BackendError::forbidden("service credential required"));
        }
        Ok(ServiceAuth(caller))
    }
}
