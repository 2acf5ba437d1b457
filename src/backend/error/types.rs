/**
 * Backend Error Types
 *
 * Errors that HTTP handlers return. Each variant knows its status code and
 * converts into a JSON response (see `conversion`).
 *
 * # Error Categories
 *
 * ## Upgrade Errors
 *
 * Raised before a WebSocket upgrade is accepted:
 * - missing or invalid token (401)
 * - not a member of the requested chatroom (403)
 * - admission rejected the attempt (429, with `Retry-After`)
 * - too many handshakes in flight or shutdown in progress (503)
 *
 * ## Handler Errors
 *
 * Anything else a handler wants to report with an explicit status.
 */
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::auth::AuthError;
use crate::backend::membership::MembershipError;
use crate::shared::SharedError;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Token missing, malformed or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Authenticated, but not allowed to do this
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Admission control turned the connection attempt away
    #[error("Too many connection attempts, retry after {}ms", retry_after.as_millis())]
    AdmissionRejected { retry_after: Duration },

    /// Server cannot take the request right now
    #[error("Service unavailable: {message}")]
    Overloaded { message: String },

    /// Membership service failed
    #[error(transparent)]
    Membership(#[from] MembershipError),

    /// Handler error with an explicit status
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::Overloaded {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `Unauthorized` - 401
    /// - `Forbidden` - 403
    /// - `AdmissionRejected` - 429
    /// - `Overloaded` - 503
    /// - `Membership` - 404 for an unknown room, otherwise 502
    /// - `HandlerError` - Uses the status code from the error
    /// - `SharedError` - 400 for validation, 500 for serialization
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::AdmissionRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Membership(MembershipError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Membership(_) => StatusCode::BAD_GATEWAY,
            Self::HandlerError { status, .. } => *status,
            Self::SharedError(SharedError::ValidationError { .. }) => StatusCode::BAD_REQUEST,
            Self::SharedError(SharedError::SerializationError { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            // never tell the client which token check failed
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            other => other.to_string(),
        }
    }

    /// Seconds for the `Retry-After` header, if the client should back off
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::AdmissionRejected { retry_after } => {
                Some(retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error() {
        let error = BackendError::handler(StatusCode::BAD_REQUEST, "Invalid request");
        match error {
            BackendError::HandlerError { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid request");
            }
            _ => panic!("Expected HandlerError"),
        }
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            BackendError::from(AuthError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(BackendError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BackendError::AdmissionRejected {
                retry_after: Duration::from_secs(1)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(BackendError::overloaded("busy").status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            BackendError::from(MembershipError::RoomNotFound("r".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BackendError::from(MembershipError::Unavailable("down".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let error = BackendError::AdmissionRejected {
            retry_after: Duration::from_millis(1_200),
        };
        assert_eq!(error.retry_after_secs(), Some(2));
        assert_eq!(BackendError::forbidden("x").retry_after_secs(), None);
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        let error = BackendError::from(AuthError::InvalidToken("bad signature".into()));
        assert_eq!(error.message(), "Unauthorized");
    }

    #[test]
    fn test_from_shared_error() {
        let backend_error: BackendError = SharedError::validation("field", "message").into();
        assert_eq!(backend_error.status_code(), StatusCode::BAD_REQUEST);
    }
}
