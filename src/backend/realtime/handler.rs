/**
 * WebSocket Upgrade Endpoint
 *
 * `GET /ws?token=...&chatroom_id=...&device=...`
 *
 * Everything that can refuse a connection happens here, before the upgrade
 * is accepted, so the client gets a proper HTTP status instead of a socket
 * that closes right away:
 *
 * 1. server shutting down - 503
 * 2. token from `?token=` or `Authorization: Bearer` - 401 when missing or invalid
 * 3. `device` label - 400 when empty or too long
 * 4. pending handshake budget - 503 when exhausted
 * 5. admission control per user - deferred or 429 with `Retry-After`
 * 6. room membership when `chatroom_id` is given - 403 for non-members
 * 7. live connections of the user - 409 past the per-user cap
 *
 * Admission runs before membership so that a reconnect storm is throttled
 * before it reaches the membership service. The handshake permit is held
 * until the socket is upgraded.
 *
 * Once upgraded, the socket is split and handed to `run_session`.
 */
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::auth::AuthError;
use crate::backend::error::BackendError;
use crate::backend::middleware::bearer_token;
use crate::backend::server::AppState;

use super::admission::Admission;
use super::config::DelayPolicy;
use super::connection::ConnectionKey;
use super::hub::RealtimeHub;
use super::session::run_session;

const MAX_DEVICE_LEN: usize = 64;

/// Query parameters of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Session token; `Authorization: Bearer` works too
    pub token: Option<String>,
    /// Room the client is viewing, if any
    pub chatroom_id: Option<String>,
    /// Device label, `"default"` when absent
    pub device: Option<String>,
}

/// Authenticate, authorize and admit a WebSocket upgrade
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match prepare(&state, params, &headers, ws).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn prepare(
    state: &AppState,
    params: ConnectParams,
    headers: &HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, BackendError> {
    let hub = state.hub.clone();
    if hub.is_shutting_down() {
        return Err(BackendError::overloaded("server is shutting down"));
    }

    let token = params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
        .ok_or(AuthError::MissingToken)?;
    let user = state.validator.validate(token).map_err(|e| {
        tracing::warn!(error = %e, "[Realtime] Rejected upgrade with invalid token");
        e
    })?;

    let device = params
        .device
        .unwrap_or_else(|| ConnectionKey::DEFAULT_DEVICE.to_string());
    if device.trim().is_empty() || device.len() > MAX_DEVICE_LEN {
        return Err(BackendError::handler(
            StatusCode::BAD_REQUEST,
            format!("device must be 1-{} characters", MAX_DEVICE_LEN),
        ));
    }

    let permit = hub
        .admission()
        .try_begin_handshake()
        .ok_or_else(|| BackendError::overloaded("too many pending handshakes"))?;
    admit(&hub, user.user_id).await?;

    let chatroom_id = params.chatroom_id.filter(|room| !room.is_empty());
    if let Some(room) = &chatroom_id {
        if !hub.membership().is_member(room, user.user_id).await? {
            tracing::warn!(
                user_id = %user.user_id,
                chatroom_id = %room,
                "[Realtime] Rejected upgrade from non-member"
            );
            return Err(BackendError::forbidden("not a member of this chatroom"));
        }
    }

    let key = ConnectionKey::new(user.user_id, device, chatroom_id);
    check_connection_cap(&hub, &key)?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    tracing::debug!(
        user_id = %key.user_id,
        chatroom_id = ?key.chatroom_id,
        device = %key.device,
        "[Realtime] Upgrading connection"
    );

    let response = ws
        .on_failed_upgrade(|err| {
            tracing::warn!(error = %err, "[Realtime] WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            drop(permit);
            let (sink, stream) = socket.split();
            run_session(hub, key, stream, sink).await;
        });
    Ok(response)
}

/// Run admission control for `user_id`, deferring once under the `defer` policy
pub(crate) async fn admit(hub: &RealtimeHub, user_id: Uuid) -> Result<(), BackendError> {
    let admission = hub.admission();
    let config = admission.config();

    match admission.try_admit(user_id) {
        Admission::Allowed => Ok(()),
        Admission::Rejected { retry_after } => {
            tracing::warn!(
                user_id = %user_id,
                retry_after_ms = retry_after.as_millis() as u64,
                "[Realtime] Connection attempts exhausted"
            );
            Err(BackendError::AdmissionRejected { retry_after })
        }
        Admission::Delayed(delay) => {
            if config.delay_policy == DelayPolicy::Reject || delay > config.max_defer() {
                return Err(BackendError::AdmissionRejected { retry_after: delay });
            }
            tracing::debug!(
                user_id = %user_id,
                delay_ms = delay.as_millis() as u64,
                "[Realtime] Deferring connection attempt"
            );
            tokio::time::sleep(delay).await;
            match admission.try_admit(user_id) {
                Admission::Allowed => Ok(()),
                Admission::Delayed(retry_after) | Admission::Rejected { retry_after } => {
                    Err(BackendError::AdmissionRejected { retry_after })
                }
            }
        }
    }
}

/// Refuse a new slot once the user holds the maximum number of connections.
/// Reconnecting into a slot the user already holds is always allowed.
fn check_connection_cap(hub: &RealtimeHub, key: &ConnectionKey) -> Result<(), BackendError> {
    let cap = hub.admission().config().max_connections_per_user;
    let live = hub.registry().lookup_user(key.user_id);
    if live.len() < cap || live.iter().any(|conn| conn.key() == key) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %key.user_id,
        live = live.len(),
        "[Realtime] Rejected upgrade over the per-user connection cap"
    );
    Err(BackendError::handler(
        StatusCode::CONFLICT,
        format!("at most {} open connections per user", cap),
    ))
}
