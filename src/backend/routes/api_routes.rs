/**
 * API Route Handlers
 *
 * # Routes
 *
 * - `POST /api/realtime/notify` - fan an event out to live connections (service token)
 * - `GET /api/realtime/stats` - live connection counters (bearer auth)
 * - `GET /health` - liveness probe
 *
 * `notify` is how the persistence side of the application triggers live
 * delivery after it has stored a mutation. End-user tokens are refused with
 * 403 so clients cannot forge events for other rooms. It answers `202 Accepted` as soon
 * as the broadcast is scheduled; delivery itself is best effort.
 */
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::backend::error::BackendError;
use crate::backend::middleware::{AuthUser, ServiceAuth};
use crate::backend::realtime::{Audience, HubStats, RealtimeHub};
use crate::backend::server::state::AppState;
use crate::shared::{BroadcastEvent, EventType};

/// Body of `POST /api/realtime/notify`
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRequest {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub chatroom_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    pub audience: Audience,
}

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/realtime/notify", post(notify))
        .route("/api/realtime/stats", get(stats))
        .route("/health", get(health))
}

/// Schedule a broadcast
pub async fn notify(
    State(hub): State<Arc<RealtimeHub>>,
    ServiceAuth(caller): ServiceAuth,
    Json(request): Json<NotifyRequest>,
) -> Result<impl IntoResponse, BackendError> {
    if !request.event_type.is_broadcastable() {
        return Err(BackendError::handler(
            StatusCode::BAD_REQUEST,
            format!("event type `{}` cannot be broadcast", request.event_type),
        ));
    }
    if let Audience::Room(room) = &request.audience {
        if room.is_empty() {
            return Err(BackendError::handler(StatusCode::BAD_REQUEST, "room audience needs a chatroom id"));
        }
    }

    let data = match request.data {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    let event = BroadcastEvent::new(request.event_type, request.chatroom_id, data);

    tracing::debug!(
        caller = %caller.user_id,
        event_type = %event.event_type,
        audience = ?request.audience,
        "[Realtime] Notify requested"
    );
    hub.notify(request.audience, event);

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": true }))))
}

/// Live connection counters
pub async fn stats(State(hub): State<Arc<RealtimeHub>>, _caller: AuthUser) -> Json<HubStats> {
    Json(hub.stats())
}

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
