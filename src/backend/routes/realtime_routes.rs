/**
 * Realtime Route Handlers
 *
 * - `GET /ws` - WebSocket upgrade (see `realtime::handler`)
 */
use axum::{routing::get, Router};

use crate::backend::realtime::ws_upgrade;
use crate::backend::server::state::AppState;

/// Configure the WebSocket endpoint
pub fn configure_realtime_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/ws", get(ws_upgrade))
}
