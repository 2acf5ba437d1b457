/**
 * Router Configuration
 *
 * Combines all route groups into a single Axum router and wraps it in the
 * HTTP tracing layer.
 *
 * # Routes
 *
 * - `GET /ws` - realtime WebSocket
 * - `POST /api/realtime/notify` - trigger a broadcast
 * - `GET /api/realtime/stats` - connection counters
 * - `GET /health` - liveness probe
 *
 * Anything else gets a 404.
 */
use axum::{http::StatusCode, Router};
use tower_http::trace::TraceLayer;

use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::routes::realtime_routes::configure_realtime_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = configure_realtime_routes(Router::new());
    let router = configure_api_routes(router);

    router
        .fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
