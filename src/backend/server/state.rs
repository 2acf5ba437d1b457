/**
 * Application State Management
 *
 * `AppState` is the one value axum hands every handler. It only holds
 * `Arc`s, so cloning it per request is cheap:
 *
 * - `hub` - the realtime core (registry, admission, dispatcher)
 * - `validator` - turns bearer tokens into user identities
 *
 * The `FromRef` implementations let handlers extract just the piece they
 * need, e.g. `State(hub): State<Arc<RealtimeHub>>`.
 */
use std::sync::Arc;

use axum::extract::FromRef;

use crate::backend::auth::TokenValidator;
use crate::backend::realtime::RealtimeHub;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Realtime connection manager and broadcast fan-out
    pub hub: Arc<RealtimeHub>,

    /// Bearer token validator
    pub validator: Arc<dyn TokenValidator>,
}

impl AppState {
    pub fn new(hub: Arc<RealtimeHub>, validator: Arc<dyn TokenValidator>) -> Self {
        Self { hub, validator }
    }
}

impl FromRef<AppState> for Arc<RealtimeHub> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TokenValidator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.validator.clone()
    }
}
