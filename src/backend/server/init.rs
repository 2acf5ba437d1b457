/**
 * Server Initialization
 *
 * Builds everything the server needs from a validated `ServerConfig`:
 *
 * 1. membership provider (HTTP when `membership_url` is set, in-memory otherwise)
 * 2. token validator
 * 3. realtime hub and its background sweeper
 * 4. router
 *
 * The hub is returned next to the router so `main` can shut it down once
 * the listener stops.
 */
use std::sync::Arc;

use axum::Router;

use crate::backend::auth::{JwtValidator, TokenValidator};
use crate::backend::membership::{HttpMembership, InMemoryMembership, MembershipProvider};
use crate::backend::realtime::RealtimeHub;
use crate::backend::routes::create_router;
use crate::backend::server::config::{ConfigError, ServerConfig};
use crate::backend::server::state::AppState;

/// A ready-to-serve application
pub struct App {
    pub router: Router,
    pub hub: Arc<RealtimeHub>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("hub", &self.hub.stats())
            .finish_non_exhaustive()
    }
}

/// Create and configure the Axum application
///
/// Must be called inside a Tokio runtime: the admission sweeper is spawned
/// here.
pub fn create_app(config: &ServerConfig) -> Result<App, ConfigError> {
    tracing::info!(bind_addr = %config.bind_addr, "Initializing roomchat server");

    let membership: Arc<dyn MembershipProvider> = match &config.membership_url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP membership provider");
            let provider = HttpMembership::new(url.clone()).map_err(|e| ConfigError::Invalid {
                key: "membership_url",
                message: e.to_string(),
            })?;
            Arc::new(provider)
        }
        None => {
            tracing::warn!("No membership_url configured, using in-memory membership");
            Arc::new(InMemoryMembership::new())
        }
    };

    let validator: Arc<dyn TokenValidator> = Arc::new(JwtValidator::new(config.jwt_secret()?));

    let hub = Arc::new(RealtimeHub::new(config.realtime.clone(), membership));
    hub.spawn_sweeper();

    let router = create_router(AppState::new(hub.clone(), validator));
    tracing::info!("Router configured with admission sweeper");

    Ok(App { router, hub })
}
