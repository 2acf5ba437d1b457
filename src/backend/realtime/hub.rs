/**
 * Realtime Hub
 *
 * Owns every piece of shared realtime state (registry, admission control,
 * dispatcher, membership provider) and is what the rest of the server holds
 * on to. HTTP handlers that persisted a mutation call `notify`; the upgrade
 * endpoint hands sockets to `run_session` with the hub; `main` calls
 * `shutdown` when the process is asked to stop.
 *
 * # Shutdown
 *
 * `shutdown` refuses new sessions, drains the registry, closes every live
 * connection with `ServerShutdown` and then waits (bounded by the configured
 * grace period) until every session task has finished its cleanup.
 */
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::backend::membership::MembershipProvider;
use crate::shared::BroadcastEvent;

use super::admission::AdmissionControl;
use super::config::RealtimeConfig;
use super::connection::CloseReason;
use super::dispatcher::BroadcastDispatcher;
use super::registry::{Audience, ConnectionRegistry};

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Registered connections
    pub connections: usize,
    /// Users with at least one connection
    pub users: usize,
    /// Session tasks still running
    pub sessions: usize,
    /// Upgrades currently in their handshake
    pub pending_handshakes: usize,
    /// Users with admission history
    pub tracked_users: usize,
}

/// Facade over the realtime core
pub struct RealtimeHub {
    config: RealtimeConfig,
    registry: Arc<ConnectionRegistry>,
    admission: AdmissionControl,
    membership: Arc<dyn MembershipProvider>,
    dispatcher: Arc<BroadcastDispatcher>,
    sessions: AtomicUsize,
    sessions_idle: Notify,
    shutting_down: AtomicBool,
}

/// Counts one running session; decrements on drop
pub struct SessionTracker {
    hub: Arc<RealtimeHub>,
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        if self.hub.sessions.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.hub.sessions_idle.notify_waiters();
        }
    }
}

impl RealtimeHub {
    pub fn new(config: RealtimeConfig, membership: Arc<dyn MembershipProvider>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone(), membership.clone()));
        let admission = AdmissionControl::new(config.admission.clone());
        Self {
            config,
            registry,
            admission,
            membership,
            dispatcher,
            sessions: AtomicUsize::new(0),
            sessions_idle: Notify::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    pub fn membership(&self) -> &Arc<dyn MembershipProvider> {
        &self.membership
    }

    pub fn dispatcher(&self) -> &Arc<BroadcastDispatcher> {
        &self.dispatcher
    }

    /// Fire-and-forget delivery of `event` to `audience`
    pub fn notify(&self, audience: Audience, event: BroadcastEvent) -> JoinHandle<()> {
        self.dispatcher.notify(audience, event)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.len(),
            users: self.registry.user_count(),
            sessions: self.sessions.load(Ordering::Acquire),
            pending_handshakes: self.admission.pending_handshakes(),
            tracked_users: self.admission.tracked(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub(crate) fn track_session(self: &Arc<Self>) -> SessionTracker {
        self.sessions.fetch_add(1, Ordering::AcqRel);
        SessionTracker { hub: self.clone() }
    }

    /// Close every connection and wait for the sessions to finish.
    ///
    /// Returns how many connections were closed. Calling it twice is harmless.
    pub async fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::Release);

        let connections = self.registry.drain();
        for conn in &connections {
            conn.close(CloseReason::ServerShutdown);
        }
        tracing::info!(
            connections = connections.len(),
            "[Realtime] Shutting down, closing all connections"
        );

        let grace = self.config.shutdown_grace();
        let drained = tokio::time::timeout(grace, async {
            loop {
                let idle = self.sessions_idle.notified();
                if self.sessions.load(Ordering::Acquire) == 0 {
                    break;
                }
                idle.await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::info!("[Realtime] All sessions finished"),
            Err(_) => tracing::warn!(
                remaining = self.sessions.load(Ordering::Acquire),
                "[Realtime] Shutdown grace period elapsed with sessions still running"
            ),
        }
        connections.len()
    }

    /// Periodically drop stale admission records.
    ///
    /// The task stops on its own once the hub is shut down or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let hub: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(hub) = hub.upgrade() else { break };
                if hub.is_shutting_down() {
                    break;
                }
                let purged = hub.admission.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "[Realtime] Purged stale admission records");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::membership::InMemoryMembership;
    use crate::backend::realtime::connection::{Connection, ConnectionKey};
    use crate::backend::realtime::session::run_session;
    use axum::extract::ws::Message;
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use uuid::Uuid;

    fn hub_with(config: RealtimeConfig) -> Arc<RealtimeHub> {
        Arc::new(RealtimeHub::new(config, Arc::new(InMemoryMembership::new())))
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_deterministically() {
        let hub = hub_with(RealtimeConfig::default());
        let mut clients = Vec::new();
        let mut tasks = Vec::new();
        for _ in 0..5 {
            let (to_server, inbound) = unbounded_channel::<Result<Message, Infallible>>();
            let (outbound, mut from_server) = unbounded_channel::<Message>();
            let writer = futures_util::sink::unfold(outbound, |tx, frame: Message| async move {
                tx.send(frame).map_err(|_| "client gone")?;
                Ok::<_, &'static str>(tx)
            });
            let key = ConnectionKey::user(Uuid::new_v4());
            tasks.push(tokio::spawn(run_session(
                hub.clone(),
                key,
                UnboundedReceiverStream::new(inbound),
                writer,
            )));
            // connected event
            from_server.recv().await.unwrap();
            clients.push((to_server, from_server));
        }
        assert_eq!(hub.stats().connections, 5);

        assert_eq!(hub.shutdown().await, 5);
        assert_eq!(hub.stats().sessions, 0);
        assert!(hub.registry().is_empty());
        for task in tasks {
            assert_eq!(task.await.unwrap(), CloseReason::ServerShutdown);
        }
    }

    #[tokio::test]
    async fn test_shutdown_without_sessions_returns_immediately() {
        let hub = hub_with(RealtimeConfig::default());
        assert_eq!(hub.shutdown().await, 0);
        assert!(hub.is_shutting_down());
    }

    #[tokio::test]
    async fn test_notify_reaches_user() {
        let hub = hub_with(RealtimeConfig::default());
        let user = Uuid::new_v4();
        let (conn, mut channels) = Connection::new(ConnectionKey::user(user), 4);
        hub.registry().register(conn);

        hub.notify(Audience::User(user), BroadcastEvent::unread_count_update("r1", 1))
            .await
            .unwrap();
        assert!(channels.outbound.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_stale_records() {
        let mut config = RealtimeConfig::default();
        config.admission.window_ms = 1_000;
        config.sweep_interval_ms = 5_000;
        let hub = hub_with(config);

        hub.admission().try_admit(Uuid::new_v4());
        assert_eq!(hub.stats().tracked_users, 1);

        let sweeper = hub.spawn_sweeper();
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(hub.stats().tracked_users, 0);

        drop(hub);
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(sweeper.is_finished());
    }
}
