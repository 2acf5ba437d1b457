/**
 * Broadcast Dispatcher
 *
 * Turns "this event, for that audience" into frames on the right sockets.
 *
 * # Delivery
 *
 * An event is serialized once and the same frame is queued on every target
 * connection. Queuing never waits: a full queue means the client is not
 * keeping up, and that connection alone is closed as a slow consumer and
 * removed. Every other target still gets the event, so a single broken
 * socket can never stall or fail a broadcast.
 *
 * # Room Targeting
 *
 * A room broadcast goes to every member of the room (asked from the
 * `MembershipProvider`) on each of their connections that is either global
 * (no chatroom) or scoped to that same room. Connections scoped to a
 * different room are skipped.
 *
 * There is no redelivery. A client that missed events while disconnected
 * reconciles over REST.
 */
use std::sync::Arc;

use axum::extract::ws::Message;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::membership::{MembershipError, MembershipProvider};
use crate::shared::{BroadcastEvent, SharedError};

use super::connection::Connection;
use super::registry::{Audience, ConnectionRegistry};

/// Why a broadcast could not start
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("membership lookup failed: {0}")]
    Membership(#[from] MembershipError),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] SharedError),
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Connections the event was aimed at
    pub targeted: usize,
    /// Connections that accepted the frame
    pub delivered: usize,
    /// Connections dropped because they could not take it
    pub failed: usize,
}

/// Fans events out to live connections
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    membership: Arc<dyn MembershipProvider>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, membership: Arc<dyn MembershipProvider>) -> Self {
        Self { registry, membership }
    }

    /// Deliver `event` to the live connections of every member of `chatroom_id`
    pub async fn broadcast_to_room(
        &self,
        chatroom_id: &str,
        event: &BroadcastEvent,
    ) -> Result<DeliveryReport, DispatchError> {
        let members = self.membership.room_member_ids(chatroom_id).await?;
        let targets: Vec<_> = self
            .registry
            .lookup_users(&members)
            .into_iter()
            .filter(|conn| conn.chatroom_id().map_or(true, |room| room == chatroom_id))
            .collect();
        self.deliver(&targets, event)
    }

    /// Deliver `event` to every connection of `user_id`
    pub fn broadcast_to_user(&self, user_id: Uuid, event: &BroadcastEvent) -> Result<DeliveryReport, DispatchError> {
        let targets = self.registry.lookup_user(user_id);
        self.deliver(&targets, event)
    }

    /// Deliver `event` to every connection of each of `user_ids`
    pub fn broadcast_to_users(
        &self,
        user_ids: &[Uuid],
        event: &BroadcastEvent,
    ) -> Result<DeliveryReport, DispatchError> {
        let targets = self.registry.lookup_users(user_ids);
        self.deliver(&targets, event)
    }

    /// Deliver `event` to `audience`
    pub async fn broadcast(&self, audience: &Audience, event: &BroadcastEvent) -> Result<DeliveryReport, DispatchError> {
        match audience {
            Audience::Room(chatroom_id) => self.broadcast_to_room(chatroom_id, event).await,
            Audience::User(user_id) => self.broadcast_to_user(*user_id, event),
            Audience::Users(user_ids) => self.broadcast_to_users(user_ids, event),
        }
    }

    /// Fire-and-forget broadcast. Failures are logged, never returned.
    pub fn notify(self: &Arc<Self>, audience: Audience, event: BroadcastEvent) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher.broadcast(&audience, &event).await {
                Ok(report) => tracing::debug!(
                    event_type = %event.event_type,
                    targeted = report.targeted,
                    delivered = report.delivered,
                    failed = report.failed,
                    "[Realtime] Notify delivered"
                ),
                Err(err) => tracing::warn!(
                    event_type = %event.event_type,
                    audience = ?audience,
                    error = %err,
                    "[Realtime] Notify failed"
                ),
            }
        })
    }

    fn deliver(&self, targets: &[Arc<Connection>], event: &BroadcastEvent) -> Result<DeliveryReport, DispatchError> {
        let mut report = DeliveryReport {
            targeted: targets.len(),
            ..DeliveryReport::default()
        };
        if targets.is_empty() {
            return Ok(report);
        }

        let frame = Message::Text(event.encode()?.into());

        for conn in targets {
            match conn.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %conn.id(),
                        user_id = %conn.user_id(),
                        event_type = %event.event_type,
                        error = %err,
                        "[Realtime] Delivery failed, dropping connection"
                    );
                    conn.close(err.close_reason());
                    self.registry.remove(conn);
                }
            }
        }

        tracing::debug!(
            event_type = %event.event_type,
            chatroom_id = ?event.chatroom_id,
            targeted = report.targeted,
            delivered = report.delivered,
            "[Realtime] Event dispatched"
        );
        Ok(report)
    }
}
