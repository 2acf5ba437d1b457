/**
 * Connection Session
 *
 * Runs one WebSocket connection from registration to removal:
 *
 * ```text
 * Registered ──▶ Active (read loop + writer task + heartbeat task) ──▶ Terminating ──▶ Removed
 * ```
 *
 * - the socket is split; a dedicated writer task owns the sink and drains the
 *   connection's outbound queue, so frames from concurrent broadcasts never
 *   interleave
 * - the read loop owns the stream and reacts to inbound frames
 * - the heartbeat task runs beside both and only ever talks to the
 *   connection handle
 *
 * Every way out of the session (client close, read error, heartbeat timeout,
 * supersession, server shutdown, the task being dropped, a panic) goes
 * through `RegistrationGuard`, which closes the connection and removes it
 * from the registry exactly once.
 *
 * The session is generic over any `Stream`/`Sink` pair of frames. The
 * upgrade handler feeds it the two halves of an axum `WebSocket`.
 */
use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::shared::BroadcastEvent;

use super::connection::{wait_closed, CloseReason, Connection, ConnectionKey};
use super::heartbeat::{spawn_heartbeat, Liveness};
use super::hub::RealtimeHub;
use super::protocol::{classify, Inbound};
use super::registry::ConnectionRegistry;

/// Closes and deregisters a connection when dropped
struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    conn: Arc<Connection>,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.conn.close(CloseReason::TransportError);
        self.registry.remove(&self.conn);
    }
}

/// Run a session for `key` over `reader`/`writer` until it ends.
///
/// Returns the reason the connection closed.
pub async fn run_session<R, W, RE>(hub: Arc<RealtimeHub>, key: ConnectionKey, reader: R, writer: W) -> CloseReason
where
    R: Stream<Item = Result<Message, RE>> + Send,
    RE: Display + Send,
    W: Sink<Message> + Send + 'static,
    W::Error: Display + Send,
{
    let _tracker = hub.track_session();
    let config = hub.config();

    let (conn, channels) = Connection::new(key, config.outbound_queue_capacity);
    let guard = RegistrationGuard {
        registry: hub.registry().clone(),
        conn: conn.clone(),
    };

    if let Some(prior) = hub.registry().register(conn.clone()) {
        tracing::info!(
            user_id = %conn.user_id(),
            connection_id = %conn.id(),
            superseded = %prior.id(),
            "[Realtime] Closing superseded connection"
        );
        prior.close(CloseReason::Superseded);
    }
    hub.admission().record_success(conn.user_id());

    // shutdown may have drained the registry just before we registered
    if hub.is_shutting_down() {
        conn.close(CloseReason::ServerShutdown);
    }

    tracing::info!(
        user_id = %conn.user_id(),
        connection_id = %conn.id(),
        chatroom_id = ?conn.chatroom_id(),
        device = %conn.key().device,
        "[Realtime] Connection active"
    );

    send_greeting(&conn);

    let write_timeout = config.write_timeout();
    let mut writer_task = tokio::spawn(write_loop(
        writer,
        channels.outbound,
        conn.subscribe_close(),
        conn.clone(),
        write_timeout,
    ));
    let (liveness, heartbeat_task) = spawn_heartbeat(conn.clone(), &config.heartbeat);

    let read_reason = read_loop(&conn, reader, &liveness, channels.closed).await;
    conn.close(read_reason);
    let reason = conn.close_reason().unwrap_or(read_reason);

    heartbeat_task.abort();
    drop(guard);

    // give the writer a chance to put the close frame on the wire
    if timeout(write_timeout, &mut writer_task).await.is_err() {
        writer_task.abort();
    }

    tracing::info!(
        user_id = %conn.user_id(),
        connection_id = %conn.id(),
        reason = %reason,
        close_code = reason.close_code(),
        "[Realtime] Connection closed"
    );
    reason
}

async fn read_loop<R, RE>(
    conn: &Connection,
    reader: R,
    liveness: &Liveness,
    mut closed: watch::Receiver<Option<CloseReason>>,
) -> CloseReason
where
    R: Stream<Item = Result<Message, RE>>,
    RE: Display,
{
    let mut reader = pin!(reader);
    loop {
        tokio::select! {
            reason = wait_closed(&mut closed) => return reason,
            frame = reader.next() => match frame {
                None => return CloseReason::ClientClosed,
                Some(Err(err)) => {
                    tracing::debug!(connection_id = %conn.id(), error = %err, "[Realtime] Read failed");
                    return CloseReason::TransportError;
                }
                Some(Ok(frame)) => match classify(&frame) {
                    Inbound::Alive { reply } => {
                        liveness.pulse();
                        if let Some(reply) = reply {
                            if let Err(err) = conn.send(reply) {
                                return err.close_reason();
                            }
                        }
                    }
                    Inbound::Ignored => {}
                    Inbound::Closed => return CloseReason::ClientClosed,
                },
            },
        }
    }
}

async fn write_loop<W>(
    writer: W,
    mut outbound: mpsc::Receiver<Message>,
    mut closed: watch::Receiver<Option<CloseReason>>,
    conn: Arc<Connection>,
    write_timeout: Duration,
) where
    W: Sink<Message>,
    W::Error: Display,
{
    let mut writer = pin!(writer);
    loop {
        tokio::select! {
            biased;
            reason = wait_closed(&mut closed) => {
                let frame = Message::Close(Some(CloseFrame {
                    code: reason.close_code(),
                    reason: Utf8Bytes::from_static(reason.description()),
                }));
                let _ = timeout(write_timeout, writer.send(frame)).await;
                let _ = timeout(write_timeout, writer.close()).await;
                return;
            }
            next = outbound.recv() => {
                let Some(frame) = next else { return };
                match timeout(write_timeout, writer.send(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::debug!(connection_id = %conn.id(), error = %err, "[Realtime] Write failed");
                        conn.close(CloseReason::TransportError);
                        return;
                    }
                    Err(_) => {
                        tracing::warn!(connection_id = %conn.id(), "[Realtime] Write timed out");
                        conn.close(CloseReason::SlowConsumer);
                        return;
                    }
                }
            }
        }
    }
}

/// Queue the `connected` event. A connection that cannot take it is closed.
fn send_greeting(conn: &Connection) -> bool {
    let greeting = BroadcastEvent::connected(conn.id().as_uuid(), conn.user_id(), conn.key().chatroom_id.clone());
    let json = match greeting.encode() {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(error = %err, "[Realtime] Failed to encode connected event");
            return false;
        }
    };
    match conn.send_text(json) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                connection_id = %conn.id(),
                user_id = %conn.user_id(),
                error = %err,
                "[Realtime] Failed to queue connected event, dropping connection"
            );
            conn.close(err.close_reason());
            false
        }
    }
}
