/**
 * Heartbeat Monitor
 *
 * Detects connections that went silent without closing. Each connection runs
 * its own small state machine:
 *
 * ```text
 * Alive ──interval since last pong──▶ AwaitingPong ──pong──▶ Alive
 *                                          │
 *                                          └──timeout──▶ Dead
 * ```
 *
 * The machine itself is pure (`HeartbeatMonitor`); `run_heartbeat` drives it
 * from a task of its own, so pings and pong observation never sit on the
 * connection's read path. Pings go out as WebSocket ping frames through the
 * connection's outbound queue. The read loop reports every pong (and every
 * application-level `heartbeat`/`ping` frame) through a `Liveness` handle.
 *
 * A connection that stops answering is closed with
 * `CloseReason::HeartbeatTimeout` exactly `interval + timeout` after its
 * last pong.
 */
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::config::HeartbeatConfig;
use super::connection::{wait_closed, CloseReason, Connection};

const PING_PAYLOAD: &[u8] = b"hb";

/// Liveness of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Alive,
    AwaitingPong { ping_sent_at: Instant },
    Dead,
}

/// What the driver should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing is due yet
    Idle,
    /// Send a ping now
    SendPing,
    /// The pong never came; tear the connection down
    Expire,
}

/// Pure heartbeat state machine
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    state: HeartbeatState,
    last_pong_at: Instant,
}

impl HeartbeatMonitor {
    pub fn new(config: &HeartbeatConfig, now: Instant) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
            state: HeartbeatState::Alive,
            last_pong_at: now,
        }
    }

    pub fn state(&self) -> HeartbeatState {
        self.state
    }

    pub fn last_pong_at(&self) -> Instant {
        self.last_pong_at
    }

    /// When the next tick has something to do. `None` once dead.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            HeartbeatState::Alive => Some(self.last_pong_at + self.interval),
            HeartbeatState::AwaitingPong { ping_sent_at } => Some(ping_sent_at + self.timeout),
            HeartbeatState::Dead => None,
        }
    }

    /// Proof of life arrived at `at`
    pub fn on_pong(&mut self, at: Instant) {
        if self.state == HeartbeatState::Dead {
            return;
        }
        self.last_pong_at = self.last_pong_at.max(at);
        self.state = HeartbeatState::Alive;
    }

    /// Advance the machine to `now`
    pub fn on_tick(&mut self, now: Instant) -> HeartbeatAction {
        match self.state {
            HeartbeatState::Alive if now >= self.last_pong_at + self.interval => {
                self.state = HeartbeatState::AwaitingPong { ping_sent_at: now };
                HeartbeatAction::SendPing
            }
            HeartbeatState::AwaitingPong { ping_sent_at } if now >= ping_sent_at + self.timeout => {
                self.state = HeartbeatState::Dead;
                HeartbeatAction::Expire
            }
            _ => HeartbeatAction::Idle,
        }
    }
}

/// Read-loop side of the heartbeat: report that the peer is alive
#[derive(Debug)]
pub struct Liveness {
    tx: watch::Sender<Instant>,
}

impl Liveness {
    pub fn new() -> (Self, watch::Receiver<Instant>) {
        let (tx, rx) = watch::channel(Instant::now());
        (Self { tx }, rx)
    }

    pub fn pulse(&self) {
        self.tx.send_replace(Instant::now());
    }
}

/// Start the heartbeat task for `conn`.
///
/// The task ends when the connection closes for any reason, when it closes
/// the connection itself, or when the `Liveness` handle is dropped.
pub fn spawn_heartbeat(conn: Arc<Connection>, config: &HeartbeatConfig) -> (Liveness, JoinHandle<()>) {
    let (liveness, pulses) = Liveness::new();
    let monitor = HeartbeatMonitor::new(config, Instant::now());
    let handle = tokio::spawn(run_heartbeat(conn, monitor, pulses));
    (liveness, handle)
}

/// Drive `monitor` for `conn` until either side gives up
pub async fn run_heartbeat(
    conn: Arc<Connection>,
    mut monitor: HeartbeatMonitor,
    mut pulses: watch::Receiver<Instant>,
) {
    let mut closed = conn.subscribe_close();

    while let Some(deadline) = monitor.next_deadline() {
        tokio::select! {
            _ = wait_closed(&mut closed) => return,
            changed = pulses.changed() => {
                if changed.is_err() {
                    return;
                }
                let at = *pulses.borrow_and_update();
                monitor.on_pong(at);
                conn.record_heartbeat();
            }
            _ = sleep_until(deadline) => match monitor.on_tick(Instant::now()) {
                HeartbeatAction::SendPing => {
                    tracing::trace!(connection_id = %conn.id(), "[Realtime] Ping");
                    if let Err(err) = conn.send(Message::Ping(Bytes::from_static(PING_PAYLOAD))) {
                        conn.close(err.close_reason());
                        return;
                    }
                }
                HeartbeatAction::Expire => {
                    tracing::warn!(
                        connection_id = %conn.id(),
                        user_id = %conn.user_id(),
                        "[Realtime] Heartbeat timeout, closing connection"
                    );
                    conn.close(CloseReason::HeartbeatTimeout);
                    return;
                }
                HeartbeatAction::Idle => {}
            },
        }
    }
}
