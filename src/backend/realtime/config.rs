//! Realtime tuning knobs.
//!
//! Every field has a serde default, so a config file only needs to name the
//! values it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the upgrade endpoint does when admission answers `Delayed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DelayPolicy {
    /// Sleep out the delay, then ask admission once more
    #[default]
    Defer,
    /// Answer 429 with `Retry-After` and let the client back off
    Reject,
}

/// Heartbeat schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Time between the last pong and the next ping
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// How long to wait for a pong after a ping
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Connection admission limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Minimum spacing between two admitted attempts for one identity
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,

    /// Rolling window for counting attempts
    #[serde(default = "default_window")]
    pub window_ms: u64,

    /// Attempts allowed per window before `Rejected`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Upgrades allowed to be in their handshake at the same time
    #[serde(default = "default_max_pending_handshakes")]
    pub max_pending_handshakes: usize,

    #[serde(default)]
    pub delay_policy: DelayPolicy,

    /// Longest delay the server will sit out under `DelayPolicy::Defer`
    #[serde(default = "default_max_defer")]
    pub max_defer_ms: u64,

    /// Live connections one user may hold across devices and rooms
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown(),
            window_ms: default_window(),
            max_attempts: default_max_attempts(),
            max_pending_handshakes: default_max_pending_handshakes(),
            delay_policy: DelayPolicy::default(),
            max_defer_ms: default_max_defer(),
            max_connections_per_user: default_max_connections_per_user(),
        }
    }
}

impl AdmissionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn max_defer(&self) -> Duration {
        Duration::from_millis(self.max_defer_ms)
    }
}

/// Everything the realtime core needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Frames buffered per connection before it counts as a slow consumer
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Per-frame socket write timeout
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// How long shutdown waits for sessions to wind down
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// Period of the admission-record sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            admission: AdmissionConfig::default(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            write_timeout_ms: default_write_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

impl RealtimeConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Check invariants the runtime relies on. Returns the offending key.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.heartbeat.interval_ms == 0 {
            return Err(("realtime.heartbeat.interval_ms", "must be greater than zero".into()));
        }
        if self.heartbeat.timeout_ms == 0 || self.heartbeat.timeout_ms >= self.heartbeat.interval_ms {
            return Err((
                "realtime.heartbeat.timeout_ms",
                "must be greater than zero and below interval_ms".into(),
            ));
        }
        if self.admission.window_ms < self.admission.cooldown_ms {
            return Err(("realtime.admission.window_ms", "must not be shorter than cooldown_ms".into()));
        }
        if self.admission.max_attempts == 0 {
            return Err(("realtime.admission.max_attempts", "must be greater than zero".into()));
        }
        if self.admission.max_connections_per_user == 0 {
            return Err((
                "realtime.admission.max_connections_per_user",
                "must be greater than zero".into(),
            ));
        }
        if self.admission.max_pending_handshakes == 0 {
            return Err((
                "realtime.admission.max_pending_handshakes",
                "must be greater than zero".into(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(("realtime.outbound_queue_capacity", "must be greater than zero".into()));
        }
        if self.write_timeout_ms == 0 {
            return Err(("realtime.write_timeout_ms", "must be greater than zero".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(("realtime.sweep_interval_ms", "must be greater than zero".into()));
        }
        Ok(())
    }
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_heartbeat_timeout() -> u64 {
    5_000
}

fn default_cooldown() -> u64 {
    500
}

fn default_window() -> u64 {
    60_000
}

fn default_max_attempts() -> usize {
    10
}

fn default_max_pending_handshakes() -> usize {
    256
}

fn default_max_defer() -> u64 {
    2_000
}

fn default_max_connections_per_user() -> usize {
    10
}

fn default_outbound_queue_capacity() -> usize {
    64
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_shutdown_grace() -> u64 {
    5_000
}

fn default_sweep_interval() -> u64 {
    300_000
}
