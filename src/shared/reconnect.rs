//! Client Reconnect State Machine
//!
//! Web and mobile clients all need the same reconnect discipline: at most one
//! attempt in flight, exponential backoff after failures, and respect for the
//! server's admission answers (`429` with a retry hint). This module is that
//! discipline as one explicit state machine instead of per-client booleans
//! and timers.
//!
//! ```text
//! Disconnected ──begin_attempt──▶ Connecting ──Connected──▶ Connected
//!      ▲                            │                          │
//!      │ AuthFailed / gave up       │ Failed/Delayed/Rejected  │ on_disconnect
//!      └────────────────────────────┴──────▶ Backoff ◀─────────┘
//!                                             │ begin_attempt (after delay)
//!                                             ▼
//!                                          Connecting
//! ```
//!
//! The state machine performs no I/O and owns no timers; the caller sleeps
//! for the returned delay and then calls `begin_attempt` again.

use std::time::Duration;
use thiserror::Error;

/// Backoff tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for the exponential delay
    pub max_delay: Duration,
    /// Minimum spacing between two attempts, matching the server cooldown
    pub cooldown: Duration,
    /// Give up after this many consecutive failures (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            cooldown: Duration::from_millis(500),
            max_attempts: None,
        }
    }
}

/// Where the client currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientConnectionState {
    /// Idle; either never connected or stopped for good
    Disconnected,
    /// An attempt is in flight
    Connecting { attempt: u32 },
    /// Socket is open
    Connected,
    /// Waiting before the next attempt
    Backoff { attempt: u32, delay: Duration },
}

/// How a connection attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Upgrade succeeded
    Connected,
    /// Token rejected; retrying with the same token is pointless
    AuthFailed,
    /// Server admission asked to wait this long
    Delayed(Duration),
    /// Server admission rejected the attempt until the window decays
    Rejected { retry_after: Duration },
    /// Network or protocol failure
    Failed,
}

/// Invalid transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconnectError {
    #[error("a connection attempt is already in flight")]
    AttemptInFlight,
    #[error("already connected")]
    AlreadyConnected,
    #[error("no outcome expected in state {0:?}")]
    UnexpectedOutcome(ClientConnectionState),
}

/// Reconnect state machine for a single logical connection
#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: ClientConnectionState,
    failures: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ClientConnectionState::Disconnected,
            failures: 0,
        }
    }

    pub fn state(&self) -> &ClientConnectionState {
        &self.state
    }

    /// Consecutive failed attempts since the last successful connection
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Start an attempt. Refuses while another attempt is pending or the
    /// socket is already open, which replaces the ad hoc "pending connection"
    /// queues clients tend to grow.
    pub fn begin_attempt(&mut self) -> Result<u32, ReconnectError> {
        match self.state {
            ClientConnectionState::Connecting { .. } => Err(ReconnectError::AttemptInFlight),
            ClientConnectionState::Connected => Err(ReconnectError::AlreadyConnected),
            ClientConnectionState::Disconnected | ClientConnectionState::Backoff { .. } => {
                let attempt = self.failures + 1;
                self.state = ClientConnectionState::Connecting { attempt };
                Ok(attempt)
            }
        }
    }

    /// Record how the in-flight attempt ended.
    ///
    /// Returns the delay to wait before the next `begin_attempt`, or `None`
    /// when no retry should be scheduled (connected, auth failure, or the
    /// attempt budget is spent).
    pub fn on_outcome(&mut self, outcome: AttemptOutcome) -> Result<Option<Duration>, ReconnectError> {
        if !matches!(self.state, ClientConnectionState::Connecting { .. }) {
            return Err(ReconnectError::UnexpectedOutcome(self.state.clone()));
        }

        let delay = match outcome {
            AttemptOutcome::Connected => {
                self.failures = 0;
                self.state = ClientConnectionState::Connected;
                return Ok(None);
            }
            AttemptOutcome::AuthFailed => {
                self.state = ClientConnectionState::Disconnected;
                return Ok(None);
            }
            // A cooldown hint is not a failure; keep the exponent where it is.
            AttemptOutcome::Delayed(wait) => wait.max(self.policy.cooldown),
            AttemptOutcome::Rejected { retry_after } => {
                self.failures += 1;
                retry_after.max(self.exponential_delay())
            }
            AttemptOutcome::Failed => {
                self.failures += 1;
                self.exponential_delay()
            }
        };

        if let Some(max) = self.policy.max_attempts {
            if self.failures >= max {
                self.state = ClientConnectionState::Disconnected;
                return Ok(None);
            }
        }

        self.state = ClientConnectionState::Backoff {
            attempt: self.failures + 1,
            delay,
        };
        Ok(Some(delay))
    }

    /// The open socket dropped. Schedules a reconnect after the cooldown.
    pub fn on_disconnect(&mut self) -> Duration {
        let delay = self.policy.cooldown;
        self.state = ClientConnectionState::Backoff {
            attempt: self.failures + 1,
            delay,
        };
        delay
    }

    /// Stop reconnecting (logout, app backgrounded).
    pub fn reset(&mut self) {
        self.failures = 0;
        self.state = ClientConnectionState::Disconnected;
    }

    fn exponential_delay(&self) -> Duration {
        let exponent = self.failures.saturating_sub(1).min(16);
        let delay = self.policy.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.policy.max_delay).max(self.policy.cooldown)
    }
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
