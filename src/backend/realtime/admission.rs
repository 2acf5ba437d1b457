/**
 * Admission Control
 *
 * Throttles connection attempts before any upgrade work happens. Two limits
 * apply per user, whatever device label or room the attempt names:
 *
 * - a cooldown between two admitted attempts; an attempt inside it is
 *   answered with `Delayed(remaining)`
 * - a cap on attempts inside a rolling window; past it the attempt is
 *   `Rejected` with the time until the oldest attempt leaves the window
 *
 * A global semaphore bounds how many upgrades may be mid-handshake at once.
 *
 * Records live in a `DashMap` so that unrelated users never contend on
 * one lock. A record is only touched for the duration of a single decision.
 * Stale records are dropped by `purge_expired`, which the server runs from a
 * periodic sweeper task.
 */
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use uuid::Uuid;

use super::config::AdmissionConfig;

/// Admission decision for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed with the upgrade
    Allowed,
    /// Too soon after the previous attempt; retry after this long
    Delayed(Duration),
    /// Too many attempts in the window
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
struct AdmissionRecord {
    last_attempt_at: Option<Instant>,
    attempts: VecDeque<Instant>,
}

impl AdmissionRecord {
    fn new() -> Self {
        Self {
            last_attempt_at: None,
            attempts: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.attempts.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A slot in the pending-handshake budget, released on drop
#[derive(Debug)]
pub struct HandshakePermit {
    _permit: OwnedSemaphorePermit,
}

/// Per-user connection throttle
#[derive(Debug)]
pub struct AdmissionControl {
    config: AdmissionConfig,
    records: DashMap<Uuid, AdmissionRecord>,
    handshakes: Arc<Semaphore>,
}

impl AdmissionControl {
    pub fn new(config: AdmissionConfig) -> Self {
        let handshakes = Arc::new(Semaphore::new(config.max_pending_handshakes));
        Self {
            config,
            records: DashMap::new(),
            handshakes,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Decide on an attempt by `user_id` happening now.
    ///
    /// An `Allowed` answer counts as an attempt. `Delayed` and `Rejected`
    /// answers leave the record unchanged.
    pub fn try_admit(&self, user_id: Uuid) -> Admission {
        self.try_admit_at(user_id, Instant::now())
    }

    fn try_admit_at(&self, user_id: Uuid, now: Instant) -> Admission {
        let window = self.config.window();
        let cooldown = self.config.cooldown();

        let mut record = self
            .records
            .entry(user_id)
            .or_insert_with(AdmissionRecord::new);
        record.prune(now, window);

        if record.attempts.len() >= self.config.max_attempts {
            let retry_after = record
                .attempts
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now))
                .unwrap_or(window);
            tracing::debug!(
                user_id = %user_id,
                attempts = record.attempts.len(),
                retry_after_ms = retry_after.as_millis() as u64,
                "[Realtime] Connection attempt rejected"
            );
            return Admission::Rejected { retry_after };
        }

        if let Some(last) = record.last_attempt_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                return Admission::Delayed(cooldown - elapsed);
            }
        }

        record.last_attempt_at = Some(now);
        record.attempts.push_back(now);
        Admission::Allowed
    }

    /// A connection for `user_id` registered. Clears the attempt count; the
    /// cooldown still runs from the last attempt.
    pub fn record_success(&self, user_id: Uuid) {
        if let Some(mut record) = self.records.get_mut(&user_id) {
            record.attempts.clear();
        }
    }

    /// Drop records with no attempt inside the window. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let window = self.config.window();
        let before = self.records.len();
        self.records.retain(|_, record| {
            record
                .last_attempt_at
                .is_some_and(|last| now.saturating_duration_since(last) < window)
        });
        before.saturating_sub(self.records.len())
    }

    /// Users currently tracked
    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    /// Reserve a handshake slot, or `None` when the server is saturated
    pub fn try_begin_handshake(&self) -> Option<HandshakePermit> {
        self.handshakes
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| HandshakePermit { _permit: permit })
    }

    /// Handshakes currently holding a slot
    pub fn pending_handshakes(&self) -> usize {
        self.config
            .max_pending_handshakes
            .saturating_sub(self.handshakes.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn control(max_attempts: usize) -> AdmissionControl {
        AdmissionControl::new(AdmissionConfig {
            cooldown_ms: 500,
            window_ms: 10_000,
            max_attempts,
            max_pending_handshakes: 2,
            ..AdmissionConfig::default()
        })
    }

    #[test]
    fn test_second_attempt_inside_cooldown_is_delayed() {
        let admission = control(10);
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(admission.try_admit_at(user, t0), Admission::Allowed);
        assert_eq!(
            admission.try_admit_at(user, t0 + Duration::from_millis(200)),
            Admission::Delayed(Duration::from_millis(300))
        );
        assert_eq!(
            admission.try_admit_at(user, t0 + Duration::from_millis(500)),
            Admission::Allowed
        );
    }

    #[test]
    fn test_rejected_after_max_attempts_in_window() {
        let admission = control(3);
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        for i in 0..3 {
            let at = t0 + Duration::from_secs(i);
            assert_eq!(admission.try_admit_at(user, at), Admission::Allowed);
        }
        assert_eq!(
            admission.try_admit_at(user, t0 + Duration::from_secs(4)),
            Admission::Rejected {
                retry_after: Duration::from_secs(6)
            }
        );
        // oldest attempt has left the window
        assert_eq!(
            admission.try_admit_at(user, t0 + Duration::from_secs(10)),
            Admission::Allowed
        );
    }

    #[test]
    fn test_users_are_independent() {
        let admission = control(10);
        let t0 = Instant::now();

        assert_eq!(admission.try_admit_at(Uuid::new_v4(), t0), Admission::Allowed);
        assert_eq!(admission.try_admit_at(Uuid::new_v4(), t0), Admission::Allowed);
        assert_eq!(admission.tracked(), 2);
    }

    #[test]
    fn test_device_labels_share_one_budget() {
        let admission = control(3);
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        // the device label never reaches admission, so every attempt is the same user
        let allowed = (0..100)
            .filter(|_| admission.try_admit_at(user, t0) == Admission::Allowed)
            .count();
        assert_eq!(allowed, 1);
        assert_eq!(admission.tracked(), 1);

        for i in 1..3 {
            let at = t0 + Duration::from_secs(i);
            assert_eq!(admission.try_admit_at(user, at), Admission::Allowed);
        }
        assert_matches!(
            admission.try_admit_at(user, t0 + Duration::from_secs(4)),
            Admission::Rejected { .. }
        );
    }

    #[test]
    fn test_success_resets_count_but_keeps_cooldown() {
        let admission = control(2);
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        admission.try_admit_at(user, t0);
        admission.try_admit_at(user, t0 + Duration::from_secs(1));
        admission.record_success(user);

        assert_matches!(
            admission.try_admit_at(user, t0 + Duration::from_millis(1_100)),
            Admission::Delayed(_)
        );
        assert_eq!(
            admission.try_admit_at(user, t0 + Duration::from_secs(2)),
            Admission::Allowed
        );
    }

    #[test]
    fn test_purge_drops_only_stale_records() {
        let admission = control(10);
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let t0 = Instant::now();

        admission.try_admit_at(stale, t0);
        admission.try_admit_at(fresh, t0 + Duration::from_secs(8));

        assert_eq!(admission.purge_expired_at(t0 + Duration::from_secs(12)), 1);
        assert_eq!(admission.tracked(), 1);
        assert_eq!(
            admission.try_admit_at(stale, t0 + Duration::from_secs(12)),
            Admission::Allowed
        );
    }

    #[test]
    fn test_handshake_permits_are_bounded_and_released() {
        let admission = control(10);
        let first = admission.try_begin_handshake().expect("first permit");
        let _second = admission.try_begin_handshake().expect("second permit");
        assert!(admission.try_begin_handshake().is_none());
        assert_eq!(admission.pending_handshakes(), 2);

        drop(first);
        assert!(admission.try_begin_handshake().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_admit_follows_the_clock() {
        let admission = control(10);
        let user = Uuid::new_v4();

        assert_eq!(admission.try_admit(user), Admission::Allowed);
        assert_matches!(admission.try_admit(user), Admission::Delayed(_));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(admission.try_admit(user), Admission::Allowed);
    }
}
