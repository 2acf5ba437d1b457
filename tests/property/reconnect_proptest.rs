//! Property-based tests for the client reconnect state machine

use std::time::Duration;

use proptest::prelude::*;
use roomchat::shared::{AttemptOutcome, ClientConnectionState, ReconnectPolicy, Reconnector};

fn outcome() -> impl Strategy<Value = AttemptOutcome> {
    prop_oneof![
        Just(AttemptOutcome::Connected),
        Just(AttemptOutcome::Failed),
        (0..5_000u64).prop_map(|ms| AttemptOutcome::Delayed(Duration::from_millis(ms))),
        (0..120_000u64).prop_map(|ms| AttemptOutcome::Rejected {
            retry_after: Duration::from_millis(ms)
        }),
    ]
}

proptest! {
    #[test]
    fn test_delays_respect_cooldown_and_hints(outcomes in prop::collection::vec(outcome(), 1..40)) {
        let policy = ReconnectPolicy::default();
        let mut reconnector = Reconnector::new(policy.clone());

        for outcome in outcomes {
            if *reconnector.state() == ClientConnectionState::Connected {
                reconnector.on_disconnect();
            }
            reconnector.begin_attempt().unwrap();
            prop_assert!(reconnector.begin_attempt().is_err());

            let hint = match &outcome {
                AttemptOutcome::Delayed(d) => *d,
                AttemptOutcome::Rejected { retry_after } => *retry_after,
                _ => Duration::ZERO,
            };
            match reconnector.on_outcome(outcome).unwrap() {
                Some(delay) => {
                    prop_assert!(delay >= policy.cooldown);
                    prop_assert!(delay >= hint);
                    prop_assert!(delay <= policy.max_delay.max(hint));
                }
                None => prop_assert_eq!(reconnector.state(), &ClientConnectionState::Connected),
            }
        }
    }
}
