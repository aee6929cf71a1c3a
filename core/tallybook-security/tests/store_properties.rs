mod common;

use chrono::Duration;
use common::t0;
use proptest::prelude::*;
use std::sync::Arc;
use tallybook_security::{
    AccountSecurity, LoginAttemptTracker, MemorySecurityStore, RecoveryState, RecoveryWindow,
    SecurityStore,
};
use tallybook_types::{Identity, ManualClock};

proptest! {
    #[test]
    fn lockout_fires_once_per_episode(threshold in 1u32..20, failures in 0u32..60) {
        let store = Arc::new(MemorySecurityStore::new());
        let tracker = LoginAttemptTracker::new(store, Arc::new(ManualClock::new(t0())), threshold);
        let id = Identity::parse("admin@example.com").unwrap();

        let mut triggered = 0;
        for _ in 0..failures {
            if tracker.record_failure(&id).unwrap().lockout_triggered {
                triggered += 1;
            }
        }
        prop_assert_eq!(triggered, u32::from(failures >= threshold));
        prop_assert_eq!(
            tracker.attempts_remaining(&id).unwrap(),
            threshold.saturating_sub(failures)
        );
    }

    #[test]
    fn open_window_means_recovery_open(hours_in in 0i64..24, count in 10u32..30) {
        let window = RecoveryWindow::open(t0(), Duration::hours(24));
        let account = AccountSecurity {
            counter: Some(tallybook_security::LoginAttemptCounter {
                count,
                first_failure: t0(),
                last_failure: t0(),
            }),
            window: Some(window),
        };
        let now = t0() + Duration::hours(hours_in);
        prop_assert_eq!(RecoveryState::of(&account, now, 10), RecoveryState::RecoveryOpen);
        let later = t0() + Duration::hours(24 + hours_in);
        prop_assert_eq!(RecoveryState::of(&account, later, 10), RecoveryState::Expired);
    }
}

#[test]
fn failed_update_writes_nothing() {
    let store = MemorySecurityStore::new();
    let id = Identity::parse("admin@example.com").unwrap();
    let result = store.update(&id, &mut |state| {
        state.window = Some(RecoveryWindow::open(t0(), Duration::hours(1)));
        Err(tallybook_security::SecurityError::StorageUnavailable("abort".into()))
    });
    assert!(result.is_err());
    assert!(store.load(&id).unwrap().is_empty());
}
