//! Consecutive failed-login counting.

use crate::error::SecurityResult;
use crate::store::{AccountSecurity, LoginAttemptCounter, SecurityStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tallybook_types::{Clock, Identity};
use tracing::{debug, warn};

/// Result of recording one failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOutcome {
    /// Consecutive failures including this one.
    pub count: u32,
    /// True only for the failure that reached the threshold.
    pub lockout_triggered: bool,
    pub attempts_remaining: u32,
}

/// Counts consecutive failed authentications per identity.
pub struct LoginAttemptTracker {
    store: Arc<dyn SecurityStore>,
    clock: Arc<dyn Clock>,
    threshold: u32,
}

impl LoginAttemptTracker {
    pub fn new(store: Arc<dyn SecurityStore>, clock: Arc<dyn Clock>, threshold: u32) -> Self {
        Self {
            store,
            clock,
            threshold: threshold.max(1),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Records a failed login for `identity`.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the counter could not be updated.
    pub fn record_failure(&self, identity: &Identity) -> SecurityResult<FailureOutcome> {
        self.record_failure_with(identity, &mut |_, _| {})
    }

    /// Records a failed login and, in the same store transaction, runs
    /// `on_lockout` if this failure reached the threshold.
    pub(crate) fn record_failure_with(
        &self,
        identity: &Identity,
        on_lockout: &mut dyn FnMut(&mut AccountSecurity, DateTime<Utc>),
    ) -> SecurityResult<FailureOutcome> {
        let now = self.clock.now();
        let threshold = self.threshold;

        let state = self.store.update(identity, &mut |state| {
            if episode_lapsed(state, now, threshold) {
                debug!(identity = %identity, "Previous lockout episode lapsed, restarting count");
                state.counter = None;
            }

            let count = match &mut state.counter {
                Some(counter) => {
                    counter.count = counter.count.saturating_add(1);
                    counter.last_failure = now;
                    counter.count
                }
                None => {
                    state.counter = Some(LoginAttemptCounter::first(now));
                    1
                }
            };

            if count == threshold {
                on_lockout(state, now);
            }
            Ok(())
        })?;

        let count = state.failed_attempts();
        let lockout_triggered = count == threshold;
        if lockout_triggered {
            warn!(identity = %identity, count, "Lockout threshold reached");
        } else {
            debug!(identity = %identity, count, "Failed login recorded");
        }

        Ok(FailureOutcome {
            count,
            lockout_triggered,
            attempts_remaining: threshold.saturating_sub(count),
        })
    }

    /// Clears the counter for `identity`.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the counter could not be cleared.
    pub fn record_success(&self, identity: &Identity) -> SecurityResult<()> {
        self.store.update(identity, &mut |state| {
            state.counter = None;
            Ok(())
        })?;
        debug!(identity = %identity, "Failed login counter cleared");
        Ok(())
    }

    /// Failures left before lockout, never negative.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the counter could not be read.
    pub fn attempts_remaining(&self, identity: &Identity) -> SecurityResult<u32> {
        let state = self.store.load(identity)?;
        Ok(self.threshold.saturating_sub(state.failed_attempts()))
    }
}

/// A locked-out episode whose recovery window ran out unused is over; the
/// next failure starts counting from one again.
fn episode_lapsed(state: &AccountSecurity, now: DateTime<Utc>, threshold: u32) -> bool {
    let Some(window) = &state.window else {
        return false;
    };
    !window.is_consumed() && window.is_expired_at(now) && state.failed_attempts() >= threshold
}
