//! Emergency recovery for a locked-out account.
//!
//! Per identity the controller moves through
//! `Normal -> RecoveryOpen -> Recovered (-> Normal)`, with `Expired` derived
//! lazily when a window runs out unused. Nothing is scheduled: every state is
//! computed from the stored counter and window against the clock.

use crate::config::SecurityConfig;
use crate::credential::{CredentialHasher, CredentialStore};
use crate::error::{RecoveryRejection, SecurityError, SecurityResult};
use crate::store::{AccountSecurity, RecoveryWindow, SecurityStore};
use crate::tracker::{FailureOutcome, LoginAttemptTracker};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tallybook_types::{AuditAction, AuditEvent, AuditTrail, Clock, Identity, Outcome};
use tracing::{error, info, warn};

/// Derived recovery state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Normal,
    RecoveryOpen,
    Recovered,
    Expired,
}

impl RecoveryState {
    /// Derives the state from stored data.
    #[must_use]
    pub fn of(account: &AccountSecurity, now: DateTime<Utc>, threshold: u32) -> Self {
        let Some(window) = &account.window else {
            return Self::Normal;
        };
        if window.is_consumed() {
            return if account.counter.is_none() {
                Self::Recovered
            } else {
                Self::Normal
            };
        }
        if !window.is_expired_at(now) {
            return Self::RecoveryOpen;
        }
        if account.failed_attempts() >= threshold {
            Self::Expired
        } else {
            Self::Normal
        }
    }
}

/// Why emergency mode is off while something is still notable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    /// The recovery window ran out unused.
    Expired,
    /// Security state could not be read.
    StorageUnavailable,
}

/// What the login screen polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyStatus {
    pub emergency_mode: bool,
    pub failed_attempts: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<StatusReason>,
}

impl EmergencyStatus {
    fn empty(reason: Option<StatusReason>) -> Self {
        Self {
            emergency_mode: false,
            failed_attempts: 0,
            expires_at: None,
            reason,
        }
    }
}

/// Opens, reports and consumes emergency recovery windows.
pub struct EmergencyRecoveryController {
    tracker: LoginAttemptTracker,
    store: Arc<dyn SecurityStore>,
    credentials: Arc<dyn CredentialStore>,
    hasher: CredentialHasher,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    window_length: Duration,
}

impl EmergencyRecoveryController {
    pub fn new(
        store: Arc<dyn SecurityStore>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            tracker: LoginAttemptTracker::new(store.clone(), clock.clone(), config.lockout_threshold),
            store,
            credentials,
            hasher: CredentialHasher::new(config.kdf.clone()),
            clock,
            audit,
            window_length: config.recovery_window(),
        }
    }

    pub fn tracker(&self) -> &LoginAttemptTracker {
        &self.tracker
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    /// Records a failed login, opening a recovery window in the same store
    /// transaction when this failure reaches the threshold.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the security store could not be updated.
    pub fn record_failed_login(&self, identity: &Identity) -> SecurityResult<FailureOutcome> {
        let window_length = self.window_length;
        let outcome = self
            .tracker
            .record_failure_with(identity, &mut |state, now| {
                state.window = Some(RecoveryWindow::open(now, window_length));
            })?;

        let now = self.clock.now();
        self.audit.record(
            AuditEvent::new(now, identity.as_str(), AuditAction::LoginFailed, Outcome::Failure)
                .with_detail(format!("consecutive_failures={}", outcome.count)),
        );
        if outcome.lockout_triggered {
            warn!(
                identity = %identity,
                window_hours = self.window_length.num_hours(),
                "Account locked out, emergency recovery window opened"
            );
            self.audit.record(
                AuditEvent::new(now, identity.as_str(), AuditAction::LockoutTriggered, Outcome::Failure)
                    .with_detail(format!(
                        "recovery window open for {}h",
                        self.window_length.num_hours()
                    )),
            );
        }
        Ok(outcome)
    }

    /// Clears the failure counter after a successful login.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the counter could not be cleared.
    pub fn record_successful_login(&self, identity: &Identity) -> SecurityResult<()> {
        self.tracker.record_success(identity)?;
        self.audit.record(AuditEvent::new(
            self.clock.now(),
            identity.as_str(),
            AuditAction::LoginSucceeded,
            Outcome::Success,
        ));
        Ok(())
    }

    /// Emergency status for the login screen. Never fails: a storage error is
    /// logged and reported as an empty status.
    pub fn status(&self, identity: &Identity) -> EmergencyStatus {
        let account = match self.store.load(identity) {
            Ok(account) => account,
            Err(e) => {
                error!(identity = %identity, error = %e, "Emergency status read failed");
                return EmergencyStatus::empty(Some(StatusReason::StorageUnavailable));
            }
        };

        let now = self.clock.now();
        let failed_attempts = account.failed_attempts();
        match (RecoveryState::of(&account, now, self.tracker.threshold()), &account.window) {
            (RecoveryState::RecoveryOpen, Some(window)) => EmergencyStatus {
                emergency_mode: true,
                failed_attempts,
                expires_at: Some(window.expires_at),
                reason: None,
            },
            (RecoveryState::Expired, Some(window)) => EmergencyStatus {
                emergency_mode: false,
                failed_attempts,
                expires_at: Some(window.expires_at),
                reason: Some(StatusReason::Expired),
            },
            _ => EmergencyStatus {
                failed_attempts,
                ..EmergencyStatus::empty(None)
            },
        }
    }

    /// Derived recovery state for `identity`.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the security store could not be read.
    pub fn state(&self, identity: &Identity) -> SecurityResult<RecoveryState> {
        let account = self.store.load(identity)?;
        Ok(RecoveryState::of(
            &account,
            self.clock.now(),
            self.tracker.threshold(),
        ))
    }

    /// Uses the open recovery window to set a new password.
    ///
    /// The password is hashed first. Consuming the window, clearing the
    /// counter and storing the new credential then happen in one store
    /// transaction, so a failure leaves the window open for a retry.
    ///
    /// # Errors
    ///
    /// [`SecurityError::RecoveryWindowInvalid`] if no usable window exists,
    /// `Hashing` if the password could not be hashed, or `StorageUnavailable`
    /// if the transaction could not be committed.
    pub fn reset(&self, identity: &Identity, new_password: &str) -> SecurityResult<()> {
        let now = self.clock.now();
        let result = self.hasher.hash(new_password).and_then(|phc| {
            self.store.update_with_credential(
                identity,
                &mut |state| {
                    let window = state.window.as_mut().ok_or(
                        SecurityError::RecoveryWindowInvalid(RecoveryRejection::NeverOpened),
                    )?;
                    if window.is_consumed() {
                        return Err(SecurityError::RecoveryWindowInvalid(
                            RecoveryRejection::AlreadyUsed,
                        ));
                    }
                    if window.is_expired_at(now) {
                        return Err(SecurityError::RecoveryWindowInvalid(
                            RecoveryRejection::Expired,
                        ));
                    }
                    window.consumed_at = Some(now);
                    state.counter = None;
                    Ok(())
                },
                &phc,
            )
        });

        match result {
            Ok(_) => {
                info!(identity = %identity, "Emergency reset completed");
                self.audit.record(
                    AuditEvent::new(
                        now,
                        identity.as_str(),
                        AuditAction::EmergencyResetCompleted,
                        Outcome::Success,
                    )
                    .with_detail("credential replaced through recovery window"),
                );
                Ok(())
            }
            Err(SecurityError::RecoveryWindowInvalid(reason)) => {
                warn!(identity = %identity, reason = %reason, "Emergency reset rejected");
                self.audit.record(
                    AuditEvent::new(
                        now,
                        identity.as_str(),
                        AuditAction::EmergencyResetRejected,
                        Outcome::Failure,
                    )
                    .with_detail(reason.as_str()),
                );
                Err(SecurityError::RecoveryWindowInvalid(reason))
            }
            Err(e) => {
                error!(identity = %identity, error = %e, "Emergency reset failed, window left open");
                self.audit.record(
                    AuditEvent::new(
                        now,
                        identity.as_str(),
                        AuditAction::EmergencyResetFailed,
                        Outcome::Failure,
                    )
                    .with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }
}
