//! Entitlement service: activation, status and trial issuance.

use crate::claim::{LicenseClaim, LicenseClass};
use crate::codec::LicenseCodec;
use crate::config::LicenseConfig;
use crate::error::{DecodeError, LicenseError, LicenseResult};
use crate::record::{LicenseRecord, RecordStatus};
use crate::store::LicenseStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tallybook_types::{AuditAction, AuditEvent, AuditTrail, Clock, Outcome, RecordId, Severity};
use tracing::{debug, error, info, warn};

const SYSTEM_ACTOR: &str = "system";

/// Why the installation is not currently entitled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveReason {
    /// No license has ever been activated.
    NotActivated,
    /// The current license's expiry has passed.
    Expired,
    /// The stored token does not verify under the current key.
    InvalidToken,
    /// The license store could not be read.
    StorageUnavailable,
}

impl InactiveReason {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotActivated => "No license has been activated",
            Self::Expired => "The license has expired",
            Self::InvalidToken => "The stored license key is no longer valid",
            Self::StorageUnavailable => "License information is temporarily unavailable",
        }
    }
}

/// Answer to "is this installation entitled right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatusReport {
    pub activated: bool,
    pub valid: bool,
    pub claim: Option<LicenseClaim>,
    pub days_remaining: Option<i64>,
    pub reason: Option<InactiveReason>,
}

impl LicenseStatusReport {
    fn unlicensed(reason: InactiveReason) -> Self {
        Self {
            activated: false,
            valid: false,
            claim: None,
            days_remaining: None,
            reason: Some(reason),
        }
    }
}

/// Outcome of a successful `activate` call.
///
/// A token that was already expired is still stored; check
/// [`ActivationResult::is_active`] or call [`ActivationResult::ensure_active`].
#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub record: LicenseRecord,
    pub claim: LicenseClaim,
    /// The previously active record, with its retirement status.
    pub superseded: Option<LicenseRecord>,
    pub days_remaining: i64,
}

impl ActivationResult {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.record.status == RecordStatus::Active
    }

    /// Converts an activation of an already-expired token into an error.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::ExpiredLicense`] if the stored record is not active.
    pub fn ensure_active(self) -> LicenseResult<Self> {
        if self.is_active() {
            Ok(self)
        } else {
            Err(LicenseError::ExpiredLicense(
                self.claim.expires_at_time().format("%Y-%m-%d").to_string(),
            ))
        }
    }
}

enum Evaluation {
    Valid { claim: LicenseClaim, days: i64 },
    Expired { claim: LicenseClaim, days: i64 },
    Unverifiable(DecodeError),
}

/// Orchestrates the codec, the license store and the audit trail.
pub struct EntitlementService {
    codec: Arc<LicenseCodec>,
    store: Arc<dyn LicenseStore>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    config: LicenseConfig,
}

impl EntitlementService {
    pub fn new(
        codec: Arc<LicenseCodec>,
        store: Arc<dyn LicenseStore>,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
        config: LicenseConfig,
    ) -> Self {
        Self {
            codec,
            store,
            clock,
            audit,
            config,
        }
    }

    pub fn codec(&self) -> &LicenseCodec {
        &self.codec
    }

    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// Verifies `token` and makes it the current license.
    ///
    /// Hints are what the user typed next to the key; they are stored with
    /// the record but never override the signed claim.
    ///
    /// # Errors
    ///
    /// [`LicenseError::InvalidToken`] if the codec rejects the token, or
    /// [`LicenseError::StorageUnavailable`] if the record could not be written.
    pub fn activate(
        &self,
        token: &str,
        company_hint: Option<&str>,
        email_hint: Option<&str>,
    ) -> LicenseResult<ActivationResult> {
        let now = self.clock.now();
        let token = token.trim();
        let company_hint = non_empty(company_hint);
        let email_hint = non_empty(email_hint);

        let claim = match self.codec.decode(token) {
            Ok(claim) => claim,
            Err(e) => {
                warn!(error = %e, key_id = %self.codec.key_id(), "License activation rejected");
                let actor = email_hint.clone().unwrap_or_else(|| SYSTEM_ACTOR.to_string());
                self.audit.record(
                    AuditEvent::new(now, actor, AuditAction::LicenseActivationRejected, Outcome::Failure)
                        .with_detail(e.to_string()),
                );
                return Err(e.into());
            }
        };

        warn_on_hint_mismatch(&claim, company_hint.as_deref(), email_hint.as_deref());

        let status = if claim.is_expired_at(now) {
            RecordStatus::Expired
        } else {
            RecordStatus::Active
        };
        let record = LicenseRecord {
            id: RecordId::new(),
            token: token.to_string(),
            status,
            activated_at: now,
            expires_at: claim.expires_at_time(),
            company_hint,
            email_hint,
        };

        let superseded = match self.store.replace_active(&record, now) {
            Ok(superseded) => superseded,
            Err(e) => {
                error!(error = %e, "License activation could not be persisted");
                self.audit.record(
                    AuditEvent::new(
                        now,
                        claim.contact_email.clone(),
                        AuditAction::LicenseActivationRejected,
                        Outcome::Failure,
                    )
                    .with_detail(e.to_string()),
                );
                return Err(e);
            }
        };

        let days_remaining = claim.days_remaining_at(now);
        let (severity, detail) = if status == RecordStatus::Active {
            (
                Severity::Info,
                format!(
                    "{} license for {} until {}",
                    claim.class,
                    claim.company_name,
                    claim.expires_at_time().format("%Y-%m-%d")
                ),
            )
        } else {
            (
                Severity::Warning,
                format!(
                    "token already expired on {}",
                    claim.expires_at_time().format("%Y-%m-%d")
                ),
            )
        };
        self.audit.record(
            AuditEvent::new(
                now,
                claim.contact_email.clone(),
                AuditAction::LicenseActivated,
                Outcome::Success,
            )
            .with_severity(severity)
            .with_detail(detail),
        );

        if let Some(previous) = &superseded {
            info!(record_id = %previous.id, status = %previous.status, "Previous license retired");
        }
        info!(
            record_id = %record.id,
            company = %claim.company_name,
            class = %claim.class,
            status = %record.status,
            days_remaining,
            "License activated"
        );

        Ok(ActivationResult {
            record,
            claim,
            superseded,
            days_remaining,
        })
    }

    /// Current entitlement, recomputed against the clock.
    ///
    /// Never fails: a store outage is reported as unlicensed with reason
    /// `storage_unavailable`. A stale active record is flipped to expired
    /// as a side effect.
    pub fn current_status(&self) -> LicenseStatusReport {
        let now = self.clock.now();
        let record = match self.store.current() {
            Ok(Some(record)) => record,
            Ok(None) => return LicenseStatusReport::unlicensed(InactiveReason::NotActivated),
            Err(e) => {
                warn!(error = %e, "License status read failed, reporting unlicensed");
                return LicenseStatusReport::unlicensed(InactiveReason::StorageUnavailable);
            }
        };

        match self.evaluate(&record, now) {
            Evaluation::Valid { claim, days } => LicenseStatusReport {
                activated: true,
                valid: true,
                claim: Some(claim),
                days_remaining: Some(days),
                reason: None,
            },
            Evaluation::Expired { claim, days } => LicenseStatusReport {
                activated: true,
                valid: false,
                claim: Some(claim),
                days_remaining: Some(days),
                reason: Some(InactiveReason::Expired),
            },
            Evaluation::Unverifiable(_) => LicenseStatusReport {
                activated: true,
                valid: false,
                claim: None,
                days_remaining: None,
                reason: Some(InactiveReason::InvalidToken),
            },
        }
    }

    /// Gate for licensed functionality: the claim in force, or why there is none.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NoActiveLicense`], [`LicenseError::ExpiredLicense`],
    /// [`LicenseError::InvalidToken`] or [`LicenseError::StorageUnavailable`].
    pub fn require_entitlement(&self) -> LicenseResult<LicenseClaim> {
        let now = self.clock.now();
        let record = self.store.current()?.ok_or(LicenseError::NoActiveLicense)?;

        match self.evaluate(&record, now) {
            Evaluation::Valid { claim, .. } => Ok(claim),
            Evaluation::Expired { claim, .. } => Err(LicenseError::ExpiredLicense(
                claim.expires_at_time().format("%Y-%m-%d").to_string(),
            )),
            Evaluation::Unverifiable(e) => Err(LicenseError::InvalidToken(e)),
        }
    }

    /// Mints a trial token of the configured default length.
    ///
    /// # Errors
    ///
    /// See [`EntitlementService::issue_trial`].
    pub fn issue_default_trial(&self) -> LicenseResult<String> {
        self.issue_trial(self.config.trial_days)
    }

    /// Mints a signed trial token. The token is returned, not activated.
    ///
    /// # Errors
    ///
    /// [`LicenseError::InvalidDuration`] outside `1..=max_trial_days`, or
    /// [`LicenseError::SigningUnavailable`] for a verify-only codec.
    pub fn issue_trial(&self, duration_days: u32) -> LicenseResult<String> {
        if duration_days == 0 || duration_days > self.config.max_trial_days {
            return Err(LicenseError::InvalidDuration {
                requested: duration_days,
                max: self.config.max_trial_days,
            });
        }

        let now = self.clock.now();
        let claim = LicenseClaim::new(
            self.config.trial_company.clone(),
            self.config.trial_email.clone(),
            now,
            now + Duration::days(i64::from(duration_days)),
            self.config.trial_max_users,
            LicenseClass::Trial,
        );
        let token = self.codec.encode(&claim)?;

        info!(duration_days, max_users = claim.max_users, "Trial license issued");
        self.audit.record(
            AuditEvent::new(now, SYSTEM_ACTOR, AuditAction::TrialIssued, Outcome::Success)
                .with_detail(format!("duration_days={duration_days}")),
        );
        Ok(token)
    }

    /// All license records, newest first.
    ///
    /// # Errors
    ///
    /// [`LicenseError::StorageUnavailable`] if the store cannot be read.
    pub fn history(&self) -> LicenseResult<Vec<LicenseRecord>> {
        self.store.history()
    }

    fn evaluate(&self, record: &LicenseRecord, now: DateTime<Utc>) -> Evaluation {
        let claim = match self.codec.decode(&record.token) {
            Ok(claim) => claim,
            Err(e) => {
                warn!(
                    record_id = %record.id,
                    key_id = %self.codec.key_id(),
                    error = %e,
                    "Stored license token no longer verifies (signing key rotated?)"
                );
                return Evaluation::Unverifiable(e);
            }
        };

        let days = claim.days_remaining_at(now);
        // A stored `expired` is terminal: a clock that moved backwards never
        // revives a retired record.
        if days > 0 && record.is_active() {
            return Evaluation::Valid { claim, days };
        }
        if record.is_active() {
            self.expire_lazily(record, now);
        }
        Evaluation::Expired {
            claim,
            days: days.min(0),
        }
    }

    fn expire_lazily(&self, record: &LicenseRecord, now: DateTime<Utc>) {
        match self.store.expire_if_active(record.id) {
            Ok(true) => {
                info!(record_id = %record.id, "License expired");
                self.audit.record(
                    AuditEvent::new(now, SYSTEM_ACTOR, AuditAction::LicenseExpired, Outcome::Success)
                        .with_detail(format!("record {}", record.id)),
                );
            }
            Ok(false) => debug!(record_id = %record.id, "License already retired by another reader"),
            Err(e) => warn!(record_id = %record.id, error = %e, "Could not persist license expiry"),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn warn_on_hint_mismatch(claim: &LicenseClaim, company: Option<&str>, email: Option<&str>) {
    if let Some(company) = company {
        if !company.eq_ignore_ascii_case(claim.company_name.trim()) {
            warn!(hint = %company, claim = %claim.company_name, "Company name differs from license");
        }
    }
    if let Some(email) = email {
        if !email.eq_ignore_ascii_case(claim.contact_email.trim()) {
            warn!(hint = %email, claim = %claim.contact_email, "Email differs from license");
        }
    }
}
