//! Security audit events and the sink they are appended to.
//!
//! Every license activation attempt, lockout trigger and emergency reset
//! produces one [`AuditEvent`]. Services never talk to an [`AuditSink`]
//! directly: they go through [`AuditTrail`], which guarantees that a failing
//! sink neither blocks the triggering operation nor disappears silently.

use crate::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors raised by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected or could not accept the write.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    /// The event could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LicenseActivated,
    LicenseActivationRejected,
    LicenseExpired,
    TrialIssued,
    LoginSucceeded,
    LoginFailed,
    LockoutTriggered,
    EmergencyResetCompleted,
    EmergencyResetRejected,
    EmergencyResetFailed,
}

impl AuditAction {
    /// Stable wire name, as stored in the audit log.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LicenseActivated => "LICENSE_ACTIVATED",
            Self::LicenseActivationRejected => "LICENSE_ACTIVATION_REJECTED",
            Self::LicenseExpired => "LICENSE_EXPIRED",
            Self::TrialIssued => "TRIAL_ISSUED",
            Self::LoginSucceeded => "LOGIN_SUCCEEDED",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::LockoutTriggered => "LOCKOUT_TRIGGERED",
            Self::EmergencyResetCompleted => "EMERGENCY_RESET_COMPLETED",
            Self::EmergencyResetRejected => "EMERGENCY_RESET_REJECTED",
            Self::EmergencyResetFailed => "EMERGENCY_RESET_FAILED",
        }
    }

    /// Severity an event of this kind gets unless overridden.
    #[must_use]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::LicenseActivated | Self::TrialIssued | Self::LoginSucceeded => Severity::Info,
            Self::LicenseActivationRejected
            | Self::LicenseExpired
            | Self::LoginFailed
            | Self::EmergencyResetRejected => Severity::Warning,
            Self::LockoutTriggered
            | Self::EmergencyResetCompleted
            | Self::EmergencyResetFailed => Severity::Critical,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgent an event is for an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Whether the audited operation achieved what was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// A single append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    /// Who or what triggered the event (identity, or `system`).
    pub actor: String,
    pub action: AuditAction,
    pub severity: Severity,
    pub outcome: Outcome,
    /// Free-form context. Never contains secrets or tokens.
    pub detail: String,
}

impl AuditEvent {
    /// Creates an event with the action's default severity and no detail.
    pub fn new(
        timestamp: DateTime<Utc>,
        actor: impl Into<String>,
        action: AuditAction,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: RecordId::new(),
            timestamp,
            actor: actor.into(),
            action,
            severity: action.default_severity(),
            outcome,
            detail: String::new(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Append-only destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be durably recorded.
    fn record(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// A sink write that failed, handed to the host for escalation.
#[derive(Debug, Clone)]
pub struct AuditFailure {
    pub event: AuditEvent,
    pub error: String,
}

/// The audit path used by services.
///
/// Recording never returns an error to the caller. A sink failure is logged
/// at error level, counted, and forwarded on the escalation channel when one
/// is attached.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    escalation: Option<mpsc::UnboundedSender<AuditFailure>>,
    failures: Arc<AtomicU64>,
}

impl AuditTrail {
    /// Wraps a sink with no escalation channel.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            escalation: None,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wraps a sink and returns the receiving end of its escalation channel.
    pub fn with_escalation(
        sink: Arc<dyn AuditSink>,
    ) -> (Self, mpsc::UnboundedReceiver<AuditFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let trail = Self {
            sink,
            escalation: Some(tx),
            failures: Arc::new(AtomicU64::new(0)),
        };
        (trail, rx)
    }

    /// A trail that only writes structured log lines.
    pub fn tracing_only() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    /// Records an event, escalating any sink failure.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.sink.record(&event) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(
                action = %event.action,
                actor = %event.actor,
                error = %e,
                "Audit sink rejected event"
            );
            if let Some(tx) = &self.escalation {
                let failure = AuditFailure {
                    event,
                    error: e.to_string(),
                };
                if tx.send(failure).is_err() {
                    warn!("Audit escalation channel closed");
                }
            }
        }
    }

    /// Number of events the sink failed to record since creation.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditTrail")
            .field("escalation", &self.escalation.is_some())
            .field("failures", &self.failure_count())
            .finish()
    }
}

/// Writes audit events as structured log lines under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> AuditResult<()> {
        match event.severity {
            Severity::Info => info!(
                target: "audit",
                action = %event.action,
                actor = %event.actor,
                outcome = ?event.outcome,
                detail = %event.detail,
            ),
            Severity::Warning => warn!(
                target: "audit",
                action = %event.action,
                actor = %event.actor,
                outcome = ?event.outcome,
                detail = %event.detail,
            ),
            Severity::Critical => error!(
                target: "audit",
                action = %event.action,
                actor = %event.actor,
                outcome = ?event.outcome,
                detail = %event.detail,
            ),
        }
        Ok(())
    }
}

/// In-memory sink, mainly for tests. Can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one kind.
    pub fn events_of(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> AuditResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("memory sink set to fail".into()));
        }
        self.events
            .lock()
            .map_err(|_| AuditError::Unavailable("memory sink poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}
