//! Core type definitions shared by the Tallybook licensing and account
//! security crates:
//! - Record identifiers (UUID v7) and normalized login identities
//! - An injectable wall clock, so expiry is always derived at read time
//! - The security audit event model and the sink interface that stores it
//!
//! Nothing in here touches storage; adapters live in `tallybook-storage`.

mod audit;
mod clock;
mod ids;

pub use audit::{
    AuditAction, AuditError, AuditEvent, AuditFailure, AuditResult, AuditSink, AuditTrail,
    MemoryAuditSink, Outcome, Severity, TracingAuditSink,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{Identity, RecordId};

/// Errors from parsing shared types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}
