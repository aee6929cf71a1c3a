//! Wiring of services onto storage.

use crate::config::ServerConfig;
use std::sync::Arc;
use tallybook_license::{EntitlementService, LicenseCodec};
use tallybook_security::{CredentialHasher, EmergencyRecoveryController, PasswordPolicy};
use tallybook_storage::{Database, StorageResult};
use tallybook_types::{AuditFailure, AuditTrail, Clock};
use tokio::sync::mpsc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub license: Arc<EntitlementService>,
    pub recovery: Arc<EmergencyRecoveryController>,
    pub policy: Arc<PasswordPolicy>,
}

impl AppState {
    pub fn new(
        license: EntitlementService,
        recovery: EmergencyRecoveryController,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            license: Arc::new(license),
            recovery: Arc::new(recovery),
            policy: Arc::new(policy),
        }
    }

    /// Builds every service on top of `db`, auditing into its hash-chained
    /// log. Audit write failures arrive on the returned channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be opened.
    pub fn with_database(
        db: &Database,
        config: &ServerConfig,
        codec: LicenseCodec,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<(Self, mpsc::UnboundedReceiver<AuditFailure>)> {
        let (audit, escalations) = AuditTrail::with_escalation(Arc::new(db.audit_sink()?));

        let license = EntitlementService::new(
            Arc::new(codec),
            Arc::new(db.license_store()),
            clock.clone(),
            audit.clone(),
            config.license.clone(),
        );
        let recovery = EmergencyRecoveryController::new(
            Arc::new(db.security_store()),
            Arc::new(db.credential_store(CredentialHasher::new(config.security.kdf.clone()))),
            clock,
            audit,
            &config.security,
        );

        Ok((
            Self::new(license, recovery, config.password.clone()),
            escalations,
        ))
    }
}
