//! Shared helpers for security tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tallybook_security::{
    EmergencyRecoveryController, KdfParams, MemorySecurityStore, SecurityConfig,
};
use tallybook_types::{AuditTrail, Clock, Identity, ManualClock, MemoryAuditSink};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn admin() -> Identity {
    Identity::parse("admin@example.com").unwrap()
}

pub fn config() -> SecurityConfig {
    SecurityConfig {
        kdf: KdfParams::fast_insecure(),
        ..SecurityConfig::default()
    }
}

pub struct Harness {
    pub controller: EmergencyRecoveryController,
    pub store: Arc<MemorySecurityStore>,
    /// The same store, seen through its credential interface.
    pub credentials: Arc<MemorySecurityStore>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemoryAuditSink>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemorySecurityStore::with_kdf(KdfParams::fast_insecure()));
        let credentials = store.clone();
        let clock = Arc::new(ManualClock::new(t0()));
        let sink = Arc::new(MemoryAuditSink::new());
        let controller = EmergencyRecoveryController::new(
            store.clone(),
            credentials.clone(),
            clock.clone(),
            AuditTrail::new(sink.clone()),
            &config(),
        );
        Self {
            controller,
            store,
            credentials,
            clock,
            sink,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fails `n` logins for `identity`.
    pub fn fail(&self, identity: &Identity, n: u32) {
        for _ in 0..n {
            self.controller.record_failed_login(identity).unwrap();
        }
    }

    /// Fails logins for `identity` until it is locked out.
    pub fn lock_out(&self, identity: &Identity) {
        self.fail(identity, 10);
    }
}
