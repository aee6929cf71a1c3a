//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey};
use std::sync::Arc;
use tallybook_license::{
    EntitlementService, LicenseClaim, LicenseClass, LicenseCodec, LicenseConfig,
    MemoryLicenseStore,
};
use tallybook_types::{AuditTrail, Clock, ManualClock, MemoryAuditSink};

pub const SEED: [u8; 32] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32,
];

pub const OTHER_SEED: [u8; 32] = [7; 32];

/// Returns a deterministic signing codec.
pub fn test_codec() -> LicenseCodec {
    LicenseCodec::from_seed(&SEED)
}

pub fn test_signing_key() -> SigningKey {
    SigningKey::from_bytes(&SEED)
}

/// Fixed "now" used by service tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
}

/// Creates a signed token from arbitrary payload text, bypassing the codec.
pub fn sign_raw(signing_key: &SigningKey, payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let signature = signing_key.sign(payload_b64.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    format!("{payload_b64}.{sig_b64}")
}

/// A commercial claim issued at `issued` and valid for `days`.
pub fn commercial_claim(company: &str, issued: DateTime<Utc>, days: i64) -> LicenseClaim {
    LicenseClaim::new(
        company,
        "owner@example.com",
        issued,
        issued + Duration::days(days),
        25,
        LicenseClass::Commercial,
    )
}

pub struct Harness {
    pub service: EntitlementService,
    pub store: Arc<MemoryLicenseStore>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemoryAuditSink>,
    pub codec: Arc<LicenseCodec>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_codec(test_codec())
    }

    pub fn with_codec(codec: LicenseCodec) -> Self {
        let codec = Arc::new(codec);
        let store = Arc::new(MemoryLicenseStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let sink = Arc::new(MemoryAuditSink::new());
        let service = EntitlementService::new(
            codec.clone(),
            store.clone(),
            clock.clone(),
            AuditTrail::new(sink.clone()),
            LicenseConfig::default(),
        );
        Self {
            service,
            store,
            clock,
            sink,
            codec,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Token for a commercial license issued now and valid for `days`.
    pub fn token_valid_for(&self, company: &str, days: i64) -> String {
        self.codec
            .encode(&commercial_claim(company, t0(), days))
            .unwrap()
    }
}
