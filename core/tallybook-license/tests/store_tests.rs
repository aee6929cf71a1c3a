mod common;

use chrono::Duration;
use common::t0;
use std::sync::Arc;
use std::thread;
use tallybook_license::{LicenseRecord, LicenseStore, MemoryLicenseStore, RecordStatus};
use tallybook_types::RecordId;

fn record(expires_in_days: i64) -> LicenseRecord {
    LicenseRecord {
        id: RecordId::new(),
        token: format!("token-{}", RecordId::new()),
        status: RecordStatus::Active,
        activated_at: t0(),
        expires_at: t0() + Duration::days(expires_in_days),
        company_hint: None,
        email_hint: None,
    }
}

#[test]
fn empty_store() {
    let store = MemoryLicenseStore::new();
    assert!(store.current().unwrap().is_none());
    assert!(store.active().unwrap().is_none());
    assert!(store.history().unwrap().is_empty());
}

#[test]
fn expire_if_active_is_compare_and_set() {
    let store = MemoryLicenseStore::new();
    let r = record(30);
    store.replace_active(&r, t0()).unwrap();

    assert!(store.expire_if_active(r.id).unwrap());
    assert!(!store.expire_if_active(r.id).unwrap());
    assert!(!store.expire_if_active(RecordId::new()).unwrap());
    assert_eq!(store.current().unwrap().unwrap().status, RecordStatus::Expired);
}

#[test]
fn retirement_status_depends_on_own_expiry() {
    let r = record(1);
    assert_eq!(r.retirement_status(t0()), RecordStatus::Superseded);
    assert_eq!(r.retirement_status(t0() + Duration::days(1)), RecordStatus::Expired);
}

#[test]
fn concurrent_activations_leave_one_active() {
    let store = Arc::new(MemoryLicenseStore::new());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                store.replace_active(&record(30), t0()).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = store.history().unwrap();
    assert_eq!(history.len(), 16);
    assert_eq!(history.iter().filter(|r| r.is_active()).count(), 1);
    assert_eq!(
        history.iter().filter(|r| r.status == RecordStatus::Superseded).count(),
        15
    );
}

#[test]
fn offline_store_fails_every_call() {
    let store = MemoryLicenseStore::new();
    store.set_offline(true);
    assert!(store.current().is_err());
    assert!(store.replace_active(&record(1), t0()).is_err());
    store.set_offline(false);
    assert!(store.current().is_ok());
}

#[test]
fn record_status_parse() {
    for status in [RecordStatus::Active, RecordStatus::Expired, RecordStatus::Superseded] {
        assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), status);
    }
    assert!("revoked".parse::<RecordStatus>().is_err());
}
