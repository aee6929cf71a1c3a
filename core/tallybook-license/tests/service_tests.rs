mod common;

use chrono::Duration;
use common::{Harness, OTHER_SEED, commercial_claim, t0};
use tallybook_license::{
    InactiveReason, LicenseClass, LicenseCodec, LicenseError, LicenseStore, RecordStatus,
};
use tallybook_types::{AuditAction, Outcome, Severity};

// ── Activation ───────────────────────────────────────────────────

#[test]
fn activate_valid_token() {
    let h = Harness::new();
    let token = h.token_valid_for("Acme", 365);

    let result = h.service.activate(&token, Some("Acme"), Some("owner@example.com")).unwrap();

    assert!(result.is_active());
    assert_eq!(result.days_remaining, 365);
    assert!(result.superseded.is_none());
    assert_eq!(result.record.company_hint.as_deref(), Some("Acme"));
    assert_eq!(h.store.active().unwrap().unwrap().id, result.record.id);
}

#[test]
fn activate_invalid_token_is_rejected_and_audited() {
    let h = Harness::new();
    let err = h.service.activate("garbage", None, Some("who@example.com")).unwrap_err();

    assert!(matches!(err, LicenseError::InvalidToken(_)));
    assert!(h.store.history().unwrap().is_empty());

    let rejected = h.sink.events_of(AuditAction::LicenseActivationRejected);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].outcome, Outcome::Failure);
    assert_eq!(rejected[0].actor, "who@example.com");
}

#[test]
fn activate_token_from_other_key_is_rejected() {
    let h = Harness::new();
    let foreign = LicenseCodec::from_seed(&OTHER_SEED)
        .encode(&commercial_claim("Acme", t0(), 30))
        .unwrap();
    assert!(matches!(
        h.service.activate(&foreign, None, None),
        Err(LicenseError::InvalidToken(_))
    ));
}

#[test]
fn activating_b_supersedes_a() {
    let h = Harness::new();
    let a = h.service.activate(&h.token_valid_for("A Co", 30), None, None).unwrap();
    let b = h.service.activate(&h.token_valid_for("B Co", 60), None, None).unwrap();

    let retired = b.superseded.expect("A retired");
    assert_eq!(retired.id, a.record.id);
    assert_eq!(retired.status, RecordStatus::Superseded);

    let history = h.store.history().unwrap();
    let active: Vec<_> = history.iter().filter(|r| r.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.record.id);
    assert_eq!(history.iter().find(|r| r.id == a.record.id).unwrap().status, RecordStatus::Superseded);
}

#[test]
fn replacing_an_expired_active_record_marks_it_expired() {
    let h = Harness::new();
    let a = h.service.activate(&h.token_valid_for("A Co", 10), None, None).unwrap();

    // A runs out without anyone reading status in between.
    h.clock.advance(Duration::days(11));
    let fresh = h
        .codec
        .encode(&commercial_claim("B Co", h.now(), 30))
        .unwrap();
    let b = h.service.activate(&fresh, None, None).unwrap();

    assert_eq!(b.superseded.as_ref().unwrap().status, RecordStatus::Expired);
    assert!(b.is_active());
    assert_ne!(a.record.id, b.record.id);
}

#[test]
fn already_expired_token_is_stored_as_expired() {
    let h = Harness::new();
    let stale = h
        .codec
        .encode(&commercial_claim("Old Co", t0() - Duration::days(400), 365))
        .unwrap();

    let result = h.service.activate(&stale, None, None).unwrap();
    assert!(!result.is_active());
    assert_eq!(result.record.status, RecordStatus::Expired);
    assert!(matches!(result.clone().ensure_active(), Err(LicenseError::ExpiredLicense(_))));

    let status = h.service.current_status();
    assert!(status.activated);
    assert!(!status.valid);
    assert_eq!(status.reason, Some(InactiveReason::Expired));
    assert_eq!(status.claim.unwrap().company_name, "Old Co");

    let activated = h.sink.events_of(AuditAction::LicenseActivated);
    assert_eq!(activated[0].severity, Severity::Warning);
}

#[test]
fn activation_storage_failure_propagates() {
    let h = Harness::new();
    let token = h.token_valid_for("Acme", 30);
    h.store.set_offline(true);

    let err = h.service.activate(&token, None, None).unwrap_err();
    assert!(matches!(err, LicenseError::StorageUnavailable(_)));
    assert_eq!(h.sink.events_of(AuditAction::LicenseActivationRejected).len(), 1);
}

#[test]
fn activation_survives_audit_failure() {
    let h = Harness::new();
    h.sink.set_failing(true);
    let token = h.token_valid_for("Acme", 30);

    assert!(h.service.activate(&token, None, None).unwrap().is_active());
    assert!(h.service.current_status().valid);
}

#[test]
fn blank_hints_are_dropped() {
    let h = Harness::new();
    let token = h.token_valid_for("Acme", 30);
    let result = h.service.activate(&token, Some("   "), Some("")).unwrap();
    assert!(result.record.company_hint.is_none());
    assert!(result.record.email_hint.is_none());
}

// ── Status ───────────────────────────────────────────────────────

#[test]
fn status_without_record_is_not_activated() {
    let h = Harness::new();
    let status = h.service.current_status();
    assert!(!status.activated);
    assert!(!status.valid);
    assert_eq!(status.reason, Some(InactiveReason::NotActivated));
}

#[test]
fn status_flips_at_expiry_without_explicit_expire() {
    let h = Harness::new();
    h.service.activate(&h.token_valid_for("Acme", 30), None, None).unwrap();

    h.clock.advance(Duration::days(30) - Duration::seconds(1));
    let before = h.service.current_status();
    assert!(before.valid);
    assert_eq!(before.days_remaining, Some(1));

    h.clock.advance(Duration::seconds(1));
    let after = h.service.current_status();
    assert!(after.activated);
    assert!(!after.valid);
    assert_eq!(after.days_remaining, Some(0));
    assert_eq!(after.reason, Some(InactiveReason::Expired));
}

#[test]
fn stale_active_record_is_flipped_once() {
    let h = Harness::new();
    let result = h.service.activate(&h.token_valid_for("Acme", 5), None, None).unwrap();
    h.clock.advance(Duration::days(6));

    h.service.current_status();
    h.service.current_status();

    assert!(h.store.active().unwrap().is_none());
    let stored = h.store.current().unwrap().unwrap();
    assert_eq!(stored.id, result.record.id);
    assert_eq!(stored.status, RecordStatus::Expired);
    assert_eq!(h.sink.events_of(AuditAction::LicenseExpired).len(), 1);
}

#[test]
fn clock_moving_back_does_not_revive_expired_record() {
    let h = Harness::new();
    h.service.activate(&h.token_valid_for("Acme", 5), None, None).unwrap();
    h.clock.advance(Duration::days(6));
    assert!(!h.service.current_status().valid);

    h.clock.set(t0());
    let status = h.service.current_status();
    assert!(!status.valid);
    assert_eq!(status.reason, Some(InactiveReason::Expired));
    assert_eq!(status.days_remaining, Some(0));
}

#[test]
fn days_remaining_counts_partial_days() {
    let h = Harness::new();
    h.service.activate(&h.token_valid_for("Acme", 30), None, None).unwrap();
    h.clock.advance(Duration::hours(12));
    assert_eq!(h.service.current_status().days_remaining, Some(30));
    h.clock.advance(Duration::hours(13));
    assert_eq!(h.service.current_status().days_remaining, Some(29));
}

#[test]
fn status_degrades_when_store_offline() {
    let h = Harness::new();
    h.service.activate(&h.token_valid_for("Acme", 30), None, None).unwrap();
    h.store.set_offline(true);

    let status = h.service.current_status();
    assert!(!status.activated);
    assert!(!status.valid);
    assert_eq!(status.reason, Some(InactiveReason::StorageUnavailable));
}

#[test]
fn rotated_key_reports_invalid_token() {
    let h = Harness::new();
    h.service.activate(&h.token_valid_for("Acme", 30), None, None).unwrap();

    // Same store, new key.
    let rotated = tallybook_license::EntitlementService::new(
        std::sync::Arc::new(LicenseCodec::from_seed(&OTHER_SEED)),
        h.store.clone(),
        h.clock.clone(),
        tallybook_types::AuditTrail::new(h.sink.clone()),
        Default::default(),
    );
    let status = rotated.current_status();
    assert!(status.activated);
    assert!(!status.valid);
    assert_eq!(status.reason, Some(InactiveReason::InvalidToken));
    assert!(matches!(rotated.require_entitlement(), Err(LicenseError::InvalidToken(_))));
}

// ── Gate ─────────────────────────────────────────────────────────

#[test]
fn require_entitlement_outcomes() {
    let h = Harness::new();
    assert!(matches!(h.service.require_entitlement(), Err(LicenseError::NoActiveLicense)));

    h.service.activate(&h.token_valid_for("Acme", 1), None, None).unwrap();
    assert_eq!(h.service.require_entitlement().unwrap().company_name, "Acme");

    h.clock.advance(Duration::days(2));
    assert!(matches!(h.service.require_entitlement(), Err(LicenseError::ExpiredLicense(_))));

    h.store.set_offline(true);
    assert!(matches!(h.service.require_entitlement(), Err(LicenseError::StorageUnavailable(_))));
}

// ── Trials ───────────────────────────────────────────────────────

#[test]
fn trial_is_minted_not_activated() {
    let h = Harness::new();
    let token = h.service.issue_trial(30).unwrap();

    let status = h.service.current_status();
    assert!(!status.activated);

    let claim = h.codec.decode(&token).unwrap();
    assert_eq!(claim.class, LicenseClass::Trial);
    assert_eq!(claim.max_users, 1);
    assert_eq!(claim.days_remaining_at(t0()), 30);
    assert_eq!(h.sink.events_of(AuditAction::TrialIssued).len(), 1);
}

#[test]
fn trial_can_then_be_activated() {
    let h = Harness::new();
    let token = h.service.issue_default_trial().unwrap();
    h.service.activate(&token, None, None).unwrap();

    let status = h.service.current_status();
    assert!(status.valid);
    assert_eq!(status.days_remaining, Some(30));
}

#[test]
fn trial_duration_bounds() {
    let h = Harness::new();
    assert!(matches!(h.service.issue_trial(0), Err(LicenseError::InvalidDuration { .. })));
    assert!(matches!(h.service.issue_trial(91), Err(LicenseError::InvalidDuration { .. })));
    assert!(h.service.issue_trial(90).is_ok());
}

#[test]
fn verify_only_codec_cannot_mint_trials() {
    let signer = common::test_codec();
    let verifier = LicenseCodec::verifier(&signer.verifying_key_bytes()).unwrap();
    let h = Harness::with_codec(verifier);
    assert!(matches!(h.service.issue_trial(30), Err(LicenseError::SigningUnavailable)));
}

#[test]
fn history_is_newest_first() {
    let h = Harness::new();
    let a = h.service.activate(&h.token_valid_for("A", 30), None, None).unwrap();
    let b = h.service.activate(&h.token_valid_for("B", 30), None, None).unwrap();
    let ids: Vec<_> = h.service.history().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![b.record.id, a.record.id]);
}
