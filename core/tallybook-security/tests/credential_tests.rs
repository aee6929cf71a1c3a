mod common;

use common::admin;
use tallybook_security::{
    CredentialHasher, CredentialStore, KdfParams, MemorySecurityStore, PasswordPolicy,
    SecurityError,
};
use tallybook_types::Identity;

fn hasher() -> CredentialHasher {
    CredentialHasher::new(KdfParams::fast_insecure())
}

// ── Policy ───────────────────────────────────────────────────────

#[test]
fn policy_accepts_reasonable_password() {
    PasswordPolicy::default().validate("ledger2026", "ledger2026").unwrap();
}

#[test]
fn policy_rejects_mismatch() {
    let err = PasswordPolicy::default().validate("ledger2026", "ledger2027").unwrap_err();
    assert!(matches!(err, SecurityError::PasswordPolicyViolation(ref m) if m.contains("match")));
}

#[test]
fn policy_rejects_short() {
    assert!(PasswordPolicy::default().validate("ab1", "ab1").is_err());
}

#[test]
fn policy_counts_characters_not_bytes() {
    let policy = PasswordPolicy {
        min_length: 4,
        require_letter: false,
        require_digit: false,
    };
    assert!(policy.validate("äöü", "äöü").is_err());
    assert!(policy.validate("äöüß", "äöüß").is_ok());
}

#[test]
fn policy_requires_letter_and_digit() {
    let policy = PasswordPolicy::default();
    assert!(policy.validate("12345678", "12345678").is_err());
    assert!(policy.validate("abcdefgh", "abcdefgh").is_err());
}

#[test]
fn policy_rules_can_be_relaxed() {
    let policy = PasswordPolicy {
        min_length: 1,
        require_letter: false,
        require_digit: false,
    };
    assert!(policy.validate("x", "x").is_ok());
}

// ── Hashing ──────────────────────────────────────────────────────

#[test]
fn hash_is_argon2id_phc() {
    let phc = hasher().hash("ledger2026").unwrap();
    assert!(phc.starts_with("$argon2id$v=19$"));
    assert!(hasher().verify("ledger2026", &phc));
    assert!(!hasher().verify("ledger2027", &phc));
}

#[test]
fn hashes_are_salted() {
    let a = hasher().hash("same-password1").unwrap();
    let b = hasher().hash("same-password1").unwrap();
    assert_ne!(a, b);
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!hasher().verify("anything", "not-a-phc-string"));
    assert!(!hasher().verify("", ""));
}

#[test]
fn invalid_params_are_hashing_errors() {
    let bad = CredentialHasher::new(KdfParams {
        memory_cost: 1,
        time_cost: 0,
        parallelism: 0,
    });
    assert!(matches!(bad.hash("pw"), Err(SecurityError::Hashing(_))));
}

#[test]
fn verification_uses_params_from_hash() {
    let phc = hasher().hash("ledger2026").unwrap();
    let other = CredentialHasher::new(KdfParams::default());
    assert!(other.verify("ledger2026", &phc));
}

// ── Store ────────────────────────────────────────────────────────

#[test]
fn memory_store_set_and_verify() {
    let store = MemorySecurityStore::with_kdf(KdfParams::fast_insecure());
    assert!(!store.has_credential(&admin()).unwrap());
    assert!(!store.verify(&admin(), "ledger2026").unwrap());

    store.set_password(&admin(), "ledger2026").unwrap();
    assert!(store.has_credential(&admin()).unwrap());
    assert!(store.verify(&admin(), "ledger2026").unwrap());
    assert!(store.verify(&Identity::parse(" ADMIN@example.com ").unwrap(), "ledger2026").unwrap());
    assert!(!store.verify(&admin(), "Ledger2026").unwrap());
}

#[test]
fn memory_store_offline() {
    let store = MemorySecurityStore::with_kdf(KdfParams::fast_insecure());
    store.set_offline(true);
    assert!(matches!(
        store.set_password(&admin(), "ledger2026"),
        Err(SecurityError::StorageUnavailable(_))
    ));
    assert!(store.verify(&admin(), "ledger2026").is_err());
}
