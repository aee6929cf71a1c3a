use tallybook_license::{DecodeError, LicenseError};

#[test]
fn error_display_invalid_token() {
    let err = LicenseError::InvalidToken(DecodeError::BadSignature);
    let msg = format!("{err}");
    assert!(msg.contains("invalid license token"));
    assert!(msg.contains("signature"));
}

#[test]
fn error_display_malformed() {
    let err: LicenseError = DecodeError::Malformed("missing field".into()).into();
    let msg = format!("{err}");
    assert!(msg.contains("malformed"));
    assert!(msg.contains("missing field"));
}

#[test]
fn error_display_expired() {
    let err = LicenseError::ExpiredLicense("2025-01-01".into());
    let msg = format!("{err}");
    assert!(msg.contains("expired"));
    assert!(msg.contains("2025-01-01"));
}

#[test]
fn error_display_no_active_license() {
    assert!(format!("{}", LicenseError::NoActiveLicense).contains("no active license"));
}

#[test]
fn error_display_signing_unavailable() {
    assert!(format!("{}", LicenseError::SigningUnavailable).contains("signing key"));
}

#[test]
fn error_display_invalid_duration() {
    let err = LicenseError::InvalidDuration { requested: 0, max: 90 };
    let msg = format!("{err}");
    assert!(msg.contains("90"));
    assert!(msg.contains("got 0"));
}

#[test]
fn error_display_storage() {
    let err = LicenseError::StorageUnavailable("disk full".into());
    assert!(format!("{err}").contains("storage unavailable"));
}

#[test]
fn error_from_serde_json() {
    let serde_err: Result<serde_json::Value, _> = serde_json::from_str("not json");
    let license_err: LicenseError = serde_err.unwrap_err().into();
    assert!(format!("{license_err}").contains("serialization"));
}

#[test]
fn decode_error_is_comparable() {
    assert_eq!(DecodeError::BadSignature, DecodeError::BadSignature);
    assert_ne!(DecodeError::BadSignature, DecodeError::Malformed("x".into()));
}
