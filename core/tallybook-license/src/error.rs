//! Error types for the licensing module.

use thiserror::Error;

/// Why a token failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Structurally invalid token (segments, base64, lengths, JSON shape).
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature does not match the payload under the configured key.
    #[error("token signature invalid")]
    BadSignature,
}

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The token was rejected by the codec.
    #[error("invalid license token: {0}")]
    InvalidToken(#[from] DecodeError),

    /// The license exists but its expiry has passed.
    #[error("license expired on {0}")]
    ExpiredLicense(String),

    /// No license record is in effect.
    #[error("no active license")]
    NoActiveLicense,

    /// The claim cannot be signed because the codec would never accept it.
    #[error("invalid license claim: {0}")]
    InvalidClaim(String),

    /// The codec only holds a verifying key.
    #[error("signing key not available, tokens can only be verified")]
    SigningUnavailable,

    /// The key material could not be used.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Trial length outside the allowed range.
    #[error("trial duration must be between 1 and {max} days, got {requested}")]
    InvalidDuration { requested: u32, max: u32 },

    /// The license store could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
