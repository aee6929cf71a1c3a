//! Error types for account security.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Why an emergency reset was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryRejection {
    /// No lockout has opened a window for this identity.
    NeverOpened,
    /// The window was already used for a reset.
    AlreadyUsed,
    /// The window's 24 hours ran out.
    Expired,
}

impl RecoveryRejection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverOpened => "never_opened",
            Self::AlreadyUsed => "already_used",
            Self::Expired => "expired",
        }
    }

    /// Text suitable for showing to the user.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NeverOpened => "Emergency reset is only available after an account lockout",
            Self::AlreadyUsed => "This emergency reset window has already been used",
            Self::Expired => "The emergency reset window has expired",
        }
    }
}

impl fmt::Display for RecoveryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in account security operations.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// An emergency reset was attempted outside a usable window.
    #[error("recovery window invalid: {0}")]
    RecoveryWindowInvalid(RecoveryRejection),

    /// A new password failed the password policy.
    #[error("password policy violation: {0}")]
    PasswordPolicyViolation(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// The security or credential store could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}
