//! HTTP error mapping.
//!
//! Every error body carries `success: false` and a human-readable `message`.
//! Internal error details are logged, never returned.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tallybook_license::LicenseError;
use tallybook_security::{RecoveryRejection, SecurityError};
use thiserror::Error;

/// JSON body of every error response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_message: Option<String>,
}

/// A rejected login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub attempts_remaining: u32,
    /// Set once the account is locked out.
    pub emergency_message: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input such as an invalid identity (400).
    #[error("{0}")]
    BadRequest(String),

    /// A license key was refused (400).
    #[error("{0}")]
    InvalidLicense(String),

    /// An emergency reset outside a usable window (400).
    #[error("{}", .0.message())]
    RecoveryRejected(RecoveryRejection),

    /// A new password broke the password policy (422).
    #[error("{0}")]
    PolicyViolation(String),

    /// Wrong credentials or a locked-out account (401).
    #[error("invalid credentials")]
    LoginFailed(LoginFailure),

    /// A backing store is unreachable (503).
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Anything else (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidLicense(_) | Self::RecoveryRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LoginFailed(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let message = match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::LoginFailed(failure) if failure.emergency_message.is_some() => {
                "Account locked".to_string()
            }
            Self::LoginFailed(_) => "Invalid credentials".to_string(),
            other => other.to_string(),
        };
        let mut body = ErrorBody {
            success: false,
            message,
            ..ErrorBody::default()
        };
        match self {
            Self::RecoveryRejected(reason) => body.reason = Some(reason.as_str().to_string()),
            Self::LoginFailed(failure) => {
                body.attempts_remaining = Some(failure.attempts_remaining);
                if let Some(msg) = &failure.emergency_message {
                    body.emergency_mode = Some(true);
                    body.emergency_message = Some(msg.clone());
                }
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::InvalidToken(_) | LicenseError::ExpiredLicense(_) => {
                Self::InvalidLicense(err.to_string())
            }
            LicenseError::InvalidDuration { .. } | LicenseError::InvalidClaim(_) => {
                Self::BadRequest(err.to_string())
            }
            LicenseError::NoActiveLicense => Self::BadRequest(err.to_string()),
            LicenseError::StorageUnavailable(_) | LicenseError::SigningUnavailable => {
                Self::ServiceUnavailable(err.to_string())
            }
            LicenseError::InvalidKey(_) | LicenseError::Serialization(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RecoveryWindowInvalid(reason) => Self::RecoveryRejected(reason),
            SecurityError::PasswordPolicyViolation(msg) => Self::PolicyViolation(msg),
            SecurityError::StorageUnavailable(_) => Self::ServiceUnavailable(err.to_string()),
            SecurityError::Hashing(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<tallybook_types::Error> for ApiError {
    fn from(err: tallybook_types::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}
