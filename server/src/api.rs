//! HTTP routes.
//!
//! License endpoints use camelCase bodies; auth endpoints use snake_case.
//! Service calls touch SQLite and Argon2, so they run on the blocking pool.

use crate::error::{ApiError, LoginFailure};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tallybook_license::{InactiveReason, LicenseClass, LicenseStatusReport};
use tallybook_security::EmergencyStatus;
use tallybook_types::Identity;
use tracing::info;

/// Build the HTTP API router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/license/status", get(license_status))
        .route("/api/license/activate", post(activate_license))
        .route("/api/license/generate-trial", post(generate_trial))
        .route("/api/auth/emergency-status/{identity}", get(emergency_status))
        .route("/api/auth/emergency-reset", post(emergency_reset))
        .route("/api/auth/login", post(login))
        .with_state(state)
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("handler task failed: {e}")))?
}

// ── Health ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub key_id: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        key_id: state.license.codec().key_id(),
    })
}

// ── License ──────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatusResponse {
    pub activated: bool,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_class: Option<LicenseClass>,
    /// `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<InactiveReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<LicenseStatusReport> for LicenseStatusResponse {
    fn from(report: LicenseStatusReport) -> Self {
        let claim = report.claim;
        Self {
            activated: report.activated,
            valid: report.valid,
            company: claim.as_ref().map(|c| c.company_name.clone()),
            email: claim.as_ref().map(|c| c.contact_email.clone()),
            max_users: claim.as_ref().map(|c| c.max_users),
            license_class: claim.as_ref().map(|c| c.class),
            expiry_date: claim
                .as_ref()
                .map(|c| c.expires_at_time().format("%Y-%m-%d").to_string()),
            days_remaining: report.days_remaining,
            reason: report.reason,
            message: report.reason.map(|r| r.message().to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub license_key: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActivateResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTrialRequest {
    #[serde(default)]
    pub duration_days: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTrialResponse {
    pub success: bool,
    pub license_key: String,
}

async fn license_status(
    State(state): State<AppState>,
) -> Result<Json<LicenseStatusResponse>, ApiError> {
    let report = blocking(move || Ok(state.license.current_status())).await?;
    Ok(Json(report.into()))
}

async fn activate_license(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let result = blocking(move || {
        let result = state.license.activate(
            &req.license_key,
            req.company_name.as_deref(),
            req.email.as_deref(),
        )?;
        Ok(result.ensure_active()?)
    })
    .await?;

    Ok(Json(ActivateResponse {
        success: true,
        message: format!(
            "License activated for {} ({} days remaining)",
            result.claim.company_name, result.days_remaining
        ),
    }))
}

async fn generate_trial(
    State(state): State<AppState>,
    Json(req): Json<GenerateTrialRequest>,
) -> Result<Json<GenerateTrialResponse>, ApiError> {
    let token = blocking(move || match req.duration_days {
        Some(days) => Ok(state.license.issue_trial(days)?),
        None => Ok(state.license.issue_default_trial()?),
    })
    .await?;

    Ok(Json(GenerateTrialResponse {
        success: true,
        license_key: token,
    }))
}

// ── Auth ─────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EmergencyResetRequest {
    pub identity: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn emergency_status(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    let identity = Identity::parse(&identity)?;
    let status = blocking(move || Ok(state.recovery.status(&identity))).await?;
    Ok(Json(status))
}

async fn emergency_reset(
    State(state): State<AppState>,
    Json(req): Json<EmergencyResetRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let identity = Identity::parse(&req.identity)?;
    state
        .policy
        .validate(&req.new_password, &req.confirm_password)?;

    blocking(move || Ok(state.recovery.reset(&identity, &req.new_password)?)).await?;
    Ok(Json(SuccessResponse {
        success: true,
        message: Some("Password reset. You can now sign in with the new password.".to_string()),
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let identity = Identity::parse(&req.identity)?;

    blocking(move || {
        let recovery = &state.recovery;

        let status = recovery.status(&identity);
        if status.emergency_mode {
            return Err(ApiError::LoginFailed(LoginFailure {
                attempts_remaining: 0,
                emergency_message: Some(emergency_message(status.expires_at)),
            }));
        }

        if recovery.credentials().verify(&identity, &req.password)? {
            recovery.record_successful_login(&identity)?;
            info!(identity = %identity, "Login succeeded");
            return Ok(Json(SuccessResponse {
                success: true,
                message: None,
            }));
        }

        let outcome = recovery.record_failed_login(&identity)?;
        let emergency_message = if outcome.lockout_triggered {
            Some(emergency_message(recovery.status(&identity).expires_at))
        } else {
            None
        };
        Err(ApiError::LoginFailed(LoginFailure {
            attempts_remaining: outcome.attempts_remaining,
            emergency_message,
        }))
    })
    .await
}

fn emergency_message(expires_at: Option<DateTime<Utc>>) -> String {
    match expires_at {
        Some(at) => format!(
            "Too many failed attempts. Emergency password reset is available until {}.",
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => "Too many failed attempts. Emergency password reset is available.".to_string(),
    }
}
