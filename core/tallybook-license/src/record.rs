//! Persisted license records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tallybook_types::RecordId;

/// Stored lifecycle state of a record.
///
/// The stored value is a hint for history views. Validity is always
/// recomputed from the token's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The license currently in effect. At most one record holds this.
    Active,
    /// Expiry passed while active, or the token was already expired on activation.
    Expired,
    /// Replaced by a later activation before it expired.
    Superseded,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Superseded => "superseded",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "superseded" => Ok(Self::Superseded),
            other => Err(format!("unknown record status: {other}")),
        }
    }
}

/// One activation of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: RecordId,
    /// The token exactly as activated (trimmed).
    pub token: String,
    pub status: RecordStatus,
    pub activated_at: DateTime<Utc>,
    /// Copied from the claim so stores can retire records without decoding.
    pub expires_at: DateTime<Utc>,
    /// Company name typed in by the user at activation, if any.
    pub company_hint: Option<String>,
    /// Email typed in by the user at activation, if any.
    pub email_hint: Option<String>,
}

impl LicenseRecord {
    /// Status this record takes when a newer activation replaces it.
    #[must_use]
    pub fn retirement_status(&self, now: DateTime<Utc>) -> RecordStatus {
        if self.expires_at <= now {
            RecordStatus::Expired
        } else {
            RecordStatus::Superseded
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }
}
