//! The unsigned license grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Kind of license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseClass {
    /// Time-limited evaluation, small user cap.
    Trial,
    /// Purchased license.
    Commercial,
}

impl fmt::Display for LicenseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trial => f.write_str("trial"),
            Self::Commercial => f.write_str("commercial"),
        }
    }
}

/// A license grant. Field order here is the canonical serialization order.
///
/// Times are whole Unix seconds so a claim survives an encode/decode cycle
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseClaim {
    /// Licensed company.
    #[serde(rename = "company")]
    pub company_name: String,
    /// Contact email for the license holder.
    #[serde(rename = "email")]
    pub contact_email: String,
    /// Issued-at (seconds since epoch).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry (seconds since epoch). The license is expired at this instant.
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// Maximum number of staff user accounts.
    pub max_users: u32,
    pub class: LicenseClass,
}

impl LicenseClaim {
    /// Builds a claim, truncating both instants to whole seconds.
    pub fn new(
        company_name: impl Into<String>,
        contact_email: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        max_users: u32,
        class: LicenseClass,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            contact_email: contact_email.into(),
            issued_at: issued_at.timestamp(),
            expires_at: expires_at.timestamp(),
            max_users,
            class,
        }
    }

    #[must_use]
    pub fn issued_at_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.issued_at, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[must_use]
    pub fn expires_at_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whole days left at `now`, rounded up. Zero or less means expired.
    #[must_use]
    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        days_remaining(self.expires_at, now.timestamp())
    }

    /// True once `now` has reached the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.days_remaining_at(now) <= 0
    }
}

/// `ceil((expires_at - now) / 1 day)` on Unix seconds.
#[must_use]
pub fn days_remaining(expires_at: i64, now: i64) -> i64 {
    let secs = expires_at.saturating_sub(now);
    if secs > 0 {
        secs / SECONDS_PER_DAY + i64::from(secs % SECONDS_PER_DAY != 0)
    } else {
        // Integer division truncates toward zero, which is ceil for negatives.
        secs / SECONDS_PER_DAY
    }
}
