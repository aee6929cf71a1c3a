//! Licensing configuration (the `[license]` section of the server config).

use serde::{Deserialize, Serialize};

/// Tunables for trial issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Default trial length in days.
    pub trial_days: u32,
    /// Longest trial that may be minted.
    pub max_trial_days: u32,
    /// User cap written into trial claims.
    pub trial_max_users: u32,
    /// Company name written into trial claims.
    pub trial_company: String,
    /// Contact email written into trial claims.
    pub trial_email: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            trial_days: 30,
            max_trial_days: 90,
            trial_max_users: 1,
            trial_company: "Trial".to_string(),
            trial_email: "trial@localhost".to_string(),
        }
    }
}
