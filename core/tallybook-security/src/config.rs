//! Security configuration (the `[security]` and `[password]` sections of the
//! server config).

use serde::{Deserialize, Serialize};

/// Lockout and recovery tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Consecutive failures that trigger a lockout.
    pub lockout_threshold: u32,
    /// How long an emergency recovery window stays usable.
    pub recovery_window_hours: u32,
    /// Argon2id cost for stored credentials.
    pub kdf: KdfParams,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: 10,
            recovery_window_hours: 24,
            kdf: KdfParams::default(),
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn recovery_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.recovery_window_hours))
    }
}

/// Argon2id parameters for password hashing.
///
/// Default values are tuned for a balance of security and performance
/// on modern hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Parameters for tests: fast, not for real credentials.
    #[must_use]
    pub fn fast_insecure() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}
