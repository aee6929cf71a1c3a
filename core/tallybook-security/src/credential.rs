//! Password policy, hashing and the credential store interface.
//!
//! Passwords are hashed with Argon2id into PHC strings, so the parameters
//! travel with each hash and can be raised without invalidating old ones.

use crate::config::KdfParams;
use crate::error::{SecurityError, SecurityResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tallybook_types::Identity;

/// Size of the random salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Rules a new password must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_letter: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_letter: true,
            require_digit: true,
        }
    }
}

impl PasswordPolicy {
    /// Checks a new password and its confirmation.
    ///
    /// # Errors
    ///
    /// [`SecurityError::PasswordPolicyViolation`] describing the first rule broken.
    pub fn validate(&self, password: &str, confirmation: &str) -> SecurityResult<()> {
        if password != confirmation {
            return Err(violation("passwords do not match"));
        }
        if password.chars().count() < self.min_length {
            return Err(violation(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        if self.require_letter && !password.chars().any(char::is_alphabetic) {
            return Err(violation("password must contain a letter"));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(violation("password must contain a digit"));
        }
        Ok(())
    }
}

fn violation(msg: impl Into<String>) -> SecurityError {
    SecurityError::PasswordPolicyViolation(msg.into())
}

/// Hashes and checks passwords with Argon2id.
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    params: KdfParams,
}

impl CredentialHasher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Hashes `password` with a fresh random salt into a PHC string.
    ///
    /// # Errors
    ///
    /// [`SecurityError::Hashing`] if the parameters are rejected by Argon2.
    pub fn hash(&self, password: &str) -> SecurityResult<String> {
        let params = Params::new(
            self.params.memory_cost,
            self.params.time_cost,
            self.params.parallelism,
            None,
        )
        .map_err(|e| SecurityError::Hashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut salt_bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| SecurityError::Hashing(e.to_string()))?;

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SecurityError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Checks `password` against a stored PHC string. A malformed hash never
    /// matches.
    #[must_use]
    pub fn verify(&self, password: &str, phc: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(phc) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Where credentials live.
pub trait CredentialStore: Send + Sync {
    /// Replaces the password for `identity`.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the credential could not be written.
    fn set_password(&self, identity: &Identity, password: &str) -> SecurityResult<()>;

    /// Checks a password. Unknown identities never verify.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the credential could not be read.
    fn verify(&self, identity: &Identity, password: &str) -> SecurityResult<bool>;

    /// Whether any credential is stored for `identity`.
    fn has_credential(&self, identity: &Identity) -> SecurityResult<bool>;
}
