//! Account security for Tallybook's administrative login.
//!
//! This crate handles:
//! - Counting consecutive failed logins per identity
//! - Opening a single-use, time-boxed emergency recovery window on lockout
//! - Resetting the credential through that window
//! - Password policy and Argon2id credential hashing
//!
//! # Design Principles
//!
//! - **One transaction per decision**: increment-and-threshold-check runs as
//!   a single [`SecurityStore::update`]; consume-clear-and-set-credential runs
//!   as a single [`SecurityStore::update_with_credential`]
//! - **Lazy time**: window expiry is computed against an injected clock on
//!   every read, never by a background task
//! - **Status never fails**: the login screen always gets an answer

mod config;
mod credential;
mod error;
mod recovery;
mod store;
mod tracker;

pub use config::{KdfParams, SecurityConfig};
pub use credential::{CredentialHasher, CredentialStore, PasswordPolicy, SALT_SIZE};
pub use error::{RecoveryRejection, SecurityError, SecurityResult};
pub use recovery::{EmergencyRecoveryController, EmergencyStatus, RecoveryState, StatusReason};
pub use store::{
    AccountSecurity, LoginAttemptCounter, MemorySecurityStore, RecoveryWindow, SecurityStore,
    SecurityUpdate,
};
pub use tracker::{FailureOutcome, LoginAttemptTracker};
