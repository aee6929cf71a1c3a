//! Per-identity security state and its persistence.
//!
//! All state for one identity (failure counter plus the current recovery
//! window) is read and written as a single [`AccountSecurity`] value through
//! [`SecurityStore::update`], which applies a closure atomically. Two
//! concurrent failures for one identity therefore can never both observe the
//! same count.

use crate::config::KdfParams;
use crate::credential::{CredentialHasher, CredentialStore};
use crate::error::{SecurityError, SecurityResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tallybook_types::Identity;
use tracing::debug;

/// Consecutive failed logins for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptCounter {
    pub count: u32,
    pub first_failure: DateTime<Utc>,
    pub last_failure: DateTime<Utc>,
}

impl LoginAttemptCounter {
    /// A counter holding its first failure.
    #[must_use]
    pub fn first(at: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            first_failure: at,
            last_failure: at,
        }
    }
}

/// A time-boxed, single-use chance to reset the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryWindow {
    pub opened_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl RecoveryWindow {
    #[must_use]
    pub fn open(at: DateTime<Utc>, lasts: Duration) -> Self {
        Self {
            opened_at: at,
            expires_at: at + lasts,
            consumed_at: None,
        }
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Unconsumed and not yet expired.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_consumed() && !self.is_expired_at(now)
    }
}

/// Everything the security core stores about one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSecurity {
    pub counter: Option<LoginAttemptCounter>,
    pub window: Option<RecoveryWindow>,
}

impl AccountSecurity {
    /// Current consecutive failure count.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.counter.as_ref().map_or(0, |c| c.count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counter.is_none() && self.window.is_none()
    }
}

/// Closure applied to one identity's state inside a store transaction.
///
/// Returning an error aborts the transaction and nothing is written.
pub type SecurityUpdate<'a> = dyn FnMut(&mut AccountSecurity) -> SecurityResult<()> + 'a;

/// Storage for per-identity security state.
pub trait SecurityStore: Send + Sync {
    /// Reads the state for `identity` (empty if nothing is stored).
    fn load(&self, identity: &Identity) -> SecurityResult<AccountSecurity>;

    /// Applies `apply` to the state for `identity` atomically and returns
    /// the state as written.
    fn update(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
    ) -> SecurityResult<AccountSecurity>;

    /// Like [`SecurityStore::update`], but also replaces the credential of
    /// `identity` with `credential_hash` (a PHC string) in the same
    /// transaction. If `apply` or the credential write fails, nothing is
    /// written.
    fn update_with_credential(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
        credential_hash: &str,
    ) -> SecurityResult<AccountSecurity>;
}

#[derive(Debug, Default)]
struct Accounts {
    states: HashMap<Identity, AccountSecurity>,
    credentials: HashMap<Identity, String>,
}

/// In-memory security and credential store.
///
/// Counters, windows and credential hashes share one lock, so
/// [`SecurityStore::update_with_credential`] is atomic. The store can be
/// switched offline, or made to reject credential writes, to exercise the
/// storage-failure paths.
#[derive(Debug, Default)]
pub struct MemorySecurityStore {
    accounts: Mutex<Accounts>,
    hasher: CredentialHasher,
    offline: AtomicBool,
    reject_credentials: AtomicBool,
}

impl MemorySecurityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store hashing passwords set through [`CredentialStore`] with `params`.
    pub fn with_kdf(params: KdfParams) -> Self {
        Self {
            hasher: CredentialHasher::new(params),
            ..Self::default()
        }
    }

    /// Makes every subsequent call fail with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every credential write fail with `StorageUnavailable` while
    /// reads and counter updates keep working.
    pub fn set_reject_credentials(&self, reject: bool) {
        self.reject_credentials.store(reject, Ordering::SeqCst);
    }

    fn accounts(&self) -> SecurityResult<MutexGuard<'_, Accounts>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SecurityError::StorageUnavailable(
                "security store offline".to_string(),
            ));
        }
        self.accounts
            .lock()
            .map_err(|_| SecurityError::StorageUnavailable("security store poisoned".to_string()))
    }

    fn check_credential_write(&self) -> SecurityResult<()> {
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(SecurityError::StorageUnavailable(
                "credential write rejected".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(
        accounts: &Accounts,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
    ) -> SecurityResult<AccountSecurity> {
        let mut state = accounts.states.get(identity).cloned().unwrap_or_default();
        apply(&mut state)?;
        Ok(state)
    }

    fn commit(accounts: &mut Accounts, identity: &Identity, state: &AccountSecurity) {
        if state.is_empty() {
            accounts.states.remove(identity);
        } else {
            accounts.states.insert(identity.clone(), state.clone());
        }
    }
}

impl SecurityStore for MemorySecurityStore {
    fn load(&self, identity: &Identity) -> SecurityResult<AccountSecurity> {
        Ok(self.accounts()?.states.get(identity).cloned().unwrap_or_default())
    }

    fn update(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
    ) -> SecurityResult<AccountSecurity> {
        let mut accounts = self.accounts()?;
        let state = Self::apply(&accounts, identity, apply)?;
        Self::commit(&mut accounts, identity, &state);
        Ok(state)
    }

    fn update_with_credential(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
        credential_hash: &str,
    ) -> SecurityResult<AccountSecurity> {
        let mut accounts = self.accounts()?;
        let state = Self::apply(&accounts, identity, apply)?;
        self.check_credential_write()?;
        Self::commit(&mut accounts, identity, &state);
        accounts
            .credentials
            .insert(identity.clone(), credential_hash.to_string());
        Ok(state)
    }
}

impl CredentialStore for MemorySecurityStore {
    fn set_password(&self, identity: &Identity, password: &str) -> SecurityResult<()> {
        let phc = self.hasher.hash(password)?;
        let mut accounts = self.accounts()?;
        self.check_credential_write()?;
        accounts.credentials.insert(identity.clone(), phc);
        debug!(identity = %identity, "Credential updated");
        Ok(())
    }

    fn verify(&self, identity: &Identity, password: &str) -> SecurityResult<bool> {
        let phc = self.accounts()?.credentials.get(identity).cloned();
        Ok(phc.is_some_and(|phc| self.hasher.verify(password, &phc)))
    }

    fn has_credential(&self, identity: &Identity) -> SecurityResult<bool> {
        Ok(self.accounts()?.credentials.contains_key(identity))
    }
}
