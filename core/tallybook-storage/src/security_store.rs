//! Login counters and recovery windows.

use crate::Database;
use crate::error::{StorageError, StorageResult};
use crate::credential_store::write_credential;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tallybook_security::{
    AccountSecurity, LoginAttemptCounter, RecoveryWindow, SecurityResult, SecurityStore,
    SecurityUpdate,
};
use tallybook_types::Identity;
use tracing::debug;

/// SQLite-backed [`SecurityStore`].
///
/// `update` loads both rows for the identity, applies the closure and writes
/// the result back inside one `IMMEDIATE` transaction.
#[derive(Debug, Clone)]
pub struct SqliteSecurityStore {
    db: Database,
}

impl SqliteSecurityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SecurityStore for SqliteSecurityStore {
    fn load(&self, identity: &Identity) -> SecurityResult<AccountSecurity> {
        let conn = self.db.lock()?;
        Ok(load_account(&conn, identity)?)
    }

    fn update(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
    ) -> SecurityResult<AccountSecurity> {
        self.transact(identity, apply, None)
    }

    fn update_with_credential(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
        credential_hash: &str,
    ) -> SecurityResult<AccountSecurity> {
        self.transact(identity, apply, Some(credential_hash))
    }
}

impl SqliteSecurityStore {
    fn transact(
        &self,
        identity: &Identity,
        apply: &mut SecurityUpdate<'_>,
        credential_hash: Option<&str>,
    ) -> SecurityResult<AccountSecurity> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let mut state = load_account(&tx, identity)?;
        // Any error below drops `tx`, which rolls back.
        apply(&mut state)?;
        write_account(&tx, identity, &state)?;
        if let Some(phc) = credential_hash {
            write_credential(&tx, identity, phc)?;
            debug!(identity = %identity, "Credential replaced with account state");
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(state)
    }
}

fn load_account(conn: &Connection, identity: &Identity) -> StorageResult<AccountSecurity> {
    let counter = conn
        .query_row(
            "SELECT count, first_failure, last_failure FROM login_counters WHERE identity = ?1",
            params![identity.as_str()],
            |row| {
                Ok(LoginAttemptCounter {
                    count: row.get(0)?,
                    first_failure: row.get(1)?,
                    last_failure: row.get(2)?,
                })
            },
        )
        .optional()?;

    let window = conn
        .query_row(
            "SELECT opened_at, expires_at, consumed, consumed_at
             FROM recovery_windows WHERE identity = ?1",
            params![identity.as_str()],
            |row| {
                let consumed: bool = row.get(2)?;
                let consumed_at: Option<DateTime<Utc>> = row.get(3)?;
                Ok((row.get(0)?, row.get(1)?, consumed, consumed_at))
            },
        )
        .optional()?;

    let window = match window {
        Some((opened_at, expires_at, consumed, consumed_at)) => {
            if consumed != consumed_at.is_some() {
                return Err(StorageError::InvalidData(format!(
                    "recovery window for {identity}: consumed flag disagrees with consumed_at"
                )));
            }
            Some(RecoveryWindow {
                opened_at,
                expires_at,
                consumed_at,
            })
        }
        None => None,
    };

    Ok(AccountSecurity { counter, window })
}

fn write_account(
    conn: &Connection,
    identity: &Identity,
    state: &AccountSecurity,
) -> StorageResult<()> {
    match &state.counter {
        Some(counter) => {
            conn.execute(
                "INSERT INTO login_counters (identity, count, first_failure, last_failure)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(identity) DO UPDATE SET
                    count = excluded.count,
                    first_failure = excluded.first_failure,
                    last_failure = excluded.last_failure",
                params![
                    identity.as_str(),
                    counter.count,
                    counter.first_failure,
                    counter.last_failure
                ],
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM login_counters WHERE identity = ?1",
                params![identity.as_str()],
            )?;
        }
    }

    match &state.window {
        Some(window) => {
            conn.execute(
                "INSERT INTO recovery_windows (identity, opened_at, expires_at, consumed, consumed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(identity) DO UPDATE SET
                    opened_at = excluded.opened_at,
                    expires_at = excluded.expires_at,
                    consumed = excluded.consumed,
                    consumed_at = excluded.consumed_at",
                params![
                    identity.as_str(),
                    window.opened_at,
                    window.expires_at,
                    window.is_consumed(),
                    window.consumed_at
                ],
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM recovery_windows WHERE identity = ?1",
                params![identity.as_str()],
            )?;
        }
    }
    Ok(())
}
