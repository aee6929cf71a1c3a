//! Stored credentials.

use crate::Database;
use crate::error::StorageResult;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tallybook_security::{CredentialHasher, CredentialStore, SecurityResult};
use tallybook_types::Identity;
use tracing::debug;

/// SQLite-backed [`CredentialStore`]. Only PHC hash strings are stored.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    db: Database,
    hasher: CredentialHasher,
}

impl SqliteCredentialStore {
    pub fn new(db: Database, hasher: CredentialHasher) -> Self {
        Self { db, hasher }
    }

    fn stored_hash(&self, identity: &Identity) -> StorageResult<Option<String>> {
        let conn = self.db.lock()?;
        Ok(conn
            .query_row(
                "SELECT password_hash FROM credentials WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn write_hash(&self, identity: &Identity, phc: &str) -> StorageResult<()> {
        let conn = self.db.lock()?;
        write_credential(&conn, identity, phc)
    }
}

/// Upserts the PHC hash for `identity` on `conn`, which may be a transaction.
pub(crate) fn write_credential(conn: &Connection, identity: &Identity, phc: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO credentials (identity, password_hash, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(identity) DO UPDATE SET
            password_hash = excluded.password_hash,
            updated_at = excluded.updated_at",
        params![identity.as_str(), phc, Utc::now()],
    )?;
    Ok(())
}

impl CredentialStore for SqliteCredentialStore {
    fn set_password(&self, identity: &Identity, password: &str) -> SecurityResult<()> {
        // Hash outside the connection lock.
        let phc = self.hasher.hash(password)?;
        self.write_hash(identity, &phc)?;
        debug!(identity = %identity, "Credential updated");
        Ok(())
    }

    fn verify(&self, identity: &Identity, password: &str) -> SecurityResult<bool> {
        let stored = self.stored_hash(identity)?;
        Ok(stored.is_some_and(|phc| self.hasher.verify(password, &phc)))
    }

    fn has_credential(&self, identity: &Identity) -> SecurityResult<bool> {
        Ok(self.stored_hash(identity)?.is_some())
    }
}
