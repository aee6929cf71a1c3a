//! SQLite storage for Tallybook.
//!
//! One database file holds every table the licensing and account-security
//! core needs. Each store type wraps the same shared connection and
//! implements one of the core persistence traits:
//!
//! - [`SqliteLicenseStore`]: `license_records`, at most one `active` row
//!   (enforced by a partial unique index)
//! - [`SqliteSecurityStore`]: `login_counters` and `recovery_windows`
//! - [`SqliteCredentialStore`]: `credentials` (Argon2id PHC strings)
//! - [`SqliteAuditSink`]: `audit_log`, append-only and hash-chained
//!
//! Read-modify-write operations run inside `BEGIN IMMEDIATE` transactions so
//! concurrent writers serialize on the database lock.

mod audit_log;
mod credential_store;
mod error;
mod license_store;
mod schema;
mod security_store;

pub use audit_log::{ChainReport, GENESIS_HASH, SqliteAuditSink};
pub use credential_store::SqliteCredentialStore;
pub use error::{StorageError, StorageResult};
pub use license_store::SqliteLicenseStore;
pub use security_store::SqliteSecurityStore;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// Shared handle to the Tallybook database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema fails.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init_schema(&conn)?;
        info!(path = %path.display(), "Database opened");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn license_store(&self) -> SqliteLicenseStore {
        SqliteLicenseStore::new(self.clone())
    }

    pub fn security_store(&self) -> SqliteSecurityStore {
        SqliteSecurityStore::new(self.clone())
    }

    pub fn credential_store(
        &self,
        hasher: tallybook_security::CredentialHasher,
    ) -> SqliteCredentialStore {
        SqliteCredentialStore::new(self.clone(), hasher)
    }

    /// Opens the audit sink, resuming the hash chain from the last row.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain head cannot be read.
    pub fn audit_sink(&self) -> StorageResult<SqliteAuditSink> {
        SqliteAuditSink::new(self.clone())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
