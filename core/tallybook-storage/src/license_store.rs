//! License record persistence.

use crate::Database;
use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tallybook_license::{LicenseRecord, LicenseResult, LicenseStore, RecordStatus};
use tallybook_types::RecordId;
use tracing::debug;

const COLUMNS: &str = "id, token, status, activated_at, expires_at, company_hint, email_hint";

/// SQLite-backed [`LicenseStore`].
#[derive(Debug, Clone)]
pub struct SqliteLicenseStore {
    db: Database,
}

impl SqliteLicenseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn replace_active_inner(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<LicenseRecord>> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = query_one(
            &tx,
            &format!("SELECT {COLUMNS} FROM license_records WHERE status = 'active'"),
        )?;
        let retired = match previous {
            Some(mut previous) => {
                previous.status = previous.retirement_status(now);
                tx.execute(
                    "UPDATE license_records SET status = ?1 WHERE id = ?2",
                    params![previous.status.as_str(), previous.id.to_string()],
                )?;
                Some(previous)
            }
            None => None,
        };

        tx.execute(
            "INSERT INTO license_records
                (id, token, status, activated_at, expires_at, company_hint, email_hint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.token,
                record.status.as_str(),
                record.activated_at,
                record.expires_at,
                record.company_hint,
                record.email_hint,
            ],
        )?;
        tx.commit()?;

        debug!(record_id = %record.id, retired = retired.is_some(), "License record stored");
        Ok(retired)
    }

    fn current_inner(&self) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.db.lock()?;
        query_one(
            &conn,
            &format!("SELECT {COLUMNS} FROM license_records ORDER BY rowid DESC LIMIT 1"),
        )
    }

    fn active_inner(&self) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.db.lock()?;
        query_one(
            &conn,
            &format!("SELECT {COLUMNS} FROM license_records WHERE status = 'active'"),
        )
    }

    fn expire_if_active_inner(&self, id: RecordId) -> StorageResult<bool> {
        let conn = self.db.lock()?;
        let changed = conn.execute(
            "UPDATE license_records SET status = 'expired' WHERE id = ?1 AND status = 'active'",
            params![id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn history_inner(&self) -> StorageResult<Vec<LicenseRecord>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM license_records ORDER BY rowid DESC"
        ))?;
        let rows = stmt.query_map([], read_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }
}

impl LicenseStore for SqliteLicenseStore {
    fn replace_active(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.replace_active_inner(record, now)?)
    }

    fn current(&self) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.current_inner()?)
    }

    fn active(&self) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.active_inner()?)
    }

    fn expire_if_active(&self, id: RecordId) -> LicenseResult<bool> {
        Ok(self.expire_if_active_inner(id)?)
    }

    fn history(&self) -> LicenseResult<Vec<LicenseRecord>> {
        Ok(self.history_inner()?)
    }
}

type RawRecord = (
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<String>,
    Option<String>,
);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_record(raw: RawRecord) -> StorageResult<LicenseRecord> {
    let (id, token, status, activated_at, expires_at, company_hint, email_hint) = raw;
    let id = RecordId::parse(&id)
        .map_err(|e| StorageError::InvalidData(format!("license record id {id}: {e}")))?;
    let status = status
        .parse::<RecordStatus>()
        .map_err(|e| StorageError::InvalidData(format!("license record status: {e}")))?;
    Ok(LicenseRecord {
        id,
        token,
        status,
        activated_at,
        expires_at,
        company_hint,
        email_hint,
    })
}

fn query_one(conn: &Connection, sql: &str) -> StorageResult<Option<LicenseRecord>> {
    conn.query_row(sql, [], read_row)
        .optional()?
        .map(into_record)
        .transpose()
}
