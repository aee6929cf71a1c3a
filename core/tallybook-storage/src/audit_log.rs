//! Append-only, hash-chained audit log.
//!
//! Every row stores the event as JSON together with
//! `hash = sha256(prev_hash || event_json)`, where `prev_hash` is the hash of
//! the preceding row ([`GENESIS_HASH`] for the first). Editing or deleting a
//! row breaks the chain from that point on, which [`SqliteAuditSink::verify_chain`]
//! reports. Truncating the newest rows is not detectable from the chain alone.

use crate::Database;
use crate::error::StorageResult;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use sha2::{Digest, Sha256};
use tallybook_types::{AuditEvent, AuditResult, AuditSink, Outcome, Severity};
use tracing::{debug, warn};

/// `prev_hash` of the first row.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Result of walking the audit chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Rows examined.
    pub entries: u64,
    /// Sequence number of the first row that does not chain, if any.
    pub broken_at: Option<i64>,
}

impl ChainReport {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none()
    }
}

/// SQLite-backed [`AuditSink`].
#[derive(Debug, Clone)]
pub struct SqliteAuditSink {
    db: Database,
}

impl SqliteAuditSink {
    /// Wraps `db`, logging how many rows the log already holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit table cannot be read.
    pub fn new(db: Database) -> StorageResult<Self> {
        {
            let conn = db.lock()?;
            let rows: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
            debug!(rows, "Audit log opened");
        }
        Ok(Self { db })
    }

    fn append(&self, event: &AuditEvent) -> StorageResult<()> {
        let event_json = serde_json::to_string(event)?;

        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let prev_hash: String = tx
            .query_row(
                "SELECT hash FROM audit_log ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let hash = chain_hash(&prev_hash, &event_json);

        tx.execute(
            "INSERT INTO audit_log
                (id, timestamp, actor, action, severity, outcome, detail, event_json, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id.to_string(),
                event.timestamp,
                event.actor,
                event.action.as_str(),
                severity_str(event.severity),
                outcome_str(event.outcome),
                event.detail,
                event_json,
                prev_hash,
                hash,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Most recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or a row does not parse.
    pub fn recent(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        let conn = self.db.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt =
            conn.prepare("SELECT event_json FROM audit_log ORDER BY seq DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;

        let mut events = Vec::new();
        for json in rows {
            events.push(serde_json::from_str(&json?)?);
        }
        Ok(events)
    }

    /// Events recorded for one actor, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or a row does not parse.
    pub fn for_actor(&self, actor: &str) -> StorageResult<Vec<AuditEvent>> {
        let conn = self.db.lock()?;
        let mut stmt =
            conn.prepare("SELECT event_json FROM audit_log WHERE actor = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![actor], |row| row.get::<_, String>(0))?;

        let mut events = Vec::new();
        for json in rows {
            events.push(serde_json::from_str(&json?)?);
        }
        Ok(events)
    }

    /// Walks the whole chain and reports the first row that fails to link.
    ///
    /// A row is broken if its `prev_hash` is not the previous row's hash, its
    /// own hash does not match its JSON, or its indexed columns disagree with
    /// that JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn verify_chain(&self) -> StorageResult<ChainReport> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT seq, actor, action, detail, event_json, prev_hash, hash
             FROM audit_log ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChainRow {
                seq: row.get(0)?,
                actor: row.get(1)?,
                action: row.get(2)?,
                detail: row.get(3)?,
                event_json: row.get(4)?,
                prev_hash: row.get(5)?,
                hash: row.get(6)?,
            })
        })?;

        let mut expected_prev = GENESIS_HASH.to_string();
        let mut entries = 0u64;
        for row in rows {
            let row = row?;
            entries += 1;
            if !row.links_to(&expected_prev) {
                warn!(seq = row.seq, "Audit chain broken");
                return Ok(ChainReport {
                    entries,
                    broken_at: Some(row.seq),
                });
            }
            expected_prev = row.hash;
        }
        Ok(ChainReport {
            entries,
            broken_at: None,
        })
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, event: &AuditEvent) -> AuditResult<()> {
        Ok(self.append(event)?)
    }
}

struct ChainRow {
    seq: i64,
    actor: String,
    action: String,
    detail: String,
    event_json: String,
    prev_hash: String,
    hash: String,
}

impl ChainRow {
    fn links_to(&self, expected_prev: &str) -> bool {
        if self.prev_hash != expected_prev {
            return false;
        }
        if chain_hash(&self.prev_hash, &self.event_json) != self.hash {
            return false;
        }
        match serde_json::from_str::<AuditEvent>(&self.event_json) {
            Ok(event) => {
                event.actor == self.actor
                    && event.action.as_str() == self.action
                    && event.detail == self.detail
            }
            Err(_) => false,
        }
    }
}

fn chain_hash(prev_hash: &str, event_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(event_json.as_bytes());
    hex::encode(hasher.finalize())
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "success",
        Outcome::Failure => "failure",
    }
}
