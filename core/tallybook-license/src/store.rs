//! License record persistence.
//!
//! Implementations must make every method a single atomic unit against
//! concurrent callers. In particular [`LicenseStore::replace_active`] must
//! retire the old record and insert the new one in one transaction, so two
//! racing activations can never leave two active records.

use crate::error::{LicenseError, LicenseResult};
use crate::record::{LicenseRecord, RecordStatus};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tallybook_types::RecordId;

/// Storage for license records.
pub trait LicenseStore: Send + Sync {
    /// Retires the active record (if any) and inserts `record`.
    ///
    /// The retired record becomes `expired` if its own expiry is at or before
    /// `now`, otherwise `superseded`. Returns the retired record with its new
    /// status.
    fn replace_active(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<Option<LicenseRecord>>;

    /// The most recently activated record, whatever its status.
    fn current(&self) -> LicenseResult<Option<LicenseRecord>>;

    /// The record with status `active`, if any.
    fn active(&self) -> LicenseResult<Option<LicenseRecord>>;

    /// Flips `id` from active to expired. Returns false if it was not active.
    fn expire_if_active(&self, id: RecordId) -> LicenseResult<bool>;

    /// All records, newest first.
    fn history(&self) -> LicenseResult<Vec<LicenseRecord>>;
}

/// In-memory license store. Can be switched offline to exercise the
/// storage-failure paths.
#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    records: Mutex<Vec<LicenseRecord>>,
    offline: AtomicBool,
}

impl MemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn records(&self) -> LicenseResult<std::sync::MutexGuard<'_, Vec<LicenseRecord>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LicenseError::StorageUnavailable(
                "license store offline".to_string(),
            ));
        }
        self.records
            .lock()
            .map_err(|_| LicenseError::StorageUnavailable("license store poisoned".to_string()))
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn replace_active(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
    ) -> LicenseResult<Option<LicenseRecord>> {
        let mut records = self.records()?;

        let mut retired = None;
        for existing in records.iter_mut().filter(|r| r.is_active()) {
            existing.status = existing.retirement_status(now);
            retired = Some(existing.clone());
        }
        records.push(record.clone());
        Ok(retired)
    }

    fn current(&self) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.records()?.last().cloned())
    }

    fn active(&self) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.records()?.iter().rev().find(|r| r.is_active()).cloned())
    }

    fn expire_if_active(&self, id: RecordId) -> LicenseResult<bool> {
        let mut records = self.records()?;
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) if record.is_active() => {
                record.status = RecordStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn history(&self) -> LicenseResult<Vec<LicenseRecord>> {
        Ok(self.records()?.iter().rev().cloned().collect())
    }
}
