//! Error types for the storage layer.

use tallybook_license::LicenseError;
use tallybook_security::SecurityError;
use tallybook_types::AuditError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the connection.
    #[error("database connection poisoned")]
    Poisoned,

    /// A stored value could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<StorageError> for LicenseError {
    fn from(err: StorageError) -> Self {
        LicenseError::StorageUnavailable(err.to_string())
    }
}

impl From<StorageError> for SecurityError {
    fn from(err: StorageError) -> Self {
        SecurityError::StorageUnavailable(err.to_string())
    }
}

impl From<StorageError> for AuditError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serialization(e) => AuditError::Serialization(e),
            other => AuditError::Unavailable(other.to_string()),
        }
    }
}
