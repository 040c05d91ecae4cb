//! Error types for fitledger storage.

use fitledger_core::EngineError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
///
/// Any error returned while a [`Transaction`](crate::Transaction) is open
/// means nothing from that transaction was committed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A row lock could not be acquired in time.
    #[error("storage busy: {0}")]
    Busy(String),

    /// Stored data or the database layout is inconsistent.
    #[error("data corrupted: {0}")]
    Corrupted(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The database was written by an incompatible layout version.
    #[error("schema version mismatch: found {found}, expected {expected}")]
    SchemaVersion {
        /// Version recorded in the database.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::Corrupted(_) | StoreError::SchemaVersion { .. } => {
                Self::Integrity(err.to_string())
            }
            StoreError::Database(_) | StoreError::Busy(_) => Self::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_faults_are_not_retryable() {
        let busy = EngineError::from(StoreError::Busy("lock timeout".into()));
        assert!(matches!(busy, EngineError::Storage(_)));
        assert!(busy.is_retryable());

        let corrupted = EngineError::from(StoreError::Corrupted("missing entry".into()));
        assert!(matches!(corrupted, EngineError::Integrity(_)));
        assert!(!corrupted.is_retryable());

        let layout = EngineError::from(StoreError::SchemaVersion {
            found: 9,
            expected: 1,
        });
        assert!(matches!(layout, EngineError::Integrity(_)));
    }
}
