//! Error types for fitledger.

use crate::ids::IdError;

/// Result type for fitledger operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in fitledger operations.
///
/// Idempotent outcomes (an award that already exists, a resubmitted check-in)
/// are never errors; they are reported through the operation's result type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Input rejected before any state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Malformed or out-of-range calendar date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of row that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The check-in configuration exists but is switched off.
    #[error("check-in {config_id} is not active")]
    CheckinInactive {
        /// The inactive configuration.
        config_id: String,
    },

    /// No instance of the check-in has opened yet.
    #[error("check-in {config_id} is not open yet")]
    CheckinNotOpen {
        /// The configuration that has not opened.
        config_id: String,
    },

    /// Storage error. Nothing was committed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data is inconsistent; retrying will not help.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl EngineError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(EngineError::Storage("busy".into()).is_retryable());
        assert!(!EngineError::Integrity("missing entry".into()).is_retryable());
        assert!(!EngineError::Serialization("bad".into()).is_retryable());
        assert!(!EngineError::InvalidInput("x".into()).is_retryable());
    }
}
