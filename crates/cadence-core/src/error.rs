//! Engine error taxonomy

use crate::storage::StorageError;

/// Errors surfaced by the scheduling engine
///
/// An idempotent replay of a submission is not an error; it returns the
/// current state unchanged.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: rating, limit, mode, cursor or configuration
    #[error("Validation error: {0}")]
    Validation(String),
    /// Unknown (user, item) pair
    #[error("Item not found: user={user_id} item={item_id}")]
    NotFound { user_id: String, item_id: String },
    /// Expected version did not match the stored version; refetch and retry
    #[error("Version conflict on item {item_id}: expected {expected}, found {actual}")]
    Conflict {
        item_id: String,
        expected: u64,
        actual: u64,
    },
    /// Persistence or backing-store failure; no partial mutation is visible
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn not_found(user_id: &str, item_id: &str) -> Self {
        EngineError::NotFound {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        EngineError::Internal(format!("{} lock poisoned", what))
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict {
                item_id,
                expected,
                actual,
            } => EngineError::Conflict {
                item_id,
                expected,
                actual,
            },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;
