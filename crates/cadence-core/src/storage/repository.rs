//! Repository seam between the engine and persistence

use crate::item::ItemState;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored row could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Stored version differs from the one the write was based on
    #[error("Version conflict on {item_id}: expected {expected}, found {actual}")]
    VersionConflict {
        item_id: String,
        expected: u64,
        actual: u64,
    },
    /// Row not found
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Write failure injected by a test repository
    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// REPOSITORY
// ============================================================================

/// Persistence for Item States, injected into the engine at construction
///
/// Implementations are shared across threads; all methods take `&self`.
pub trait ItemRepository: Send + Sync {
    /// Every Item State a user owns, in registration order, with full history
    fn load_user(&self, user_id: &str) -> Result<Vec<ItemState>>;

    /// Persist a freshly registered item
    fn insert_item(&self, state: &ItemState) -> Result<()>;

    /// Persist a reviewed state and its newest history entry atomically
    ///
    /// Fails with [`StorageError::VersionConflict`] if the stored version is not
    /// `previous_version`; nothing is written in that case.
    fn save_review(&self, state: &ItemState, previous_version: u64) -> Result<()>;

    /// Remove an item and its history; `false` if it did not exist
    fn delete_item(&self, user_id: &str, item_id: &str) -> Result<bool>;
}
