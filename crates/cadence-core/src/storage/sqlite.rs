//! SQLite Repository Implementation
//!
//! Persists Item States and their review history. Writes go through a single
//! writer connection inside transactions; reads use a separate reader
//! connection when backed by a file.

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::repository::{ItemRepository, Result, StorageError};
use crate::item::{ItemState, ReviewEntry};
use crate::policy::Rating;

/// SQLite-backed [`ItemRepository`]
///
/// All methods take `&self`, so the repository can be shared as
/// `Arc<SqliteRepository>` across threads.
pub struct SqliteRepository {
    writer: Mutex<Connection>,
    /// `None` for in-memory databases, which cannot be shared across connections
    reader: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteRepository {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        // Apply encryption key if SQLCipher is enabled and key is provided
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("CADENCE_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Default database location in the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "cadence", "core").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(data_dir, perms);
        }
        Ok(data_dir.join("cadence.db"))
    }

    /// Open (creating if needed) a database file
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        tracing::info!("Opened item repository at {}", path.display());

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Some(Mutex::new(reader_conn)),
            path: Some(path),
        })
    }

    /// Private in-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        super::migrations::apply_migrations(&conn)?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        match &self.reader {
            Some(reader) => reader
                .lock()
                .map_err(|_| StorageError::Init("Reader lock poisoned".into())),
            None => self.writer(),
        }
    }

    fn invalid_column(message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
        )
    }

    fn non_negative(value: i64, field_name: &str) -> rusqlite::Result<u64> {
        u64::try_from(value)
            .map_err(|_| Self::invalid_column(format!("Negative {}: {}", field_name, value)))
    }

    fn small(value: i64, field_name: &str) -> rusqlite::Result<u32> {
        u32::try_from(value)
            .map_err(|_| Self::invalid_column(format!("Out of range {}: {}", field_name, value)))
    }

    fn to_sql_int(value: u64, field_name: &str) -> Result<i64> {
        i64::try_from(value)
            .map_err(|_| StorageError::InvalidData(format!("{} too large: {}", field_name, value)))
    }

    /// Convert a row to ItemState (history attached separately)
    fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<ItemState> {
        Ok(ItemState {
            user_id: row.get("user_id")?,
            item_id: row.get("item_id")?,
            sequence: Self::non_negative(row.get("sequence")?, "sequence")?,
            level: Self::small(row.get("level")?, "level")?,
            difficulty_factor: row.get("difficulty_factor")?,
            consecutive_correct: Self::small(row.get("consecutive_correct")?, "consecutive_correct")?,
            created_at: row.get("created_at")?,
            last_reviewed: row.get("last_reviewed")?,
            next_review: row.get("next_review")?,
            review_history: Vec::new(),
            version: Self::non_negative(row.get("version")?, "version")?,
            last_submission_id: row.get("last_submission_id")?,
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<(String, ReviewEntry)> {
        let rating_value: i32 = row.get("rating")?;
        let rating = Rating::from_i32(rating_value)
            .ok_or_else(|| Self::invalid_column(format!("Invalid rating: {}", rating_value)))?;

        Ok((
            row.get("item_id")?,
            ReviewEntry {
                reviewed_at: row.get("reviewed_at")?,
                rating,
                resulting_level: Self::small(row.get("resulting_level")?, "resulting_level")?,
                interval_days: Self::small(row.get("interval_days")?, "interval_days")?,
                submission_id: row.get("submission_id")?,
            },
        ))
    }

    fn insert_entry(
        conn: &Connection,
        state: &ItemState,
        entry: &ReviewEntry,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO review_history
                (user_id, item_id, reviewed_at, rating, resulting_level, interval_days, submission_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                state.user_id,
                state.item_id,
                entry.reviewed_at,
                entry.rating.as_i32(),
                entry.resulting_level,
                entry.interval_days,
                entry.submission_id,
            ],
        )?;
        Ok(())
    }

    /// Number of item rows across all users
    pub fn count_items(&self) -> Result<i64> {
        let reader = self.reader()?;
        let count = reader.query_row("SELECT COUNT(*) FROM item_states", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Distinct users with at least one item
    pub fn list_users(&self) -> Result<Vec<String>> {
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT DISTINCT user_id FROM item_states ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Create a consistent backup using VACUUM INTO
    pub fn backup_to(&self, path: &std::path::Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| StorageError::Init("Invalid backup path encoding".to_string()))?;
        if path_str.bytes().any(|b| b < 0x20 && b != b'\t') {
            return Err(StorageError::Init(
                "Backup path contains invalid characters".to_string(),
            ));
        }
        let reader = self.reader()?;
        // VACUUM INTO doesn't support parameterized queries; escape single quotes
        reader.execute_batch(&format!("VACUUM INTO '{}'", path_str.replace('\'', "''")))?;
        Ok(())
    }
}

impl ItemRepository for SqliteRepository {
    fn load_user(&self, user_id: &str) -> Result<Vec<ItemState>> {
        let reader = self.reader()?;

        let mut stmt = reader.prepare(
            "SELECT * FROM item_states WHERE user_id = ?1 ORDER BY sequence ASC, item_id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| Self::row_to_state(row))?;
        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }

        let mut stmt = reader.prepare(
            "SELECT item_id, reviewed_at, rating, resulting_level, interval_days, submission_id
             FROM review_history WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| Self::row_to_entry(row))?;
        let mut history: HashMap<String, Vec<ReviewEntry>> = HashMap::new();
        for row in rows {
            let (item_id, entry) = row?;
            history.entry(item_id).or_default().push(entry);
        }

        for state in &mut states {
            if let Some(entries) = history.remove(&state.item_id) {
                state.review_history = entries;
            }
        }

        Ok(states)
    }

    fn insert_item(&self, state: &ItemState) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;

        tx.execute(
            "INSERT INTO item_states
                (user_id, item_id, sequence, level, difficulty_factor, consecutive_correct,
                 created_at, last_reviewed, next_review, version, last_submission_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                state.user_id,
                state.item_id,
                Self::to_sql_int(state.sequence, "sequence")?,
                state.level,
                state.difficulty_factor,
                state.consecutive_correct,
                state.created_at,
                state.last_reviewed,
                state.next_review,
                Self::to_sql_int(state.version, "version")?,
                state.last_submission_id,
            ],
        )?;
        for entry in &state.review_history {
            Self::insert_entry(&tx, state, entry)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn save_review(&self, state: &ItemState, previous_version: u64) -> Result<()> {
        let entry = state.review_history.last().ok_or_else(|| {
            StorageError::InvalidData(format!("Item {} has no review to save", state.item_id))
        })?;

        let mut writer = self.writer()?;
        let tx = writer.transaction()?;

        let changed = tx.execute(
            "UPDATE item_states SET
                level = ?1,
                difficulty_factor = ?2,
                consecutive_correct = ?3,
                last_reviewed = ?4,
                next_review = ?5,
                version = ?6,
                last_submission_id = ?7
            WHERE user_id = ?8 AND item_id = ?9 AND version = ?10",
            params![
                state.level,
                state.difficulty_factor,
                state.consecutive_correct,
                state.last_reviewed,
                state.next_review,
                Self::to_sql_int(state.version, "version")?,
                state.last_submission_id,
                state.user_id,
                state.item_id,
                Self::to_sql_int(previous_version, "version")?,
            ],
        )?;

        if changed == 0 {
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT version FROM item_states WHERE user_id = ?1 AND item_id = ?2",
                    params![state.user_id, state.item_id],
                    |row| row.get(0),
                )
                .optional()?;
            // Dropping the transaction rolls it back
            return Err(match stored {
                Some(actual) => StorageError::VersionConflict {
                    item_id: state.item_id.clone(),
                    expected: previous_version,
                    actual: u64::try_from(actual).unwrap_or_default(),
                },
                None => StorageError::NotFound(state.item_id.clone()),
            });
        }

        Self::insert_entry(&tx, state, entry)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_item(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        tx.execute(
            "DELETE FROM review_history WHERE user_id = ?1 AND item_id = ?2",
            params![user_id, item_id],
        )?;
        let rows = tx.execute(
            "DELETE FROM item_states WHERE user_id = ?1 AND item_id = ?2",
            params![user_id, item_id],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
