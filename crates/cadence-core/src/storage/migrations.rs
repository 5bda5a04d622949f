//! Database Migrations
//!
//! Schema migration definitions for the SQLite repository.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: item states and review history",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Submission lookup index for idempotent replays",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS item_states (
    user_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    sequence INTEGER NOT NULL,

    -- Leveling state
    level INTEGER NOT NULL DEFAULT 0,
    difficulty_factor REAL NOT NULL DEFAULT 2.5,
    consecutive_correct INTEGER NOT NULL DEFAULT 0,

    -- Scheduling
    created_at TEXT NOT NULL,
    last_reviewed TEXT,
    next_review TEXT NOT NULL,

    -- Concurrency and idempotency
    version INTEGER NOT NULL DEFAULT 0,
    last_submission_id TEXT,

    PRIMARY KEY (user_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_items_next_review ON item_states(user_id, next_review);
CREATE INDEX IF NOT EXISTS idx_items_sequence ON item_states(user_id, sequence);

-- Append-only review log; ids give the application order
CREATE TABLE IF NOT EXISTS review_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    reviewed_at TEXT NOT NULL,
    rating INTEGER NOT NULL,
    resulting_level INTEGER NOT NULL,
    interval_days INTEGER NOT NULL,
    submission_id TEXT NOT NULL,
    FOREIGN KEY (user_id, item_id) REFERENCES item_states(user_id, item_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_history_item ON review_history(user_id, item_id, id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: one history row per submission per item
const MIGRATION_V2_UP: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_history_submission
    ON review_history(user_id, item_id, submission_id);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            // Use execute_batch to handle multi-statement SQL
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
