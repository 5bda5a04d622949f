//! Test Engine Manager
//!
//! Provides isolated engine instances for testing:
//! - Temporary SQLite databases that are automatically cleaned up
//! - A manual clock shared across restarts
//! - Reopening the same database to simulate a process restart

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cadence_core::{
    Clock, EngineConfig, ItemState, ManualClock, OffsetCalendar, Rating, ReviewEngine,
    SqliteRepository,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

/// Manager for test engines
///
/// Each instance owns its own database file, so tests never interfere.
///
/// # Example
///
/// ```rust,ignore
/// let mut env = TestEngine::new_temp();
/// env.engine.register_item("u1", "a")?;
/// env.advance_days(1);
/// env.review("u1", "a", Rating::Good);
///
/// // Simulate a restart against the same file
/// env.reopen();
/// ```
pub struct TestEngine {
    /// The engine under test
    pub engine: ReviewEngine,
    /// Shared clock; survives `reopen`
    pub clock: Arc<ManualClock>,
    repo: Arc<SqliteRepository>,
    config: EngineConfig,
    db_path: PathBuf,
    submissions: AtomicU64,
    /// Kept alive so the database outlives the engine
    _temp_dir: TempDir,
}

impl TestEngine {
    /// Start instant for every test clock
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
    }

    /// Engine with default configuration over a fresh temp database
    pub fn new_temp() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_cadence.db");
        let clock = Arc::new(ManualClock::new(Self::epoch()));
        let (engine, repo) = Self::build(&db_path, &config, &clock);

        Self {
            engine,
            clock,
            repo,
            config,
            db_path,
            submissions: AtomicU64::new(0),
            _temp_dir: temp_dir,
        }
    }

    fn build(
        db_path: &Path,
        config: &EngineConfig,
        clock: &Arc<ManualClock>,
    ) -> (ReviewEngine, Arc<SqliteRepository>) {
        let repo = Arc::new(
            SqliteRepository::open(Some(db_path.to_path_buf())).expect("Failed to open test database"),
        );
        let engine = ReviewEngine::new(repo.clone(), config.clone())
            .expect("Failed to create test engine")
            .with_clock(clock.clone())
            .with_calendar(Arc::new(OffsetCalendar::utc()));
        (engine, repo)
    }

    /// Drop the engine and open a new one over the same database file
    pub fn reopen(&mut self) {
        let (engine, repo) = Self::build(&self.db_path, &self.config, &self.clock);
        self.engine = engine;
        self.repo = repo;
    }

    /// A second engine over the same database, like another process would be
    pub fn open_peer(&self) -> ReviewEngine {
        Self::build(&self.db_path, &self.config, &self.clock).0
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn repository(&self) -> &SqliteRepository {
        &self.repo
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    /// Jump the clock to an item's due instant
    pub fn advance_to_due(&self, state: &ItemState) {
        if state.next_review > self.clock.now() {
            self.clock.set(state.next_review);
        }
    }

    /// Fresh submission id, unique within this engine
    pub fn submission(&self) -> String {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        format!("sub-{n}")
    }

    /// Submit a review with a fresh submission id and no version check
    pub fn review(&self, user_id: &str, item_id: &str, rating: Rating) -> ItemState {
        let submission = self.submission();
        self.engine
            .submit_review(user_id, item_id, rating, &submission, None)
            .expect("Review should succeed")
    }
}
