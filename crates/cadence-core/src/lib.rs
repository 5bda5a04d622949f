//! # Cadence Core
//!
//! Spaced-repetition scheduling engine. Decides when each learner should see
//! each study item again, based on how well they recalled it last time.
//!
//! - **Interval Policy**: levelled transition table over `{Again, Hard, Good, Easy}`,
//!   replaceable through the [`IntervalPolicy`] trait
//! - **Due Index**: per-user ordered index over `next_review` with day-bucket counts
//! - **Outcome Processor**: idempotent, version-checked review submission with
//!   rollback on persistence failure
//! - **Session Coordinator**: deterministic, resumable review batches
//! - **Schedule Summary**: due-load counts for dashboards
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadence_core::{EngineConfig, Rating, ReviewEngine, SessionMode, SqliteRepository};
//!
//! let repo = Arc::new(SqliteRepository::open(None)?);
//! let engine = ReviewEngine::new(repo, EngineConfig::from_env()?)?;
//!
//! engine.register_item("learner-1", "kanji-42")?;
//! let batch = engine.get_session("learner-1", 20, SessionMode::IncludeNew, chrono::Utc::now(), None)?;
//!
//! for item in &batch.items {
//!     let submission = uuid::Uuid::new_v4().to_string();
//!     engine.submit_review("learner-1", &item.item_id, Rating::Good, &submission, Some(item.version))?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): Compile SQLite into the binary
//! - `encryption`: SQLCipher-backed database, keyed by `CADENCE_ENCRYPTION_KEY`

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod index;
pub mod item;
pub mod policy;
pub mod session;
pub mod storage;
pub mod summary;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use clock::{Calendar, Clock, ManualClock, OffsetCalendar, SystemClock};
pub use config::EngineConfig;
pub use engine::ReviewEngine;
pub use error::{EngineError, Result};
pub use events::EngineEvent;
pub use index::{BucketCounts, DueIndex};
pub use item::{InvariantViolation, ItemState, ReviewEntry};
pub use policy::{
    IntervalPolicy, LevelledPolicy, PolicyConfig, PolicyInput, PreviewResults, Rating, Transition,
};
pub use session::{SessionBatch, SessionCursor, SessionItem, SessionMode, SessionPhase};
pub use storage::{ItemRepository, MemoryRepository, SqliteRepository, StorageError};
pub use summary::ScheduleSummary;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current SQLite schema version
pub const SCHEMA_VERSION: u32 = storage::MIGRATIONS.len() as u32;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        EngineConfig, EngineError, EngineEvent, ItemState, Rating, Result, ReviewEngine,
        ScheduleSummary, SessionBatch, SessionCursor, SessionMode, SqliteRepository,
    };
}
