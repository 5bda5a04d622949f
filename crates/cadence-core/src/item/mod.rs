//! Item module - per-user scheduling records
//!
//! - [`ItemState`]: level, difficulty factor, schedule, version, idempotency token
//! - [`ReviewEntry`]: append-only audit trail of accepted reviews

mod state;

pub use state::{InvariantViolation, ItemState, ReviewEntry};
