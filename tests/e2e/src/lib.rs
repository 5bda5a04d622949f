//! Cadence end-to-end test support
//!
//! - [`harness`]: engines over throwaway SQLite files with a controllable clock
//! - [`mocks`]: item fixtures and canned review histories

pub mod harness;
pub mod mocks;

pub use harness::TestEngine;
pub use mocks::TestDataFactory;
