//! Test Data Factory
//!
//! Utilities for building realistic schedules:
//! - Batches of registered items
//! - Items driven through a fixed rating sequence
//! - A mixed deck with overdue, due-today and future items

use cadence_core::{ItemState, Rating};

use crate::harness::TestEngine;

/// Factory for creating test data
pub struct TestDataFactory;

impl TestDataFactory {
    /// Register `count` items named `{prefix}-{i}` in order
    pub fn register_batch(env: &TestEngine, user_id: &str, prefix: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let id = format!("{prefix}-{i}");
                env.engine
                    .register_item(user_id, &id)
                    .expect("Registration should succeed");
                id
            })
            .collect()
    }

    /// Review an item at each of its due instants with the given ratings
    pub fn drive(env: &TestEngine, user_id: &str, item_id: &str, ratings: &[Rating]) -> ItemState {
        let mut state = env
            .engine
            .get_item(user_id, item_id)
            .expect("Item should exist");
        for rating in ratings {
            env.advance_to_due(&state);
            state = env.review(user_id, item_id, *rating);
        }
        state
    }

    /// A deck where, relative to the returned instant, three items are
    /// overdue, two fell due earlier that day and two are still new
    ///
    /// Items are reviewed once each at staggered times, so their due
    /// instants differ.
    pub fn mixed_deck(env: &TestEngine, user_id: &str) -> chrono::DateTime<chrono::Utc> {
        for id in ["old-a", "old-b", "old-c", "today-a", "today-b", "new-a", "new-b"] {
            env.engine.register_item(user_id, id).expect("register");
        }

        // Good on a new item schedules three days out
        for id in ["old-a", "old-b", "old-c"] {
            env.review(user_id, id, Rating::Good);
            env.clock.advance(chrono::Duration::hours(3));
        }
        env.advance_days(3);
        for id in ["today-a", "today-b"] {
            env.review(user_id, id, Rating::Good);
            env.clock.advance(chrono::Duration::hours(1));
        }
        // Three days past the "today" reviews
        env.advance_days(3);
        env.now()
    }
}
