//! Journey: a learner works through a deck over several weeks
//!
//! Registration, sessions, reviews and summaries against a real SQLite file.

use cadence_core::{EngineError, Rating, SessionMode, SessionPhase};
use cadence_e2e_tests::{TestDataFactory, TestEngine};
use chrono::Duration;

const USER: &str = "learner";

#[test]
fn test_intervals_grow_then_reset_on_lapse() {
    let env = TestEngine::new_temp();
    env.engine.register_item(USER, "card").unwrap();

    let mut intervals = Vec::new();
    let mut state = env.engine.get_item(USER, "card").unwrap();
    for rating in [Rating::Good, Rating::Good, Rating::Good, Rating::Again, Rating::Hard] {
        env.advance_to_due(&state);
        state = env.review(USER, "card", rating);
        intervals.push(state.scheduled_interval_days().unwrap());
    }

    assert_eq!(intervals, vec![3, 8, 20, 1, 1]);
    assert_eq!(state.level, 1);
    assert!((state.difficulty_factor - 2.25).abs() < 1e-9);
    assert_eq!(state.consecutive_correct, 1);
    assert_eq!(state.version, 5);
    assert_eq!(state.review_history.len(), 5);
    assert!(state.check_invariants().is_ok());
}

#[test]
fn test_easy_answers_reach_mastery() {
    let env = TestEngine::new_temp();
    env.engine.register_item(USER, "card").unwrap();

    let state = TestDataFactory::drive(&env, USER, "card", &[Rating::Easy; 6]);
    let threshold = env.engine.config().mastery_threshold;
    assert_eq!(state.level, 12);
    assert!(state.is_mastered(threshold));
    assert!(state.scheduled_interval_days().unwrap() <= 365);
}

#[test]
fn test_session_orders_overdue_then_today_then_new() {
    let env = TestEngine::new_temp();
    let as_of = TestDataFactory::mixed_deck(&env, USER);

    let batch = env
        .engine
        .get_session(USER, 5, SessionMode::ReviewOnly, as_of, None)
        .unwrap();
    let ids: Vec<&str> = batch.items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["old-a", "old-b", "old-c", "today-a", "today-b"]);
    assert!(batch.next_cursor.is_none());

    let full = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, as_of, None)
        .unwrap();
    let phases: Vec<SessionPhase> = full.items.iter().map(|i| i.phase).collect();
    assert_eq!(
        phases,
        vec![
            SessionPhase::Overdue,
            SessionPhase::Overdue,
            SessionPhase::Overdue,
            SessionPhase::DueToday,
            SessionPhase::DueToday,
            SessionPhase::New,
            SessionPhase::New,
        ]
    );
}

#[test]
fn test_working_a_session_clears_the_day() {
    let env = TestEngine::new_temp();
    let as_of = TestDataFactory::mixed_deck(&env, USER);

    let mut cursor = None;
    let mut seen = Vec::new();
    loop {
        let batch = env
            .engine
            .get_session(USER, 3, SessionMode::IncludeNew, as_of, cursor)
            .unwrap();
        for item in &batch.items {
            let submission = env.submission();
            env.engine
                .submit_review(USER, &item.item_id, Rating::Good, &submission, Some(item.version))
                .unwrap();
            seen.push(item.item_id.clone());
        }
        cursor = batch.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    assert_eq!(seen.len(), 7);
    let summary = env.engine.get_summary(USER, as_of).unwrap();
    assert_eq!(summary.total, 7);
    assert_eq!(summary.overdue, 0);
    assert_eq!(summary.due_today, 0);
    assert_eq!(summary.due_now(), 0);

    let after = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, as_of, None)
        .unwrap();
    assert!(after.items.is_empty());
}

#[test]
fn test_daily_new_cap_applies_across_sessions() {
    let config = cadence_core::EngineConfig {
        daily_new_cap: 3,
        ..Default::default()
    };
    let env = TestEngine::with_config(config);
    TestDataFactory::register_batch(&env, USER, "word", 10);

    let first = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, env.now(), None)
        .unwrap();
    assert_eq!(first.items.len(), 3);
    for item in &first.items {
        env.review(USER, &item.item_id, Rating::Again);
    }

    // Same day: the cap is spent
    env.clock.advance(Duration::hours(2));
    let later = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, env.now(), None)
        .unwrap();
    assert!(later.items.is_empty());

    // Next day: the three lapsed items are due, plus three fresh ones
    env.advance_days(1);
    let tomorrow = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, env.now(), None)
        .unwrap();
    let new_count = tomorrow.items.iter().filter(|i| i.phase == SessionPhase::New).count();
    assert_eq!(tomorrow.items.len(), 6);
    assert_eq!(new_count, 3);
    assert_eq!(tomorrow.items[3].item_id, "word-3");
}

#[test]
fn test_summary_buckets_partition_the_deck() {
    let env = TestEngine::new_temp();
    let as_of = TestDataFactory::mixed_deck(&env, USER);

    let s = env.engine.get_summary(USER, as_of).unwrap();
    assert_eq!(s.total, 7);
    // Never-reviewed items count as due from the moment they were registered
    assert_eq!(s.overdue, 5);
    assert_eq!(s.due_today, 2);
    assert_eq!(s.overdue + s.due_this_week + s.later, s.total);
    assert_eq!(s.due_by_date.values().sum::<usize>(), s.total - s.overdue);
}

#[test]
fn test_errors_surface_as_typed_results() {
    let env = TestEngine::new_temp();
    assert!(matches!(
        env.engine.submit_review(USER, "missing", Rating::Good, "s", None),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        env.engine.get_session(USER, 0, SessionMode::ReviewOnly, env.now(), None),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!("meh".parse::<Rating>(), Err(EngineError::Validation(_))));
}
