//! Journey: the process restarts between reviews
//!
//! Everything the engine keeps in memory must come back from SQLite intact.

use cadence_core::{EngineError, Rating, SessionMode};
use cadence_e2e_tests::{TestDataFactory, TestEngine};

const USER: &str = "learner";

#[test]
fn test_state_survives_restart() {
    let mut env = TestEngine::new_temp();
    TestDataFactory::register_batch(&env, USER, "card", 3);
    let reviewed = TestDataFactory::drive(&env, USER, "card-1", &[Rating::Good, Rating::Hard]);

    env.reopen();

    let reloaded = env.engine.get_item(USER, "card-1").unwrap();
    assert_eq!(reloaded, reviewed);
    assert_eq!(reloaded.review_history.len(), 2);
    assert_eq!(reloaded.review_history[1].rating, Rating::Hard);
    assert_eq!(env.engine.list_items(USER).unwrap().len(), 3);
}

#[test]
fn test_replay_after_restart_is_still_idempotent() {
    let mut env = TestEngine::new_temp();
    env.engine.register_item(USER, "card").unwrap();
    let applied = env
        .engine
        .submit_review(USER, "card", Rating::Good, "lost-response", Some(0))
        .unwrap();

    env.reopen();
    env.advance_days(1);

    let retried = env
        .engine
        .submit_review(USER, "card", Rating::Good, "lost-response", Some(0))
        .unwrap();
    assert_eq!(retried, applied);
    assert_eq!(env.repository().count_items().unwrap(), 1);
}

#[test]
fn test_registration_order_continues_after_restart() {
    let mut env = TestEngine::new_temp();
    TestDataFactory::register_batch(&env, USER, "first", 2);
    env.reopen();
    env.engine.register_item(USER, "second-0").unwrap();

    let batch = env
        .engine
        .get_session(USER, 10, SessionMode::IncludeNew, env.now(), None)
        .unwrap();
    let ids: Vec<&str> = batch.items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["first-0", "first-1", "second-0"]);
}

#[test]
fn test_writer_in_another_process_causes_conflict() {
    let env = TestEngine::new_temp();
    env.engine.register_item(USER, "card").unwrap();
    let peer = env.open_peer();
    // Both engines have now cached version 0
    assert_eq!(peer.get_item(USER, "card").unwrap().version, 0);

    peer.submit_review(USER, "card", Rating::Good, "peer-1", None)
        .unwrap();

    let result = env.engine.submit_review(USER, "card", Rating::Easy, "local-1", None);
    assert!(matches!(
        result,
        Err(EngineError::Conflict {
            expected: 0,
            actual: 1,
            ..
        })
    ));

    // The losing engine picked up the winning write
    let fresh = env.engine.get_item(USER, "card").unwrap();
    assert_eq!(fresh.last_submission_id.as_deref(), Some("peer-1"));
    assert_eq!(fresh.version, 1);
    let state = env
        .engine
        .submit_review(USER, "card", Rating::Easy, "local-1", Some(fresh.version))
        .unwrap();
    assert_eq!(state.version, 2);
}

#[test]
fn test_removed_items_stay_removed() {
    let mut env = TestEngine::new_temp();
    TestDataFactory::register_batch(&env, USER, "card", 2);
    env.review(USER, "card-0", Rating::Good);
    env.engine.remove_item(USER, "card-0").unwrap();

    env.reopen();
    assert!(matches!(
        env.engine.get_item(USER, "card-0"),
        Err(EngineError::NotFound { .. })
    ));
    assert_eq!(env.engine.list_items(USER).unwrap().len(), 1);
}

#[test]
fn test_backup_is_a_loadable_copy() {
    let env = TestEngine::new_temp();
    TestDataFactory::register_batch(&env, USER, "card", 4);
    env.review(USER, "card-2", Rating::Easy);

    let dir = tempfile::tempdir().unwrap();
    let backup = dir.path().join("backup.db");
    env.repository().backup_to(&backup).unwrap();

    let restored = cadence_core::SqliteRepository::open(Some(backup)).unwrap();
    assert_eq!(restored.count_items().unwrap(), 4);
    assert_eq!(restored.list_users().unwrap(), vec![USER.to_string()]);
}
