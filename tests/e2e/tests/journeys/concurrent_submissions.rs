//! Journey: several sessions submit at once
//!
//! Same-item submissions race on the version check, within one engine or
//! across engines sharing a database; different users never interfere.

use std::sync::atomic::{AtomicUsize, Ordering};

use cadence_core::{EngineError, Rating};
use cadence_e2e_tests::{TestDataFactory, TestEngine};

#[test]
fn test_same_item_same_version_has_one_winner() {
    let env = TestEngine::new_temp();
    env.engine.register_item("learner", "card").unwrap();
    for _ in 0..3 {
        let state = env.engine.get_item("learner", "card").unwrap();
        env.advance_to_due(&state);
        env.review("learner", "card", Rating::Good);
    }
    assert_eq!(env.engine.get_item("learner", "card").unwrap().version, 3);

    let wins = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for device in 0..6 {
            let env = &env;
            let (wins, conflicts) = (&wins, &conflicts);
            scope.spawn(move || {
                let submission = format!("device-{device}");
                match env
                    .engine
                    .submit_review("learner", "card", Rating::Good, &submission, Some(3))
                {
                    Ok(state) => {
                        assert_eq!(state.version, 4);
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(EngineError::Conflict { actual, .. }) => {
                        assert_eq!(actual, 4);
                        conflicts.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), 5);
    let state = env.engine.get_item("learner", "card").unwrap();
    assert_eq!(state.review_history.len(), 4);
    assert!(state.check_invariants().is_ok());
}

#[test]
fn test_retry_storm_with_one_submission_id_applies_once() {
    let env = TestEngine::new_temp();
    env.engine.register_item("learner", "card").unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let env = &env;
            scope.spawn(move || {
                env.engine
                    .submit_review("learner", "card", Rating::Good, "flaky-network", None)
                    .unwrap();
            });
        }
    });

    let state = env.engine.get_item("learner", "card").unwrap();
    assert_eq!(state.version, 1);
    assert_eq!(state.review_history.len(), 1);
}

#[test]
fn test_users_progress_independently_in_parallel() {
    let env = TestEngine::new_temp();
    let users: Vec<String> = (0..4).map(|i| format!("learner-{i}")).collect();
    for user in &users {
        TestDataFactory::register_batch(&env, user, "card", 5);
    }

    std::thread::scope(|scope| {
        for user in &users {
            let env = &env;
            scope.spawn(move || {
                for i in 0..5 {
                    env.review(user, &format!("card-{i}"), Rating::Good);
                }
            });
        }
    });

    for user in &users {
        let items = env.engine.list_items(user).unwrap();
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|s| s.level == 1 && s.version == 1));
    }
    assert_eq!(env.repository().count_items().unwrap(), 20);
}

#[test]
fn test_engines_sharing_a_database_recover_by_refetching() {
    let env = TestEngine::new_temp();
    env.engine.register_item("learner", "card").unwrap();
    let phone = env.open_peer();
    let laptop = env.open_peer();
    assert_eq!(phone.get_item("learner", "card").unwrap().version, 0);
    assert_eq!(laptop.get_item("learner", "card").unwrap().version, 0);

    phone
        .submit_review("learner", "card", Rating::Good, "phone-1", Some(0))
        .unwrap();

    // The laptop retries with whatever version it last saw until it wins
    let mut expected = 0;
    let mut attempts = 0;
    let state = loop {
        attempts += 1;
        assert!(attempts <= 2, "refetch did not resolve the conflict");
        match laptop.submit_review("learner", "card", Rating::Easy, "laptop-1", Some(expected)) {
            Ok(state) => break state,
            Err(EngineError::Conflict { .. }) => {
                expected = laptop.get_item("learner", "card").unwrap().version;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    };

    assert_eq!(attempts, 2);
    assert_eq!(state.version, 2);
    let ids: Vec<&str> = state
        .review_history
        .iter()
        .map(|e| e.submission_id.as_str())
        .collect();
    assert_eq!(ids, vec!["phone-1", "laptop-1"]);

    // The phone is now the stale one; it converges the same way
    assert!(matches!(
        phone.submit_review("learner", "card", Rating::Good, "phone-2", Some(1)),
        Err(EngineError::Conflict { actual: 2, .. })
    ));
    assert_eq!(phone.get_item("learner", "card").unwrap().version, 2);
}
