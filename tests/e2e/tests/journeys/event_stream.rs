//! Journey: downstream consumers follow the event stream
//!
//! The gamification side sees exactly one `ReviewCompleted` per accepted
//! review and never one for a replay, a conflict or a failed write.

use cadence_core::{EngineConfig, EngineEvent, Rating};
use cadence_e2e_tests::{TestDataFactory, TestEngine};
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn test_events_follow_the_learner() {
    let env = TestEngine::new_temp();
    let mut rx = env.engine.subscribe();

    env.engine.register_item("learner", "card").unwrap();
    env.engine
        .submit_review("learner", "card", Rating::Good, "s1", None)
        .unwrap();
    env.engine
        .submit_review("learner", "card", Rating::Good, "s1", None)
        .unwrap();
    let _ = env
        .engine
        .submit_review("learner", "card", Rating::Good, "s2", Some(0));
    env.engine.remove_item("learner", "card").unwrap();

    assert!(matches!(rx.recv().await, Ok(EngineEvent::ItemRegistered { .. })));
    match rx.recv().await {
        Ok(EngineEvent::ReviewCompleted {
            user_id,
            item_id,
            new_level,
            mastered_transition,
            ..
        }) => {
            assert_eq!(user_id, "learner");
            assert_eq!(item_id, "card");
            assert_eq!(new_level, 1);
            assert!(!mastered_transition);
        }
        other => panic!("expected ReviewCompleted, got {:?}", other),
    }
    assert!(matches!(rx.recv().await, Ok(EngineEvent::ItemRemoved { .. })));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_mastery_is_announced_once() {
    let config = EngineConfig {
        mastery_threshold: 3,
        ..EngineConfig::default()
    };
    let env = TestEngine::with_config(config);
    env.engine.register_item("learner", "card").unwrap();
    let mut rx = env.engine.subscribe();

    TestDataFactory::drive(
        &env,
        "learner",
        "card",
        &[Rating::Good, Rating::Good, Rating::Good, Rating::Good, Rating::Again, Rating::Easy],
    );

    let mut transitions = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::ReviewCompleted {
            new_level,
            mastered_transition,
            ..
        } = event
        {
            transitions.push((new_level, mastered_transition));
        }
    }
    // Levels 1, 2, 3, 4, then a lapse to 2 and back up to 4
    assert_eq!(
        transitions,
        vec![(1, false), (2, false), (3, true), (4, false), (2, false), (4, true)]
    );
}

#[test]
fn test_event_ids_are_unique() {
    let env = TestEngine::new_temp();
    let mut rx = env.engine.subscribe();
    TestDataFactory::register_batch(&env, "learner", "card", 3);
    for i in 0..3 {
        env.review("learner", &format!("card-{i}"), Rating::Hard);
    }

    let mut ids = std::collections::HashSet::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::ReviewCompleted { event_id, .. } = event {
            assert!(ids.insert(event_id));
        }
    }
    assert_eq!(ids.len(), 3);
}
