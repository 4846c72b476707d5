//! End-to-end dispatch and rotation tests against the mock policy
//! fixtures.

use shoal_core::{Info, ObsBatch, RecurrentState};
use shoal_pool::{PolicyPool, PoolError};
use shoal_test_utils::{
    ConstPolicy, CountingPolicy, CyclingSelector, FailingPolicy, FixtureLoader,
};

fn required(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A pool with every named constant policy pre-registered, rotated in
/// as required so no selector slots remain.
fn const_pool(batch_size: usize, weights: &[u32], names: &[(&str, i32)]) -> PolicyPool {
    let mut loader = FixtureLoader::new();
    for &(name, action) in names {
        loader.register(ConstPolicy::new(name, action).handle());
    }
    let mut selector = CyclingSelector::new(Vec::<String>::new());
    let mut pool = PolicyPool::new(batch_size, weights).unwrap();
    pool.update_active_policies(
        &required(&names.iter().map(|&(n, _)| n).collect::<Vec<_>>()),
        names.len(),
        &mut loader,
        &mut selector,
    )
    .unwrap();
    pool
}

// ── Dispatch ────────────────────────────────────────────────────

#[test]
fn rows_interleave_across_equal_weights() {
    let mut pool = const_pool(4, &[1, 1], &[("a", 1), ("b", 2)]);
    let obs = ObsBatch::zeros(4, 3);

    let (actions, results) = pool.forward(&obs, None, None).unwrap();

    // Round-robin assignment: a gets rows 0 and 2, b gets 1 and 3.
    assert_eq!(actions.data(), &[1, 2, 1, 2]);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "a");
    assert_eq!(results[0].rows, vec![0, 2]);
    assert_eq!(results[1].name, "b");
    assert_eq!(results[1].rows, vec![1, 3]);
    assert_eq!(results[0].values, vec![1.0, 1.0]);
}

#[test]
fn weighted_slots_receive_proportional_rows() {
    let mut pool = const_pool(6, &[2, 1], &[("heavy", 5), ("light", 9)]);
    let obs = ObsBatch::zeros(6, 2);

    let (actions, _) = pool.forward(&obs, None, None).unwrap();
    assert_eq!(actions.data(), &[5, 5, 9, 5, 5, 9]);
}

#[test]
fn forward_before_rotation_is_an_error() {
    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();
    let err = pool.forward(&ObsBatch::zeros(4, 1), None, None).unwrap_err();
    assert!(matches!(err, PoolError::NoActivePolicies));
}

#[test]
fn wrong_batch_size_is_rejected() {
    let mut pool = const_pool(4, &[1, 1], &[("a", 1), ("b", 2)]);
    let err = pool.forward(&ObsBatch::zeros(6, 1), None, None).unwrap_err();
    assert!(matches!(
        err,
        PoolError::BatchSizeMismatch {
            expected: 4,
            got: 6
        }
    ));
}

#[test]
fn failing_policy_aborts_dispatch() {
    let mut loader = FixtureLoader::new();
    loader.register(ConstPolicy::new("good", 1).handle());
    loader.register(FailingPolicy::new("bad").handle());
    let mut selector = CyclingSelector::new(Vec::<String>::new());

    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();
    pool.update_active_policies(&required(&["good", "bad"]), 2, &mut loader, &mut selector)
        .unwrap();

    let err = pool.forward(&ObsBatch::zeros(4, 1), None, None).unwrap_err();
    match err {
        PoolError::Policy { name, .. } => assert_eq!(name, "bad"),
        other => panic!("expected policy error, got {other}"),
    }
}

// ── Recurrent state ─────────────────────────────────────────────

#[test]
fn recurrent_state_evolves_per_policy() {
    let mut loader = FixtureLoader::new();
    loader.register(CountingPolicy::new("counter").handle());
    loader.register(ConstPolicy::new("frozen", 0).handle());
    let mut selector = CyclingSelector::new(Vec::<String>::new());

    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();
    pool.update_active_policies(
        &required(&["counter", "frozen"]),
        2,
        &mut loader,
        &mut selector,
    )
    .unwrap();

    let obs = ObsBatch::zeros(4, 1);
    let mut state = RecurrentState::zeros(4, 2);
    pool.forward(&obs, Some(&mut state), None).unwrap();
    pool.forward(&obs, Some(&mut state), None).unwrap();

    // Counter owns rows 0 and 2 and incremented them twice; the
    // passthrough policy's rows 1 and 3 stay zero.
    assert_eq!(state.hidden_row(0), &[2.0, 2.0]);
    assert_eq!(state.hidden_row(2), &[2.0, 2.0]);
    assert_eq!(state.hidden_row(1), &[0.0, 0.0]);
    assert_eq!(state.hidden_row(3), &[0.0, 0.0]);
}

#[test]
fn state_row_count_is_validated() {
    let mut pool = const_pool(4, &[1, 1], &[("a", 1), ("b", 2)]);
    let mut state = RecurrentState::zeros(2, 2);
    let err = pool
        .forward(&ObsBatch::zeros(4, 1), Some(&mut state), None)
        .unwrap_err();
    assert!(matches!(err, PoolError::BatchSizeMismatch { got: 2, .. }));
}

// ── Rotation ────────────────────────────────────────────────────

#[test]
fn rotation_keeps_required_and_cycles_the_rest() {
    let mut loader = FixtureLoader::new();
    loader.register(ConstPolicy::new("champion", 0).handle());
    for (i, name) in ["c1", "c2", "c3"].iter().enumerate() {
        loader.register(ConstPolicy::new(*name, i as i32 + 1).handle());
    }
    let mut selector = CyclingSelector::new(["c1", "c2", "c3"]);
    let mut pool = PolicyPool::new(6, &[1, 1, 1]).unwrap();

    for _ in 0..4 {
        pool.update_active_policies(&required(&["champion"]), 3, &mut loader, &mut selector)
            .unwrap();
        let names = pool.active_names();
        assert_eq!(names[0], "champion");
        assert_eq!(names.len(), 3);
    }

    // The required policy was loaded once and reused from the cache on
    // every later rotation.
    assert_eq!(loader.load_count("champion"), 1);
}

#[test]
fn selected_policies_reload_only_after_eviction() {
    let mut loader = FixtureLoader::new();
    loader.register(ConstPolicy::new("anchor", 0).handle());
    loader.register(ConstPolicy::new("c1", 1).handle());
    loader.register(ConstPolicy::new("c2", 2).handle());
    let mut selector = CyclingSelector::new(["c1", "c2"]);
    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();

    // Rotations alternate c1, c2, c1: c1 is evicted by the second
    // rotation, so its third appearance is a fresh load.
    for _ in 0..3 {
        pool.update_active_policies(&required(&["anchor"]), 2, &mut loader, &mut selector)
            .unwrap();
    }
    assert_eq!(loader.load_count("c1"), 2);
    assert_eq!(loader.load_count("c2"), 1);
}

#[test]
fn active_count_must_match_slots() {
    let mut loader = FixtureLoader::new();
    let mut selector = CyclingSelector::new(Vec::<String>::new());
    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();
    let err = pool
        .update_active_policies(&required(&["a"]), 3, &mut loader, &mut selector)
        .unwrap_err();
    assert!(matches!(
        err,
        PoolError::ActiveCountMismatch {
            expected: 2,
            got: 3
        }
    ));
}

#[test]
fn too_many_required_is_rejected() {
    let mut loader = FixtureLoader::new();
    let mut selector = CyclingSelector::new(Vec::<String>::new());
    let mut pool = PolicyPool::new(2, &[1]).unwrap();
    let err = pool
        .update_active_policies(&required(&["a", "b"]), 1, &mut loader, &mut selector)
        .unwrap_err();
    assert!(matches!(
        err,
        PoolError::RequiredExceedsTotal {
            required: 2,
            total: 1
        }
    ));
}

#[test]
fn short_selector_violates_contract() {
    let mut loader = FixtureLoader::new();
    loader.register(ConstPolicy::new("only", 1).handle());
    // One name available, two selector slots to fill.
    let mut selector = CyclingSelector::new(["only"]);
    let mut pool = PolicyPool::new(3, &[1, 1, 1]).unwrap();
    let err = pool
        .update_active_policies(&[], 3, &mut loader, &mut selector)
        .unwrap_err();
    assert!(matches!(err, PoolError::SelectorContract { .. }));
}

#[test]
fn failed_load_surfaces_the_policy_name() {
    let mut loader = FixtureLoader::new();
    let mut selector = CyclingSelector::new(Vec::<String>::new());
    let mut pool = PolicyPool::new(2, &[1]).unwrap();
    let err = pool
        .update_active_policies(&required(&["ghost"]), 1, &mut loader, &mut selector)
        .unwrap_err();
    match err {
        PoolError::Policy { name, .. } => assert_eq!(name, "ghost"),
        other => panic!("expected load failure, got {other}"),
    }
}

// ── Score attribution ───────────────────────────────────────────

#[test]
fn scores_attribute_to_the_assigned_policy() {
    let mut pool = const_pool(4, &[1, 1], &[("a", 1), ("b", 2)]);

    // Rows 0 and 2 belong to a, rows 1 and 3 to b; row 3 has no score.
    let mut infos = vec![Info::new(); 4];
    infos[0].insert("return".into(), 10.0);
    infos[1].insert("return".into(), 20.0);
    infos[2].insert("return".into(), 30.0);

    let attributed = pool.update_scores(&infos, "return").unwrap();
    assert_eq!(attributed["a"], vec![10.0, 30.0]);
    assert_eq!(attributed["b"], vec![20.0]);
    assert_eq!(pool.num_scores(), 3);

    // A second batch accumulates; draining resets.
    pool.update_scores(&infos, "return").unwrap();
    assert_eq!(pool.scores()["a"], vec![10.0, 30.0, 10.0, 30.0]);
    assert_eq!(pool.num_scores(), 6);

    let drained = pool.take_scores();
    assert_eq!(drained["b"], vec![20.0, 20.0]);
    assert_eq!(pool.num_scores(), 0);
    assert!(pool.scores().is_empty());
}

#[test]
fn scores_require_one_info_per_row() {
    let mut pool = const_pool(4, &[1, 1], &[("a", 1), ("b", 2)]);
    let infos = vec![Info::new(); 3];
    let err = pool.update_scores(&infos, "return").unwrap_err();
    assert!(matches!(
        err,
        PoolError::BatchSizeMismatch {
            expected: 4,
            got: 3
        }
    ));
}
