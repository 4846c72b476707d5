//! Full loop: mock environment through the emulation wrapper, batch
//! assembly, pool dispatch, and score attribution.

use indexmap::IndexMap;
use shoal::prelude::*;
use shoal_test_utils::{ConstPolicy, CyclingSelector, FixtureLoader, GridWorld};

#[test]
fn mock_env_round_trip_through_pool() {
    let config = EmulateConfig {
        flat_obs: true,
        flat_atn: true,
        const_horizon: Some(4),
        const_num_agents: Some(4),
    };
    let mut env = EmulatedEnv::new(GridWorld::new(4, 7), config);

    let mut loader = FixtureLoader::new();
    loader.register(ConstPolicy::new("up", 0).handle());
    loader.register(ConstPolicy::new("down", 1).handle());
    let mut selector = CyclingSelector::new(Vec::<String>::new());
    let mut pool = PolicyPool::new(4, &[1, 1]).unwrap();
    pool.update_active_policies(
        &["up".to_string(), "down".to_string()],
        2,
        &mut loader,
        &mut selector,
    )
    .unwrap();

    let obs = env.reset().unwrap();
    let agents: Vec<AgentId> = obs.keys().copied().collect();
    assert_eq!(agents.len(), 4);
    let mut batch =
        ObsBatch::from_rows(agents.iter().map(|a| obs[a].as_array().unwrap())).unwrap();

    for step in 1..=4u64 {
        let (actions, results) = pool.forward(&batch, None, None).unwrap();
        assert_eq!(results.len(), 2);
        // Interleaved assignment: rows 0 and 2 act with "up"'s constant
        // action, rows 1 and 3 with "down"'s.
        assert_eq!(actions.data(), &[0, 1, 0, 1]);

        let action_map: IndexMap<AgentId, Vec<i32>> = agents
            .iter()
            .enumerate()
            .map(|(row, &agent)| (agent, actions.row(row).to_vec()))
            .collect();

        let frames = env.step(&action_map).unwrap();
        assert_eq!(frames.len(), 4);

        let infos: Vec<Info> = frames.values().map(|f| f.info.clone()).collect();
        pool.update_scores(&infos, "gold").unwrap();

        batch = ObsBatch::from_rows(frames.values().map(|f| f.obs.as_array().unwrap())).unwrap();

        let all_done = frames.values().all(|f| f.done);
        assert_eq!(all_done, step == 4, "unexpected dones at step {step}");
    }

    // Every step produced one "gold" entry per agent, attributed to the
    // policy that owned that row.
    assert_eq!(pool.num_scores(), 16);
    let scores = pool.take_scores();
    assert_eq!(scores["up"].len(), 8);
    assert_eq!(scores["down"].len(), 8);
    assert_eq!(pool.num_scores(), 0);
}
