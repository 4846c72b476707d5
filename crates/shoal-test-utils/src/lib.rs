//! Test utilities and mock types for Shoal development.
//!
//! Provides a deterministic mock environment ([`GridWorld`]), mock
//! implementations of the policy seam traits ([`ConstPolicy`],
//! [`CountingPolicy`], [`FailingPolicy`], [`CyclingSelector`],
//! [`FixtureLoader`]), and space/value fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use shoal_core::{
    ActionBatch, AgentId, Info, ObsBatch, Policy, PolicyError, PolicyHandle, PolicyLoader,
    PolicyOutput, PolicySelector, RecurrentState,
};
use shoal_emu::{MultiAgentEnv, NativeStep};
use shoal_space::{SpaceDesc, Value};

// ── Mock environment ────────────────────────────────────────────

/// A deterministic multi-agent grid environment.
///
/// Each agent holds a 2-D position and a gold count; the nested
/// observation is `{"pos": [x, y], "inv": {"gold": [g]}}` and the
/// action is a single 4-way move choice. With attrition enabled,
/// agents die with the configured per-step probability, drawn from a
/// seeded ChaCha8 RNG so runs replay exactly.
pub struct GridWorld {
    num_agents: usize,
    positions: IndexMap<AgentId, [f32; 2]>,
    gold: IndexMap<AgentId, f32>,
    rng: ChaCha8Rng,
    attrition: f64,
}

impl GridWorld {
    pub fn new(num_agents: usize, seed: u64) -> Self {
        Self {
            num_agents,
            positions: IndexMap::new(),
            gold: IndexMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            attrition: 0.0,
        }
    }

    /// Kill each live agent with probability `prob` per step.
    pub fn with_attrition(mut self, prob: f64) -> Self {
        self.attrition = prob;
        self
    }

    /// Remove one agent, so subsequent steps produce no output for it.
    pub fn kill(&mut self, agent: AgentId) {
        self.positions.swap_remove(&agent);
        self.gold.swap_remove(&agent);
    }

    /// Remove every live agent, so the next step produces no output.
    pub fn kill_all(&mut self) {
        self.positions.clear();
        self.gold.clear();
    }

    fn observe(&self, agent: AgentId) -> Value {
        let pos = self.positions[&agent];
        Value::dict([
            ("pos", Value::array([pos[0], pos[1]])),
            (
                "inv",
                Value::dict([("gold", Value::scalar(self.gold[&agent]))]),
            ),
        ])
    }
}

impl MultiAgentEnv for GridWorld {
    fn reset(&mut self) -> IndexMap<AgentId, Value> {
        self.positions = (1..=self.num_agents as u32)
            .map(|i| (AgentId(i), [0.0, 0.0]))
            .collect();
        self.gold = (1..=self.num_agents as u32)
            .map(|i| (AgentId(i), 0.0))
            .collect();
        self.positions
            .keys()
            .map(|&agent| (agent, self.observe(agent)))
            .collect()
    }

    fn step(&mut self, actions: &IndexMap<AgentId, Vec<i32>>) -> NativeStep {
        const MOVES: [[f32; 2]; 4] = [[0.0, 1.0], [0.0, -1.0], [1.0, 0.0], [-1.0, 0.0]];

        let live: Vec<AgentId> = self.positions.keys().copied().collect();
        for agent in &live {
            if let Some(action) = actions.get(agent) {
                let mv = MOVES[action.first().copied().unwrap_or(0) as usize % 4];
                let pos = &mut self.positions[agent];
                pos[0] += mv[0];
                pos[1] += mv[1];
                self.gold[agent] += 1.0;
            }
        }

        if self.attrition > 0.0 {
            let doomed: Vec<AgentId> = live
                .iter()
                .copied()
                .filter(|_| self.rng.random_bool(self.attrition))
                .collect();
            for agent in doomed {
                self.positions.swap_remove(&agent);
                self.gold.swap_remove(&agent);
            }
        }

        let mut step = NativeStep::default();
        for (&agent, _) in &self.positions {
            step.obs.insert(agent, self.observe(agent));
            step.rewards.insert(agent, 1.0);
            step.dones.insert(agent, false);
            let mut info = Info::new();
            info.insert("gold".into(), f64::from(self.gold[&agent]));
            step.infos.insert(agent, info);
        }
        step
    }

    fn observation_space(&self, _agent: AgentId) -> SpaceDesc {
        fixtures::grid_obs_space()
    }

    fn action_space(&self, _agent: AgentId) -> SpaceDesc {
        SpaceDesc::dict([("move", SpaceDesc::Discrete { n: 4 })])
    }

    fn possible_agents(&self) -> Vec<AgentId> {
        (1..=self.num_agents as u32).map(AgentId).collect()
    }
}

// ── Mock policies ───────────────────────────────────────────────

/// A policy answering every row with the same action value.
///
/// Values are the action as `f32`; recurrent state is passed through
/// unchanged. Distinct constants make per-row attribution visible in
/// dispatch tests.
pub struct ConstPolicy {
    name: String,
    action: i32,
    width: usize,
}

impl ConstPolicy {
    pub fn new(name: impl Into<String>, action: i32) -> Self {
        Self {
            name: name.into(),
            action,
            width: 1,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// The policy wrapped in a pool-compatible handle.
    pub fn handle(self) -> PolicyHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Policy for ConstPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_value(
        &mut self,
        obs: &ObsBatch,
        state: Option<RecurrentState>,
        _dones: Option<&[bool]>,
    ) -> Result<PolicyOutput, PolicyError> {
        let rows = obs.rows();
        Ok(PolicyOutput {
            actions: ActionBatch::from_data(vec![self.action; rows * self.width], rows, self.width),
            log_probs: vec![0.0; rows],
            entropy: vec![0.0; rows],
            values: vec![self.action as f32; rows],
            state,
        })
    }
}

/// A recurrent policy that increments every element of its hidden
/// state by one per forward call.
///
/// Tests use it to verify that each policy's state slice evolves
/// independently inside the shared row-indexed buffer.
pub struct CountingPolicy {
    name: String,
}

impl CountingPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn handle(self) -> PolicyHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Policy for CountingPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_value(
        &mut self,
        obs: &ObsBatch,
        state: Option<RecurrentState>,
        _dones: Option<&[bool]>,
    ) -> Result<PolicyOutput, PolicyError> {
        let rows = obs.rows();
        let state = state.map(|mut s| {
            for row in 0..s.rows() {
                for v in s.hidden_row_mut(row) {
                    *v += 1.0;
                }
            }
            s
        });
        Ok(PolicyOutput {
            actions: ActionBatch::zeros(rows, 1),
            log_probs: vec![0.0; rows],
            entropy: vec![0.0; rows],
            values: vec![0.0; rows],
            state,
        })
    }
}

/// A policy whose forward pass always fails.
pub struct FailingPolicy {
    name: String,
}

impl FailingPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn handle(self) -> PolicyHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Policy for FailingPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_value(
        &mut self,
        _obs: &ObsBatch,
        _state: Option<RecurrentState>,
        _dones: Option<&[bool]>,
    ) -> Result<PolicyOutput, PolicyError> {
        Err(PolicyError::ExecutionFailed {
            reason: "mock failure".into(),
        })
    }
}

// ── Selector and loader fixtures ────────────────────────────────

/// A selector cycling through a fixed name list, skipping excluded
/// and already-chosen names.
pub struct CyclingSelector {
    names: Vec<String>,
    cursor: usize,
}

impl CyclingSelector {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }
}

impl PolicySelector for CyclingSelector {
    fn select(&mut self, count: usize, exclude: &[String]) -> Vec<String> {
        let mut chosen = Vec::with_capacity(count);
        let mut scanned = 0;
        while chosen.len() < count && scanned < self.names.len() {
            let name = &self.names[self.cursor % self.names.len()];
            self.cursor += 1;
            scanned += 1;
            if !exclude.contains(name) && !chosen.contains(name) {
                chosen.push(name.clone());
            }
        }
        chosen
    }
}

/// A loader backed by pre-registered policy handles, counting loads
/// per name so tests can assert the pool's cache is reused.
pub struct FixtureLoader {
    policies: IndexMap<String, PolicyHandle>,
    load_counts: IndexMap<String, usize>,
}

impl FixtureLoader {
    pub fn new() -> Self {
        Self {
            policies: IndexMap::new(),
            load_counts: IndexMap::new(),
        }
    }

    /// Register a loadable policy under its own name.
    pub fn register(&mut self, handle: PolicyHandle) {
        let name = handle.borrow().name().to_string();
        self.policies.insert(name, handle);
    }

    /// How many times `name` has been loaded.
    pub fn load_count(&self, name: &str) -> usize {
        self.load_counts.get(name).copied().unwrap_or(0)
    }
}

impl Default for FixtureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyLoader for FixtureLoader {
    fn load(&mut self, name: &str) -> Result<PolicyHandle, PolicyError> {
        *self.load_counts.entry(name.to_string()).or_insert(0) += 1;
        self.policies
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| PolicyError::LoadFailed {
                name: name.to_string(),
                reason: "not registered".into(),
            })
    }
}
