//! The native environment seam.

use indexmap::IndexMap;
use shoal_core::{AgentId, Info};
use shoal_space::{SpaceDesc, Value};

/// Output of one native environment step, keyed by agent id.
///
/// Agents absent from `obs` are considered terminated or not yet
/// joined for that step; the emulation wrapper recomputes the live
/// population from this map every step.
#[derive(Clone, Debug, Default)]
pub struct NativeStep {
    /// Nested observation per live agent.
    pub obs: IndexMap<AgentId, Value>,
    /// Reward per live agent.
    pub rewards: IndexMap<AgentId, f32>,
    /// Terminal flag per live agent.
    pub dones: IndexMap<AgentId, bool>,
    /// Auxiliary info per live agent.
    pub infos: IndexMap<AgentId, Info>,
}

/// A native multi-agent environment, consumed through its interface
/// boundary only. The simulation behind it is not this crate's
/// concern.
///
/// Actions arrive already flat and discretized (one choice per action
/// leaf); mapping them onto the structured action space is the native
/// environment's own job.
pub trait MultiAgentEnv {
    /// Begin a new episode, returning initial observations per agent.
    fn reset(&mut self) -> IndexMap<AgentId, Value>;

    /// Advance one step with flat discretized actions per agent.
    fn step(&mut self, actions: &IndexMap<AgentId, Vec<i32>>) -> NativeStep;

    /// Structured observation space for one agent.
    fn observation_space(&self, agent: AgentId) -> SpaceDesc;

    /// Structured action space for one agent.
    fn action_space(&self, agent: AgentId) -> SpaceDesc;

    /// The declared agent-id population.
    fn possible_agents(&self) -> Vec<AgentId>;
}
