//! Optional feature-parsing and reward-shaping hooks.
//!
//! Both are externally supplied pure functions consumed through narrow
//! capability traits. Absence of a hook means identity behavior; the
//! wrapper holds them as `Option<Box<dyn ...>>` rather than threading
//! null checks through the step logic.

use indexmap::IndexMap;
use shoal_core::AgentId;
use shoal_space::{SpaceDesc, Value};

/// Transforms raw nested observations into engineered features.
///
/// Contract: the returned map has exactly the agent-id key set of the
/// input. The wrapper validates this and reports a violation as an
/// error rather than continuing with a ragged population.
pub trait FeatureParser {
    /// The structured space of parsed observations, if the parser
    /// changes the space. `None` means the native space still
    /// describes the output.
    fn spec(&self) -> Option<SpaceDesc> {
        None
    }

    /// Transform the per-agent observation map at the given step.
    fn parse(&self, obs: IndexMap<AgentId, Value>, step: u64) -> IndexMap<AgentId, Value>;
}

/// Reshapes raw per-agent rewards.
///
/// Same key-preservation contract as [`FeatureParser`].
pub trait RewardShaper {
    /// Transform the per-agent reward map at the given step.
    fn shape(&self, rewards: IndexMap<AgentId, f32>, step: u64) -> IndexMap<AgentId, f32>;
}
