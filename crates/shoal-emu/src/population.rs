//! Constant-population normalization.
//!
//! Fixed-shape batched inference needs one row per declared agent every
//! step, in a stable order. [`pad_to_population`] fills in placeholder
//! frames for agents the environment produced no output for, and
//! [`force_terminal`] ends the episode as a whole when the step budget
//! runs out or no agents remain.

use indexmap::IndexMap;
use shoal_core::{AgentId, Info};
use shoal_space::Value;

/// One agent's combined step record: observation, reward, terminal
/// flag, and info travel together so padding and termination can never
/// leave the four out of sync.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentFrame {
    /// Nested (or, after flattening, 1-D leaf) observation.
    pub obs: Value,
    /// Step reward.
    pub reward: f32,
    /// Whether this agent's episode is over.
    pub done: bool,
    /// Auxiliary info.
    pub info: Info,
}

impl AgentFrame {
    /// A live frame from native environment output.
    pub fn new(obs: Value, reward: f32, done: bool, info: Info) -> Self {
        Self {
            obs,
            reward,
            done,
            info,
        }
    }

    /// The placeholder frame for an absent agent: cached dummy
    /// observation, zero reward, non-terminal, empty info.
    pub fn dummy(obs: Value) -> Self {
        Self {
            obs,
            reward: 0.0,
            done: false,
            info: Info::new(),
        }
    }
}

/// Per-agent frames for one emulated step, in stable agent order.
pub type FrameMap = IndexMap<AgentId, AgentFrame>;

/// Insert a placeholder frame for every agent present in the dummy
/// cache but absent from `frames`.
///
/// Frames already present are never removed or altered, so the call is
/// idempotent for a complete map.
pub fn pad_to_population(dummy_cache: &IndexMap<AgentId, Value>, frames: &mut FrameMap) {
    for (agent, dummy) in dummy_cache {
        if !frames.contains_key(agent) {
            frames.insert(*agent, AgentFrame::dummy(dummy.clone()));
        }
    }
}

/// Mark every frame terminal.
///
/// Episode-level termination: invoked when the constant horizon is
/// reached or when no agents produced output this step.
pub fn force_terminal(frames: &mut FrameMap) {
    for frame in frames.values_mut() {
        frame.done = true;
    }
}
