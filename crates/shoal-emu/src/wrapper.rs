//! The emulated environment wrapper.
//!
//! Composes population normalization and space flattening around a
//! native step/reset cycle. State machine: `Reset → (Step)* → Reset`.
//! The dummy-observation cache survives resets; it accumulates lazily
//! per agent for the wrapper's lifetime and is invalidated only by
//! reconstructing the wrapper.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use shoal_core::AgentId;
use shoal_space::{packed_action_space, ravel, SpaceDesc, SpaceError, Value};

use crate::env::MultiAgentEnv;
use crate::hooks::{FeatureParser, RewardShaper};
use crate::population::{force_terminal, pad_to_population, AgentFrame, FrameMap};

// ── Configuration ───────────────────────────────────────────────

/// Recognized emulation options.
///
/// Defaults match the standard trainer setup: flat observations, flat
/// actions, a 1024-step horizon, and a 128-agent constant population.
#[derive(Clone, Debug)]
pub struct EmulateConfig {
    /// Flatten each agent's observation into a fixed-size 1-D array.
    pub flat_obs: bool,
    /// Declare the action space as flat discretized (`MultiDiscrete`).
    pub flat_atn: bool,
    /// Step budget before forced termination, or `None` to disable.
    pub const_horizon: Option<u64>,
    /// Fixed population size for padding, or `None` to disable.
    pub const_num_agents: Option<usize>,
}

impl Default for EmulateConfig {
    fn default() -> Self {
        Self {
            flat_obs: true,
            flat_atn: true,
            const_horizon: Some(1024),
            const_num_agents: Some(128),
        }
    }
}

// ── Error type ──────────────────────────────────────────────────

/// Errors from the emulation wrapper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmuError {
    /// The step count exceeded the declared constant horizon — a
    /// configuration or environment bug, not a recoverable condition.
    HorizonExceeded {
        /// Step count observed.
        step: u64,
        /// Declared horizon.
        horizon: u64,
    },
    /// A hook returned a map whose agent-id key set differs from its
    /// input's.
    HookKeyMismatch {
        /// Which hook violated the contract.
        hook: &'static str,
        /// Description of the mismatch.
        reason: String,
    },
    /// A structural error from flattening or space derivation.
    Space(SpaceError),
}

impl fmt::Display for EmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HorizonExceeded { step, horizon } => {
                write!(f, "step count {step} exceeds constant horizon {horizon}")
            }
            Self::HookKeyMismatch { hook, reason } => {
                write!(f, "{hook} hook changed the agent key set: {reason}")
            }
            Self::Space(e) => write!(f, "space error: {e}"),
        }
    }
}

impl Error for EmuError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Space(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SpaceError> for EmuError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

// ── EmulatedEnv ─────────────────────────────────────────────────

/// Wraps a native multi-agent environment behind a fixed-shape,
/// constant-population, constant-horizon surface.
pub struct EmulatedEnv<E: MultiAgentEnv> {
    env: E,
    config: EmulateConfig,
    feature_parser: Option<Box<dyn FeatureParser>>,
    reward_shaper: Option<Box<dyn RewardShaper>>,
    step_count: u64,
    dummy_obs: IndexMap<AgentId, Value>,
    obs_space_cache: IndexMap<AgentId, SpaceDesc>,
    atn_space_cache: IndexMap<AgentId, SpaceDesc>,
    possible_agents: Vec<AgentId>,
}

impl<E: MultiAgentEnv> EmulatedEnv<E> {
    /// Wrap `env` with the given emulation options.
    pub fn new(env: E, config: EmulateConfig) -> Self {
        let possible_agents = match config.const_num_agents {
            Some(n) => (1..=n as u32).map(AgentId).collect(),
            None => env.possible_agents(),
        };
        Self {
            env,
            config,
            feature_parser: None,
            reward_shaper: None,
            step_count: 0,
            dummy_obs: IndexMap::new(),
            obs_space_cache: IndexMap::new(),
            atn_space_cache: IndexMap::new(),
            possible_agents,
        }
    }

    /// Install a feature-parser hook.
    pub fn with_feature_parser(mut self, parser: Box<dyn FeatureParser>) -> Self {
        self.feature_parser = Some(parser);
        self
    }

    /// Install a reward-shaper hook.
    pub fn with_reward_shaper(mut self, shaper: Box<dyn RewardShaper>) -> Self {
        self.reward_shaper = Some(shaper);
        self
    }

    /// Steps taken since the last reset.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The declared agent-id population. Under constant-population
    /// emulation this is the contiguous range `1..=N`.
    pub fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    /// The wrapped native environment.
    pub fn native(&self) -> &E {
        &self.env
    }

    /// Mutable access to the wrapped native environment.
    pub fn native_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Begin a new episode.
    ///
    /// Runs the same pad/parse/flatten pipeline as [`step`](Self::step)
    /// so the first frame already has the constant batch shape. The
    /// dummy cache is retained across resets.
    pub fn reset(&mut self) -> Result<IndexMap<AgentId, Value>, EmuError> {
        self.step_count = 0;
        let mut obs = self.env.reset();

        if let Some(n) = self.config.const_num_agents {
            self.ensure_population_dummies(n);
            for (agent, dummy) in &self.dummy_obs {
                if !obs.contains_key(agent) {
                    obs.insert(*agent, dummy.clone());
                }
            }
            self.possible_agents = (1..=n as u32).map(AgentId).collect();
        }

        if let Some(parser) = &self.feature_parser {
            obs = Self::checked_parse(parser.as_ref(), obs, self.step_count)?;
        }

        if self.config.flat_obs {
            for value in obs.values_mut() {
                *value = Value::array(ravel(value));
            }
        }

        Ok(obs)
    }

    /// Advance one emulated step.
    ///
    /// Pipeline: native step → constant-population padding → feature
    /// parsing → reward shaping → per-agent flattening → horizon and
    /// no-agents-alive termination.
    ///
    /// # Errors
    ///
    /// [`EmuError::HorizonExceeded`] if the step count passes the
    /// declared horizon (fatal invariant violation), or
    /// [`EmuError::HookKeyMismatch`] if a hook breaks its key contract.
    pub fn step(&mut self, actions: &IndexMap<AgentId, Vec<i32>>) -> Result<FrameMap, EmuError> {
        let native = self.env.step(actions);
        self.step_count += 1;

        let agents_alive = !native.obs.is_empty();
        let mut frames = merge_native(native);

        if let Some(n) = self.config.const_num_agents {
            self.ensure_population_dummies(n);
            pad_to_population(&self.dummy_obs, &mut frames);
            self.possible_agents = (1..=n as u32).map(AgentId).collect();
        }

        self.apply_feature_parser(&mut frames)?;
        self.apply_reward_shaper(&mut frames)?;

        if self.config.flat_obs {
            for frame in frames.values_mut() {
                frame.obs = Value::array(ravel(&frame.obs));
            }
        }

        if let Some(horizon) = self.config.const_horizon {
            if self.step_count > horizon {
                return Err(EmuError::HorizonExceeded {
                    step: self.step_count,
                    horizon,
                });
            }
            if self.step_count == horizon {
                force_terminal(&mut frames);
            }
        }

        if !agents_alive {
            force_terminal(&mut frames);
        }

        Ok(frames)
    }

    /// The emulated observation space declaration for one agent.
    ///
    /// Lazily derived from a zeroed sample pushed through the same
    /// parser/flatten pipeline `step` uses, so the declaration stays
    /// numerically consistent with what `step` emits. Cached per agent.
    pub fn observation_space(&mut self, agent: AgentId) -> Result<SpaceDesc, EmuError> {
        if let Some(desc) = self.obs_space_cache.get(&agent) {
            return Ok(desc.clone());
        }

        let mut dummy = self.dummy_for(agent).clone();
        if let Some(parser) = &self.feature_parser {
            let mut input = IndexMap::new();
            input.insert(agent, dummy);
            let mut parsed = Self::checked_parse(parser.as_ref(), input, self.step_count)?;
            dummy = parsed
                .swap_remove(&agent)
                .ok_or_else(|| EmuError::HookKeyMismatch {
                    hook: "feature parser",
                    reason: format!("agent {agent} missing from parsed sample"),
                })?;
        }

        let desc = if self.config.flat_obs {
            SpaceDesc::boxed([ravel(&dummy).len()])
        } else {
            self.structured_observation_space(agent)
        };
        self.obs_space_cache.insert(agent, desc.clone());
        Ok(desc)
    }

    /// The structured (pre-flattening) observation space: the feature
    /// parser's declared spec when one is installed and declares one,
    /// else the native space.
    pub fn structured_observation_space(&self, agent: AgentId) -> SpaceDesc {
        if let Some(parser) = &self.feature_parser {
            if let Some(spec) = parser.spec() {
                return spec;
            }
        }
        self.env.observation_space(agent)
    }

    /// The emulated action space declaration for one agent: the native
    /// structured space packed into a flat `MultiDiscrete` when flat
    /// actions are enabled. Cached per agent.
    pub fn action_space(&mut self, agent: AgentId) -> Result<SpaceDesc, EmuError> {
        if let Some(desc) = self.atn_space_cache.get(&agent) {
            return Ok(desc.clone());
        }
        let native = self.env.action_space(agent);
        let desc = if self.config.flat_atn {
            packed_action_space(&native)?
        } else {
            native
        };
        self.atn_space_cache.insert(agent, desc.clone());
        Ok(desc)
    }

    /// Materialize dummies for the declared population `1..=n`.
    fn ensure_population_dummies(&mut self, n: usize) {
        for i in 1..=n as u32 {
            let agent = AgentId(i);
            if !self.dummy_obs.contains_key(&agent) {
                let dummy = self.env.observation_space(agent).zero_value();
                self.dummy_obs.insert(agent, dummy);
            }
        }
    }

    /// The cached dummy for one agent, created on first encounter.
    fn dummy_for(&mut self, agent: AgentId) -> &Value {
        if !self.dummy_obs.contains_key(&agent) {
            let dummy = self.env.observation_space(agent).zero_value();
            self.dummy_obs.insert(agent, dummy);
        }
        &self.dummy_obs[&agent]
    }

    fn apply_feature_parser(&self, frames: &mut FrameMap) -> Result<(), EmuError> {
        let Some(parser) = &self.feature_parser else {
            return Ok(());
        };
        let obs: IndexMap<AgentId, Value> = frames
            .iter_mut()
            .map(|(agent, frame)| (*agent, std::mem::take(&mut frame.obs)))
            .collect();
        let mut parsed = Self::checked_parse(parser.as_ref(), obs, self.step_count)?;
        for (agent, frame) in frames.iter_mut() {
            frame.obs = parsed
                .swap_remove(agent)
                .ok_or_else(|| EmuError::HookKeyMismatch {
                    hook: "feature parser",
                    reason: format!("agent {agent} missing from output"),
                })?;
        }
        Ok(())
    }

    fn apply_reward_shaper(&self, frames: &mut FrameMap) -> Result<(), EmuError> {
        let Some(shaper) = &self.reward_shaper else {
            return Ok(());
        };
        let rewards: IndexMap<AgentId, f32> = frames
            .iter()
            .map(|(agent, frame)| (*agent, frame.reward))
            .collect();
        let mut shaped = shaper.shape(rewards, self.step_count);
        if shaped.len() != frames.len() {
            return Err(EmuError::HookKeyMismatch {
                hook: "reward shaper",
                reason: format!("got {} rewards for {} agents", shaped.len(), frames.len()),
            });
        }
        for (agent, frame) in frames.iter_mut() {
            frame.reward = shaped
                .swap_remove(agent)
                .ok_or_else(|| EmuError::HookKeyMismatch {
                    hook: "reward shaper",
                    reason: format!("agent {agent} missing from output"),
                })?;
        }
        Ok(())
    }

    fn checked_parse(
        parser: &dyn FeatureParser,
        obs: IndexMap<AgentId, Value>,
        step: u64,
    ) -> Result<IndexMap<AgentId, Value>, EmuError> {
        let input_len = obs.len();
        let parsed = parser.parse(obs, step);
        if parsed.len() != input_len {
            return Err(EmuError::HookKeyMismatch {
                hook: "feature parser",
                reason: format!("got {} observations for {} agents", parsed.len(), input_len),
            });
        }
        Ok(parsed)
    }
}

/// Zip a native step's four maps into combined per-agent frames,
/// ordered by the observation map.
fn merge_native(native: crate::env::NativeStep) -> FrameMap {
    let crate::env::NativeStep {
        obs,
        mut rewards,
        mut dones,
        mut infos,
    } = native;
    obs.into_iter()
        .map(|(agent, value)| {
            let reward = rewards.swap_remove(&agent).unwrap_or(0.0);
            let done = dones.swap_remove(&agent).unwrap_or(false);
            let info = infos.swap_remove(&agent).unwrap_or_default();
            (agent, AgentFrame::new(value, reward, done, info))
        })
        .collect()
}
