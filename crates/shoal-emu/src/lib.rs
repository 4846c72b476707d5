//! Structural emulation for multi-agent environments.
//!
//! [`EmulatedEnv`] wraps a native [`MultiAgentEnv`] and presents a
//! trainer-friendly surface: fixed-shape flat observations, flat
//! discretized action declarations, a constant agent population padded
//! with dummy entries, and a constant episode horizon. Optional
//! feature-parsing and reward-shaping hooks run inside the step
//! pipeline.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod env;
pub mod hooks;
pub mod population;
pub mod wrapper;

pub use env::{MultiAgentEnv, NativeStep};
pub use hooks::{FeatureParser, RewardShaper};
pub use population::{force_terminal, pad_to_population, AgentFrame, FrameMap};
pub use wrapper::{EmuError, EmulateConfig, EmulatedEnv};
