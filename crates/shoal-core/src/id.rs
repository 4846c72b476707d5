//! Strongly-typed identifiers.

use std::fmt;

/// Identifies one controllable agent within a multi-agent environment.
///
/// Agent ids are assigned by the native environment and are stable for
/// the lifetime of an episode. Under constant-population emulation the
/// declared population is the contiguous range `AgentId(1)..=AgentId(N)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
