//! Space description trees.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::SpaceError;
use crate::flat::{flat_key, flatten};
use crate::value::Value;

/// Leaf array shape. Inline capacity covers typical observation ranks.
pub type Shape = SmallVec<[usize; 4]>;

/// Bound used for packed observation Box declarations.
///
/// Flattening loses per-leaf bounds, so the packed declaration uses a
/// single wide symmetric range, matching what trainers expect from an
/// emulated flat observation space.
pub const PACKED_BOUND: f32 = 1_048_576.0; // 2^20

/// A tree describing a nested observation or action space.
///
/// Internal nodes are ordered-key mappings; leaves are primitive value
/// descriptors. Traversal order is insertion order of keys at every
/// level, and is stable across calls — the flat layout derived from a
/// description is fixed for that description.
#[derive(Clone, Debug, PartialEq)]
pub enum SpaceDesc {
    /// Ordered mapping of named sub-spaces.
    Dict(IndexMap<String, SpaceDesc>),
    /// Bounded continuous array of the given shape.
    Box {
        /// Array shape; element count is the product of the dims.
        shape: Shape,
        /// Lower bound for every element.
        low: f32,
        /// Upper bound for every element.
        high: f32,
    },
    /// A single k-way discrete choice.
    Discrete {
        /// Number of choices.
        n: u32,
    },
    /// A fixed-length vector of independent discrete choices.
    ///
    /// Produced by [`packed_action_space`]; one cardinality per leaf of
    /// the structured action space.
    MultiDiscrete(Vec<u32>),
}

impl SpaceDesc {
    /// Convenience constructor for a `Dict` node preserving entry order.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, SpaceDesc)>,
        K: Into<String>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A `Box` leaf with the given shape and symmetric packed bounds.
    pub fn boxed(shape: impl IntoIterator<Item = usize>) -> Self {
        Self::Box {
            shape: shape.into_iter().collect(),
            low: -PACKED_BOUND,
            high: PACKED_BOUND,
        }
    }

    /// Whether this node is a leaf (anything but a `Dict`).
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Dict(_))
    }

    /// Element count of a leaf. `Dict` nodes have no single leaf size;
    /// use [`flat_len`](Self::flat_len) for totals.
    pub fn leaf_len(&self) -> usize {
        match self {
            Self::Dict(_) => 0,
            Self::Box { shape, .. } => shape.iter().product(),
            Self::Discrete { .. } => 1,
            Self::MultiDiscrete(ns) => ns.len(),
        }
    }

    /// Total flattened element count: the sum of every leaf's size.
    ///
    /// This sizes the flat array a conforming value packs into. An
    /// empty mapping has length zero, which is valid.
    pub fn flat_len(&self) -> usize {
        match self {
            Self::Dict(entries) => entries.values().map(SpaceDesc::flat_len).sum(),
            leaf => leaf.leaf_len(),
        }
    }

    /// Build a zeroed [`Value`] conforming to this description.
    ///
    /// Used to materialize dummy observations for absent agents and to
    /// derive packed space declarations from a sample.
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Dict(entries) => Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.zero_value()))
                    .collect(),
            ),
            leaf => {
                let shape: Shape = match leaf {
                    Self::Box { shape, .. } => shape.clone(),
                    _ => smallvec::smallvec![leaf.leaf_len()],
                };
                Value::Array {
                    data: vec![0.0; leaf.leaf_len()],
                    shape,
                }
            }
        }
    }
}

/// Derive the fixed-size flat observation declaration for a description:
/// a 1-D `Box` of length [`flat_len`](SpaceDesc::flat_len) with
/// [`PACKED_BOUND`] bounds.
pub fn packed_obs_space(desc: &SpaceDesc) -> SpaceDesc {
    SpaceDesc::Box {
        shape: smallvec::smallvec![desc.flat_len()],
        low: -PACKED_BOUND,
        high: PACKED_BOUND,
    }
}

/// Derive the flat discretized action declaration for a description:
/// one discrete cardinality per leaf, in flat-key order.
///
/// # Errors
///
/// Returns [`SpaceError::UnsupportedLeaf`] if any leaf is not
/// `Discrete` — continuous leaves cannot be packed into a
/// `MultiDiscrete` declaration.
pub fn packed_action_space(desc: &SpaceDesc) -> Result<SpaceDesc, SpaceError> {
    let mut lens = Vec::new();
    for (key, leaf) in flatten(desc) {
        match leaf {
            SpaceDesc::Discrete { n } => lens.push(*n),
            other => {
                return Err(SpaceError::UnsupportedLeaf {
                    path: flat_key::display(&key),
                    reason: format!("expected Discrete, found {other:?}"),
                })
            }
        }
    }
    Ok(SpaceDesc::MultiDiscrete(lens))
}
