//! Nested value trees.

use indexmap::IndexMap;

use crate::space::Shape;

/// A tree of arrays mirroring a [`SpaceDesc`](crate::space::SpaceDesc).
///
/// A conforming value has the identical key structure to its
/// description, with leaves replaced by concrete arrays of the
/// declared shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Ordered mapping of named sub-values.
    Dict(IndexMap<String, Value>),
    /// A concrete leaf array.
    Array {
        /// Elements in row-major order.
        data: Vec<f32>,
        /// Array shape; `data.len()` equals the product of the dims.
        shape: Shape,
    },
}

impl Value {
    /// Convenience constructor for a `Dict` node preserving entry order.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A 1-D leaf array.
    pub fn array(data: impl Into<Vec<f32>>) -> Self {
        let data = data.into();
        let shape = smallvec::smallvec![data.len()];
        Self::Array { data, shape }
    }

    /// A single-element leaf.
    pub fn scalar(v: f32) -> Self {
        Self::Array {
            data: vec![v],
            shape: smallvec::smallvec![1],
        }
    }

    /// Whether this node is a leaf array.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// The leaf data, if this node is an array. Flat (emulated)
    /// observations are 1-D `Array` leaves, so batching code reaches
    /// their data through this accessor.
    pub fn as_array(&self) -> Option<&[f32]> {
        match self {
            Self::Array { data, .. } => Some(data),
            Self::Dict(_) => None,
        }
    }
}

impl Default for Value {
    /// An empty mapping. Used as a placeholder when a value is taken
    /// out of a frame for in-place transformation.
    fn default() -> Self {
        Self::Dict(IndexMap::new())
    }
}
