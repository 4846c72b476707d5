//! Structural error types for flatten/unflatten.

use std::error::Error;
use std::fmt;

/// Errors from structural conversion between nested values, space
/// descriptions, and flat arrays.
///
/// All variants indicate a programming or configuration mismatch, not
/// a transient condition; callers propagate them without retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceError {
    /// A value's key structure does not match its space description.
    StructureMismatch {
        /// Flat-key path (joined with `/`) where the mismatch occurred.
        path: String,
        /// Description of the mismatch.
        reason: String,
    },
    /// A leaf array's element count does not match the declared shape.
    LeafShapeMismatch {
        /// Flat-key path of the offending leaf.
        path: String,
        /// Element count declared by the space description.
        expected: usize,
        /// Element count found in the value.
        got: usize,
    },
    /// A flat array's total length does not match the description.
    LengthMismatch {
        /// Total element count declared by the space description.
        expected: usize,
        /// Length of the flat array.
        got: usize,
    },
    /// A leaf kind is unsupported by the requested packing.
    UnsupportedLeaf {
        /// Flat-key path of the offending leaf.
        path: String,
        /// Description of the restriction.
        reason: String,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructureMismatch { path, reason } => {
                write!(f, "structure mismatch at '{path}': {reason}")
            }
            Self::LeafShapeMismatch {
                path,
                expected,
                got,
            } => write!(
                f,
                "leaf '{path}' has {got} elements, description declares {expected}"
            ),
            Self::LengthMismatch { expected, got } => {
                write!(f, "flat array has {got} elements, description needs {expected}")
            }
            Self::UnsupportedLeaf { path, reason } => {
                write!(f, "unsupported leaf at '{path}': {reason}")
            }
        }
    }
}

impl Error for SpaceError {}
