//! Error types for policy invocation and batch assembly.

use std::error::Error;
use std::fmt;

/// Errors from an external policy collaborator.
///
/// Returned by [`Policy::action_value`](crate::traits::Policy::action_value)
/// and [`PolicyLoader::load`](crate::traits::PolicyLoader::load). The pool
/// dispatcher wraps these with the name of the failing policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// The policy's forward pass failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The loader could not produce a policy for the requested name.
    LoadFailed {
        /// Name of the policy that failed to load.
        name: String,
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::LoadFailed { name, reason } => {
                write!(f, "failed to load policy '{name}': {reason}")
            }
        }
    }
}

impl Error for PolicyError {}

/// Errors from batch assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchError {
    /// A row handed to [`ObsBatch::from_rows`](crate::batch::ObsBatch::from_rows)
    /// has a different length than the first row.
    RowLengthMismatch {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        got: usize,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowLengthMismatch { row, expected, got } => {
                write!(f, "row {row} has {got} elements, expected {expected}")
            }
        }
    }
}

impl Error for BatchError {}
