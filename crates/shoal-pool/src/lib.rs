//! Policy-pool dispatch for batched multi-agent inference.
//!
//! A [`SampleAssignment`] deterministically partitions batch rows
//! across policy slots by integer weight; a [`PolicyPool`] forwards
//! each active policy its own rows (carrying per-policy recurrent
//! state slices), reassembles a unified action batch, and rotates the
//! active set through external selector/loader capabilities.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod partition;
pub mod pool;

pub use partition::{PartitionError, SampleAssignment};
pub use pool::{PolicyForward, PolicyPool, PoolError};
