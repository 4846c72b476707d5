//! Core types and traits for the Shoal policy-pool framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Shoal workspace:
//! agent identifiers, batched tensor types, the policy capability
//! traits, and their error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod error;
pub mod id;
pub mod traits;

pub use batch::{ActionBatch, Info, ObsBatch, PolicyOutput, RecurrentState};
pub use error::{BatchError, PolicyError};
pub use id::AgentId;
pub use traits::{Policy, PolicyHandle, PolicyLoader, PolicySelector};
