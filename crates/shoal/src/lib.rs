//! Shoal: the boundary layer between a multi-agent environment and a
//! pool of learned policies.
//!
//! This is the top-level facade crate re-exporting the public API from
//! all Shoal sub-crates. For most users, adding `shoal` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use shoal::prelude::*;
//!
//! // Weights [2, 1] split a 6-row batch round-robin within weight:
//! // rows are interleaved, not contiguous blocks.
//! let assignment = SampleAssignment::new(6, &[2, 1]).unwrap();
//! assert_eq!(assignment.rows_for(0), &[0, 1, 3, 4]);
//! assert_eq!(assignment.rows_for(1), &[2, 5]);
//!
//! // A nested observation round-trips exactly through the flattener.
//! let desc = SpaceDesc::dict([
//!     ("pos", SpaceDesc::boxed([2usize])),
//!     ("inv", SpaceDesc::dict([("gold", SpaceDesc::boxed([1usize]))])),
//! ]);
//! let value = Value::dict([
//!     ("pos", Value::array([1.0, 2.0])),
//!     ("inv", Value::dict([("gold", Value::scalar(5.0))])),
//! ]);
//! let flat = shoal::space::flatten_to_array(&value, &desc).unwrap();
//! assert_eq!(flat, vec![1.0, 2.0, 5.0]);
//! assert_eq!(shoal::space::unflatten(&flat, &desc).unwrap(), value);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `shoal-core` | Ids, batch tensors, policy traits |
//! | [`space`] | `shoal-space` | Space descriptions, flatten/unflatten |
//! | [`emu`] | `shoal-emu` | Emulated environment wrapper |
//! | [`pool`] | `shoal-pool` | Sample assignment, policy pool |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core ids, batch tensors, and policy traits (`shoal-core`).
pub mod types {
    pub use shoal_core::*;
}

/// Space descriptions and structural flattening (`shoal-space`).
pub mod space {
    pub use shoal_space::*;
}

/// Emulated environment wrapper (`shoal-emu`).
pub mod emu {
    pub use shoal_emu::*;
}

/// Sample assignment and policy-pool dispatch (`shoal-pool`).
pub mod pool {
    pub use shoal_pool::*;
}

/// The most commonly used types, re-exported for glob import.
pub mod prelude {
    pub use shoal_core::{
        ActionBatch, AgentId, Info, ObsBatch, Policy, PolicyHandle, PolicyLoader, PolicyOutput,
        PolicySelector, RecurrentState,
    };
    pub use shoal_emu::{
        EmuError, EmulateConfig, EmulatedEnv, FeatureParser, MultiAgentEnv, RewardShaper,
    };
    pub use shoal_pool::{PolicyForward, PolicyPool, PoolError, SampleAssignment};
    pub use shoal_space::{SpaceDesc, Value};
}
