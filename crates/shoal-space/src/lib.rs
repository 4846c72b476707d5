//! Nested space descriptions and structural flattening for Shoal.
//!
//! A [`SpaceDesc`] is an ordered tree of primitive value descriptors;
//! a [`Value`] is a tree of arrays mirroring one. This crate converts
//! between nested values and the fixed-shape 1-D arrays that batched
//! inference consumes, and derives packed (flat Box / MultiDiscrete)
//! space declarations for downstream consumers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod flat;
pub mod space;
pub mod value;

pub use error::SpaceError;
pub use flat::{
    flat_key, flatten, flatten_to_array, flatten_value, ravel, unflatten, unpack_batched,
    FlatKey, LeafColumn,
};
pub use space::{packed_action_space, packed_obs_space, Shape, SpaceDesc, PACKED_BOUND};
pub use value::Value;
