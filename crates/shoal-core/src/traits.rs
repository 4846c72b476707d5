//! Capability traits at the policy seam.
//!
//! The pool dispatcher consumes policies, a selector, and a loader
//! through these minimal interfaces rather than referencing any model
//! implementation directly. Policy internals (network architecture,
//! training) live entirely behind [`Policy`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::batch::{ObsBatch, PolicyOutput, RecurrentState};
use crate::error::PolicyError;

/// Shared handle to a loaded policy.
///
/// Dispatch is single-threaded (one policy forward at a time, in
/// active-policy order), so `Rc<RefCell<_>>` is sufficient: the same
/// loaded policy can sit in the pool's cache and its active set
/// without reloading.
pub type PolicyHandle = Rc<RefCell<dyn Policy>>;

/// A stateful decision function mapping observations to actions.
///
/// Implementations must accept arbitrary row-count sub-batches: the
/// pool slices a full batch by sample assignment and forwards each
/// policy only its own rows.
pub trait Policy {
    /// Stable name identifying this policy in the pool.
    fn name(&self) -> &str;

    /// Run the action-value function over a sub-batch.
    ///
    /// `state` carries this sub-batch's slice of the shared recurrent
    /// state; a recurrent policy returns the updated slice in
    /// [`PolicyOutput::state`]. `dones` flags rows whose episode ended
    /// on the previous step (recurrent policies reset those rows).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ExecutionFailed`] if the forward pass
    /// fails. There is no partial-result contract: a failure aborts the
    /// whole dispatch.
    fn action_value(
        &mut self,
        obs: &ObsBatch,
        state: Option<RecurrentState>,
        dones: Option<&[bool]>,
    ) -> Result<PolicyOutput, PolicyError>;
}

/// External policy-selection capability.
///
/// The scoring/sampling algorithm behind `select` is not part of this
/// crate's contract; only the shape of the answer is.
pub trait PolicySelector {
    /// Choose `count` policy names, none of which appear in `exclude`
    /// and none duplicated. The pool validates this contract and
    /// reports a violation as an error rather than dispatching to a
    /// malformed active set.
    fn select(&mut self, count: usize, exclude: &[String]) -> Vec<String>;
}

/// External policy storage/loading capability.
pub trait PolicyLoader {
    /// Produce a handle for `name`. Idempotent for an already-resident
    /// name; the pool additionally caches handles it has already seen,
    /// so `load` is only invoked for names not currently cached.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::LoadFailed`] if no policy exists under
    /// `name` or materializing it fails.
    fn load(&mut self, name: &str) -> Result<PolicyHandle, PolicyError>;
}
