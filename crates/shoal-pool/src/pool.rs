//! The policy pool dispatcher.
//!
//! One forward pass per active policy over its assigned rows, merged
//! into a single batch-ordered action tensor. Dispatch is synchronous
//! and single-threaded: each policy runs to completion in active-slot
//! order, and the sample assignment and active set are never mutated
//! mid-dispatch (the active set is replaced wholesale on rotation).

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use shoal_core::{
    ActionBatch, Info, ObsBatch, PolicyError, PolicyHandle, PolicyLoader, PolicySelector,
    RecurrentState,
};

use crate::partition::{PartitionError, SampleAssignment};

// ── Error type ──────────────────────────────────────────────────

/// Errors from pool construction, dispatch, or rotation.
#[derive(Debug)]
pub enum PoolError {
    /// Assignment construction failed (fatal configuration error).
    Partition(PartitionError),
    /// `forward` or `update_scores` called before an active set was
    /// installed.
    NoActivePolicies,
    /// The requested active count does not match the pool's slot count
    /// (one slot per sample weight, fixed at construction).
    ActiveCountMismatch {
        /// Slot count fixed at pool construction.
        expected: usize,
        /// Requested total active count.
        got: usize,
    },
    /// More required policies than active slots.
    RequiredExceedsTotal {
        /// Number of required policy names.
        required: usize,
        /// Total active count.
        total: usize,
    },
    /// The external selector violated its contract.
    SelectorContract {
        /// Description of the violation.
        reason: String,
    },
    /// A batch argument does not match the pool's batch size.
    BatchSizeMismatch {
        /// Batch size fixed at pool construction.
        expected: usize,
        /// Rows in the offending argument.
        got: usize,
    },
    /// A policy returned output whose shape does not match its
    /// assigned sub-batch.
    OutputShape {
        /// Name of the offending policy.
        policy: String,
        /// Description of the mismatch.
        reason: String,
    },
    /// A policy's forward pass or load failed.
    Policy {
        /// Name of the failing policy.
        name: String,
        /// The underlying policy error.
        source: PolicyError,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partition(e) => write!(f, "partition error: {e}"),
            Self::NoActivePolicies => write!(f, "no active policies installed"),
            Self::ActiveCountMismatch { expected, got } => write!(
                f,
                "requested {got} active policies, pool has {expected} slots"
            ),
            Self::RequiredExceedsTotal { required, total } => {
                write!(f, "{required} required policies exceed {total} active slots")
            }
            Self::SelectorContract { reason } => {
                write!(f, "policy selector violated its contract: {reason}")
            }
            Self::BatchSizeMismatch { expected, got } => {
                write!(f, "argument has {got} rows, pool batch size is {expected}")
            }
            Self::OutputShape { policy, reason } => {
                write!(f, "policy '{policy}' output shape mismatch: {reason}")
            }
            Self::Policy { name, source } => write!(f, "policy '{name}': {source}"),
        }
    }
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Partition(e) => Some(e),
            Self::Policy { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PartitionError> for PoolError {
    fn from(e: PartitionError) -> Self {
        Self::Partition(e)
    }
}

// ── Per-policy dispatch result ──────────────────────────────────

/// One active policy's contribution to a dispatched batch.
#[derive(Clone, Debug)]
pub struct PolicyForward {
    /// Policy name.
    pub name: String,
    /// Batch row indices this policy produced actions for.
    pub rows: Vec<usize>,
    /// Actions for those rows, in row-index order.
    pub actions: ActionBatch,
    /// Log-probabilities per row.
    pub log_probs: Vec<f32>,
    /// Entropy per row.
    pub entropy: Vec<f32>,
    /// Value estimates per row.
    pub values: Vec<f32>,
}

// ── PolicyPool ──────────────────────────────────────────────────

/// A pool of policies collectively processing one observation batch.
///
/// The batch is split across active policies by the sample weights
/// fixed at construction. Rotation replaces the active set wholesale;
/// loaded-but-inactive handles are cached by name and reused instead
/// of reloaded.
pub struct PolicyPool {
    assignment: SampleAssignment,
    active: Vec<PolicyHandle>,
    loaded: IndexMap<String, PolicyHandle>,
    scores: IndexMap<String, Vec<f64>>,
    num_scores: usize,
}

impl PolicyPool {
    /// Create a pool for `batch_size` rows with one slot per weight.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Partition`] if the weights and batch size
    /// do not form a valid assignment.
    pub fn new(batch_size: usize, weights: &[u32]) -> Result<Self, PoolError> {
        Ok(Self {
            assignment: SampleAssignment::new(batch_size, weights)?,
            active: Vec::new(),
            loaded: IndexMap::new(),
            scores: IndexMap::new(),
            num_scores: 0,
        })
    }

    /// The immutable row assignment computed at construction.
    pub fn assignment(&self) -> &SampleAssignment {
        &self.assignment
    }

    /// Names of the active policies, in slot order.
    pub fn active_names(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|h| h.borrow().name().to_string())
            .collect()
    }

    /// Forward one batch through the active policies.
    ///
    /// Each policy receives only its assigned rows (and, when `state`
    /// or `dones` are given, the matching row slices); its actions are
    /// scattered back into a full-size batch at the same indices, and
    /// any returned recurrent state is written back into `state` so
    /// each policy's hidden state evolves independently in the shared
    /// buffer. Every row receives exactly one action, from exactly the
    /// policy it was assigned to.
    ///
    /// # Errors
    ///
    /// No partial-result contract: the first failing policy aborts the
    /// dispatch with [`PoolError::Policy`].
    pub fn forward(
        &mut self,
        obs: &ObsBatch,
        mut state: Option<&mut RecurrentState>,
        dones: Option<&[bool]>,
    ) -> Result<(ActionBatch, Vec<PolicyForward>), PoolError> {
        let batch_size = self.assignment.batch_size();
        if self.active.len() != self.assignment.num_slots() {
            return Err(PoolError::NoActivePolicies);
        }
        if obs.rows() != batch_size {
            return Err(PoolError::BatchSizeMismatch {
                expected: batch_size,
                got: obs.rows(),
            });
        }
        if let Some(s) = state.as_deref() {
            if s.rows() != batch_size {
                return Err(PoolError::BatchSizeMismatch {
                    expected: batch_size,
                    got: s.rows(),
                });
            }
        }
        if let Some(d) = dones {
            if d.len() != batch_size {
                return Err(PoolError::BatchSizeMismatch {
                    expected: batch_size,
                    got: d.len(),
                });
            }
        }

        let mut all_actions: Option<ActionBatch> = None;
        let mut results = Vec::with_capacity(self.active.len());

        for (slot, handle) in self.active.iter().enumerate() {
            let rows = self.assignment.rows_for(slot);
            let sub_obs = obs.gather(rows);
            let sub_state = state.as_deref().map(|s| s.gather(rows));
            let sub_dones: Option<Vec<bool>> =
                dones.map(|d| rows.iter().map(|&i| d[i]).collect());

            let mut policy = handle.borrow_mut();
            let name = policy.name().to_string();
            let out = policy
                .action_value(&sub_obs, sub_state, sub_dones.as_deref())
                .map_err(|source| PoolError::Policy {
                    name: name.clone(),
                    source,
                })?;
            drop(policy);

            if out.actions.rows() != rows.len() {
                return Err(PoolError::OutputShape {
                    policy: name,
                    reason: format!(
                        "{} action rows for {} assigned rows",
                        out.actions.rows(),
                        rows.len()
                    ),
                });
            }
            if out.log_probs.len() != rows.len() || out.values.len() != rows.len() {
                return Err(PoolError::OutputShape {
                    policy: name,
                    reason: format!(
                        "{} log-probs / {} values for {} assigned rows",
                        out.log_probs.len(),
                        out.values.len(),
                        rows.len()
                    ),
                });
            }

            let merged = all_actions
                .get_or_insert_with(|| ActionBatch::zeros(batch_size, out.actions.width()));
            if out.actions.width() != merged.width() {
                return Err(PoolError::OutputShape {
                    policy: name,
                    reason: format!(
                        "action width {} differs from batch width {}",
                        out.actions.width(),
                        merged.width()
                    ),
                });
            }
            merged.scatter(rows, &out.actions);

            if let Some(new_state) = &out.state {
                if let Some(shared) = state.as_deref_mut() {
                    if new_state.rows() != rows.len() || new_state.width() != shared.width() {
                        return Err(PoolError::OutputShape {
                            policy: name,
                            reason: format!(
                                "returned state {}x{} for {} rows of width {}",
                                new_state.rows(),
                                new_state.width(),
                                rows.len(),
                                shared.width()
                            ),
                        });
                    }
                    shared.scatter(rows, new_state);
                }
            }

            results.push(PolicyForward {
                name,
                rows: rows.to_vec(),
                actions: out.actions,
                log_probs: out.log_probs,
                entropy: out.entropy,
                values: out.values,
            });
        }

        let actions = all_actions.ok_or(PoolError::NoActivePolicies)?;
        Ok((actions, results))
    }

    /// Replace the active policy set.
    ///
    /// Required policies are always included (and thus never evicted by
    /// this call); the remaining slots are filled by the external
    /// selector, excluding the required names. Selected names are
    /// loaded only if not already cached; the cache is then replaced by
    /// the new ordered set.
    ///
    /// # Errors
    ///
    /// [`PoolError::ActiveCountMismatch`] if `total_active_count` does
    /// not equal the pool's slot count,
    /// [`PoolError::RequiredExceedsTotal`],
    /// [`PoolError::SelectorContract`] if the selector returns the
    /// wrong count, a duplicate, or an excluded name, and
    /// [`PoolError::Policy`] if a load fails.
    pub fn update_active_policies(
        &mut self,
        required: &[String],
        total_active_count: usize,
        loader: &mut dyn PolicyLoader,
        selector: &mut dyn PolicySelector,
    ) -> Result<(), PoolError> {
        let slots = self.assignment.num_slots();
        if total_active_count != slots {
            return Err(PoolError::ActiveCountMismatch {
                expected: slots,
                got: total_active_count,
            });
        }
        if required.len() > total_active_count {
            return Err(PoolError::RequiredExceedsTotal {
                required: required.len(),
                total: total_active_count,
            });
        }

        let needed = total_active_count - required.len();
        let selected = selector.select(needed, required);
        if selected.len() != needed {
            return Err(PoolError::SelectorContract {
                reason: format!("returned {} names, asked for {needed}", selected.len()),
            });
        }

        let mut new_loaded: IndexMap<String, PolicyHandle> = IndexMap::new();
        for name in required.iter().chain(selected.iter()) {
            if new_loaded.contains_key(name) {
                return Err(PoolError::SelectorContract {
                    reason: format!("duplicate policy name '{name}'"),
                });
            }
            let handle = match self.loaded.get(name) {
                Some(handle) => Rc::clone(handle),
                None => loader.load(name).map_err(|source| PoolError::Policy {
                    name: name.clone(),
                    source,
                })?,
            };
            new_loaded.insert(name.clone(), handle);
        }

        // Atomic replacement: nothing observes a partially-updated set.
        self.active = new_loaded.values().map(Rc::clone).collect();
        self.loaded = new_loaded;
        Ok(())
    }

    /// Attribute per-row info entries to the policies that produced
    /// them.
    ///
    /// `infos` holds one entry per batch row, in row order. For every
    /// row whose info contains `info_key`, the value is appended to the
    /// producing policy's running score list. Returns the values
    /// attributed by this call, per policy.
    ///
    /// # Errors
    ///
    /// [`PoolError::NoActivePolicies`] before any rotation, or
    /// [`PoolError::BatchSizeMismatch`] if `infos` is not exactly one
    /// entry per batch row.
    pub fn update_scores(
        &mut self,
        infos: &[Info],
        info_key: &str,
    ) -> Result<IndexMap<String, Vec<f64>>, PoolError> {
        if self.active.len() != self.assignment.num_slots() {
            return Err(PoolError::NoActivePolicies);
        }
        if infos.len() != self.assignment.batch_size() {
            return Err(PoolError::BatchSizeMismatch {
                expected: self.assignment.batch_size(),
                got: infos.len(),
            });
        }

        let mut attributed: IndexMap<String, Vec<f64>> = IndexMap::new();
        for (slot, handle) in self.active.iter().enumerate() {
            let name = handle.borrow().name().to_string();
            for &row in self.assignment.rows_for(slot) {
                if let Some(&value) = infos[row].get(info_key) {
                    self.scores.entry(name.clone()).or_default().push(value);
                    attributed.entry(name.clone()).or_default().push(value);
                    self.num_scores += 1;
                }
            }
        }
        Ok(attributed)
    }

    /// Running score lists per policy, for external aggregation.
    pub fn scores(&self) -> &IndexMap<String, Vec<f64>> {
        &self.scores
    }

    /// Total number of scores recorded since the last drain.
    pub fn num_scores(&self) -> usize {
        self.num_scores
    }

    /// Drain the running scores, resetting the counter.
    pub fn take_scores(&mut self) -> IndexMap<String, Vec<f64>> {
        self.num_scores = 0;
        std::mem::take(&mut self.scores)
    }
}
