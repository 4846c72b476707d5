//! Weighted round-robin batch partitioning.
//!
//! Pure function from `(batch_size, weights)` to an assignment table,
//! computed once at pool construction and immutable thereafter.

use std::error::Error;
use std::fmt;

/// Configuration errors from assignment construction. All fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionError {
    /// The batch size is zero.
    ZeroBatchSize,
    /// No policy slots were declared.
    EmptyWeights,
    /// A sample weight is zero; every slot must receive rows.
    ZeroWeight {
        /// Index of the offending slot.
        slot: usize,
    },
    /// The batch size is not an exact multiple of the weight sum.
    IndivisibleBatch {
        /// Declared batch size.
        batch_size: usize,
        /// Sum of the sample weights.
        chunk_size: usize,
    },
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBatchSize => write!(f, "batch size must be positive"),
            Self::EmptyWeights => write!(f, "sample weights must be non-empty"),
            Self::ZeroWeight { slot } => {
                write!(f, "sample weight for slot {slot} must be positive")
            }
            Self::IndivisibleBatch {
                batch_size,
                chunk_size,
            } => write!(
                f,
                "batch size {batch_size} is not a multiple of total sample weight {chunk_size}"
            ),
        }
    }
}

impl Error for PartitionError {}

/// A deterministic mapping from policy slot to sorted batch row
/// indices.
///
/// Built from a repeating pattern whose slot multiplicities equal the
/// weights (weights `[2, 1]` → pattern `[0, 0, 1]`), assigning row `i`
/// to `pattern[i % len]`. Rows for any slot are therefore spread
/// evenly across the batch rather than forming contiguous blocks —
/// which matters when downstream batch statistics are computed
/// globally. The slot lists partition `0..batch_size` exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleAssignment {
    rows: Vec<Vec<usize>>,
    batch_size: usize,
}

impl SampleAssignment {
    /// Compute the assignment for `batch_size` rows over one slot per
    /// weight.
    ///
    /// # Errors
    ///
    /// See [`PartitionError`]; all variants are fatal configuration
    /// errors surfaced immediately.
    pub fn new(batch_size: usize, weights: &[u32]) -> Result<Self, PartitionError> {
        if batch_size == 0 {
            return Err(PartitionError::ZeroBatchSize);
        }
        if weights.is_empty() {
            return Err(PartitionError::EmptyWeights);
        }
        if let Some(slot) = weights.iter().position(|&w| w == 0) {
            return Err(PartitionError::ZeroWeight { slot });
        }

        let chunk_size: usize = weights.iter().map(|&w| w as usize).sum();
        if batch_size % chunk_size != 0 {
            return Err(PartitionError::IndivisibleBatch {
                batch_size,
                chunk_size,
            });
        }

        let pattern: Vec<usize> = weights
            .iter()
            .enumerate()
            .flat_map(|(slot, &w)| std::iter::repeat(slot).take(w as usize))
            .collect();

        let mut rows = vec![Vec::new(); weights.len()];
        for idx in 0..batch_size {
            rows[pattern[idx % chunk_size]].push(idx);
        }

        Ok(Self { rows, batch_size })
    }

    /// Number of policy slots.
    pub fn num_slots(&self) -> usize {
        self.rows.len()
    }

    /// Total batch size the assignment was computed for.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sorted row indices assigned to one slot.
    pub fn rows_for(&self, slot: usize) -> &[usize] {
        &self.rows[slot]
    }

    /// Iterate slot row lists in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equal_weights_interleave() {
        let a = SampleAssignment::new(4, &[1, 1]).unwrap();
        assert_eq!(a.rows_for(0), &[0, 2]);
        assert_eq!(a.rows_for(1), &[1, 3]);
    }

    #[test]
    fn weighted_pattern_repeats() {
        let a = SampleAssignment::new(6, &[2, 1]).unwrap();
        // Pattern [0, 0, 1] over rows 0..6.
        assert_eq!(a.rows_for(0), &[0, 1, 3, 4]);
        assert_eq!(a.rows_for(1), &[2, 5]);
    }

    #[test]
    fn indivisible_batch_is_config_error() {
        let err = SampleAssignment::new(10, &[2, 1]).unwrap_err();
        assert_eq!(
            err,
            PartitionError::IndivisibleBatch {
                batch_size: 10,
                chunk_size: 3
            }
        );
    }

    #[test]
    fn zero_weight_rejected() {
        let err = SampleAssignment::new(4, &[1, 0]).unwrap_err();
        assert_eq!(err, PartitionError::ZeroWeight { slot: 1 });
    }

    #[test]
    fn empty_weights_rejected() {
        assert_eq!(
            SampleAssignment::new(4, &[]).unwrap_err(),
            PartitionError::EmptyWeights
        );
    }

    #[test]
    fn zero_batch_rejected() {
        assert_eq!(
            SampleAssignment::new(0, &[1]).unwrap_err(),
            PartitionError::ZeroBatchSize
        );
    }

    proptest! {
        // Weights [2, 1, 1] over batch 4k: slot lists are pairwise
        // disjoint and their union is exactly 0..4k.
        #[test]
        fn partition_is_exact(k in 1usize..32) {
            let batch = 4 * k;
            let a = SampleAssignment::new(batch, &[2, 1, 1]).unwrap();

            let mut seen = vec![false; batch];
            for slot in 0..a.num_slots() {
                for &idx in a.rows_for(slot) {
                    prop_assert!(!seen[idx], "row {} assigned twice", idx);
                    seen[idx] = true;
                }
            }
            prop_assert!(seen.iter().all(|&s| s));
        }

        #[test]
        fn row_counts_proportional_to_weights(k in 1usize..16) {
            let weights = [3u32, 1];
            let batch = 4 * k;
            let a = SampleAssignment::new(batch, &weights).unwrap();
            prop_assert_eq!(a.rows_for(0).len(), 3 * k);
            prop_assert_eq!(a.rows_for(1).len(), k);
        }

        #[test]
        fn rows_are_sorted(k in 1usize..16) {
            let a = SampleAssignment::new(3 * k, &[2, 1]).unwrap();
            for slot_rows in a.iter() {
                prop_assert!(slot_rows.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
