//! Row-major batched tensors shared between the emulation layer and
//! the policy pool.
//!
//! All three batch types store their data as a single contiguous
//! buffer indexed by row. The pool dispatcher slices rows out with
//! [`gather`](ObsBatch::gather) and writes results back with
//! [`scatter`](ActionBatch::scatter); within one dispatch every policy
//! touches a disjoint row set, so no synchronization is needed.

use indexmap::IndexMap;

use crate::error::BatchError;

/// Per-agent auxiliary information emitted by an environment step.
pub type Info = IndexMap<String, f64>;

/// A batch of flat observations, one row per batch slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ObsBatch {
    data: Vec<f32>,
    rows: usize,
    row_len: usize,
}

impl ObsBatch {
    /// Create a zero-filled batch of `rows` rows of `row_len` elements.
    pub fn zeros(rows: usize, row_len: usize) -> Self {
        Self {
            data: vec![0.0; rows * row_len],
            rows,
            row_len,
        }
    }

    /// Stack flat per-agent observations into a batch, one row each.
    ///
    /// Row order follows iteration order of `rows`, which for an
    /// `IndexMap` of agent frames is agent insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::RowLengthMismatch`] if the rows do not all
    /// have the same length. An empty iterator yields a 0×0 batch.
    pub fn from_rows<'a, I>(rows: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut data = Vec::new();
        let mut row_len = 0;
        let mut count = 0;
        for (i, row) in rows.into_iter().enumerate() {
            if i == 0 {
                row_len = row.len();
            } else if row.len() != row_len {
                return Err(BatchError::RowLengthMismatch {
                    row: i,
                    expected: row_len,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
            count += 1;
        }
        Ok(Self {
            data,
            rows: count,
            row_len,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Elements per row.
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    /// One row as a slice.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.row_len..(i + 1) * self.row_len]
    }

    /// The whole buffer, row-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Copy the given rows, in order, into a new sub-batch.
    ///
    /// Indices must be in range; this is an internal-invariant contract
    /// enforced by the caller (the pool validates batch sizes up front).
    pub fn gather(&self, idxs: &[usize]) -> Self {
        let mut data = Vec::with_capacity(idxs.len() * self.row_len);
        for &i in idxs {
            data.extend_from_slice(self.row(i));
        }
        Self {
            data,
            rows: idxs.len(),
            row_len: self.row_len,
        }
    }
}

/// A batch of flat discretized actions, one row per batch slot.
///
/// Each row holds `width` discrete choices (one per action-space leaf).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionBatch {
    data: Vec<i32>,
    rows: usize,
    width: usize,
}

impl ActionBatch {
    /// Create a zero-filled batch.
    pub fn zeros(rows: usize, width: usize) -> Self {
        Self {
            data: vec![0; rows * width],
            rows,
            width,
        }
    }

    /// Build a batch from row-major data. `data.len()` must equal
    /// `rows * width`; callers construct these from policy outputs
    /// where the shape is known.
    pub fn from_data(data: Vec<i32>, rows: usize, width: usize) -> Self {
        debug_assert_eq!(data.len(), rows * width);
        Self { data, rows, width }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Discrete choices per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// One row as a slice.
    pub fn row(&self, i: usize) -> &[i32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// The whole buffer, row-major.
    pub fn data(&self) -> &[i32] {
        &self.data
    }

    /// Write `sub`'s rows into this batch at the given row indices.
    ///
    /// `idxs.len()` must equal `sub.rows()` and the widths must match.
    pub fn scatter(&mut self, idxs: &[usize], sub: &ActionBatch) {
        debug_assert_eq!(idxs.len(), sub.rows);
        debug_assert_eq!(self.width, sub.width);
        for (k, &i) in idxs.iter().enumerate() {
            let dst = i * self.width;
            self.data[dst..dst + self.width].copy_from_slice(sub.row(k));
        }
    }
}

/// Recurrent (LSTM-style) hidden state for a batch, one row per slot.
///
/// The pool shares one physical state buffer across all policies and
/// hands each policy only its own rows, so each policy's hidden state
/// evolves independently.
#[derive(Clone, Debug, PartialEq)]
pub struct RecurrentState {
    hidden: Vec<f32>,
    cell: Vec<f32>,
    rows: usize,
    width: usize,
}

impl RecurrentState {
    /// Create a zero-initialized state for `rows` batch slots.
    pub fn zeros(rows: usize, width: usize) -> Self {
        Self {
            hidden: vec![0.0; rows * width],
            cell: vec![0.0; rows * width],
            rows,
            width,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// State width per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Hidden-state row.
    pub fn hidden_row(&self, i: usize) -> &[f32] {
        &self.hidden[i * self.width..(i + 1) * self.width]
    }

    /// Cell-state row.
    pub fn cell_row(&self, i: usize) -> &[f32] {
        &self.cell[i * self.width..(i + 1) * self.width]
    }

    /// Mutable hidden-state row.
    pub fn hidden_row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.hidden[i * self.width..(i + 1) * self.width]
    }

    /// Mutable cell-state row.
    pub fn cell_row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.cell[i * self.width..(i + 1) * self.width]
    }

    /// Copy the given rows, in order, into a new sub-state.
    pub fn gather(&self, idxs: &[usize]) -> Self {
        let mut out = Self::zeros(idxs.len(), self.width);
        for (k, &i) in idxs.iter().enumerate() {
            out.hidden_row_mut(k).copy_from_slice(self.hidden_row(i));
            out.cell_row_mut(k).copy_from_slice(self.cell_row(i));
        }
        out
    }

    /// Write `sub`'s rows back into this state at the given row indices.
    pub fn scatter(&mut self, idxs: &[usize], sub: &RecurrentState) {
        debug_assert_eq!(idxs.len(), sub.rows);
        debug_assert_eq!(self.width, sub.width);
        for (k, &i) in idxs.iter().enumerate() {
            let dst = i * self.width;
            self.hidden[dst..dst + self.width].copy_from_slice(sub.hidden_row(k));
            self.cell[dst..dst + self.width].copy_from_slice(sub.cell_row(k));
        }
    }
}

/// Everything a policy's action-value function returns for a sub-batch.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOutput {
    /// Chosen actions, one row per input row.
    pub actions: ActionBatch,
    /// Log-probability of each chosen action row.
    pub log_probs: Vec<f32>,
    /// Policy entropy per row.
    pub entropy: Vec<f32>,
    /// Value estimates per row.
    pub values: Vec<f32>,
    /// Updated recurrent state for the sub-batch, if the policy is
    /// recurrent and was handed state.
    pub state: Option<RecurrentState>,
}
