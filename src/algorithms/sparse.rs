//! Sparse response matrix over multi-dimensional spaces.
//!
//! ## Purpose
//!
//! Realistic multi-dimensional response matrices are mostly zeros: a true
//! cell only migrates into a small neighborhood of observed cells. The
//! [`ResponseMatrix`] stores, for every unfolded cell, the list of observed
//! cells it reaches together with the transition probabilities.
//!
//! ## Design notes
//!
//! * **Column lists**: One `(indices, probabilities)` list per unfolded cell,
//!   indexed by the row-major linear index of the cell.
//! * **Deferred validation**: Cells can be filled freely; [`ResponseMatrix::is_valid`]
//!   and [`LinearOperator::validate`] report structural problems, and the
//!   unfolding base refuses invalid matrices.
//!
//! ## Invariants
//!
//! * In a valid matrix every list has strictly increasing observed indices
//!   below `observed_len()` and non-negative probabilities, and at least one
//!   probability in the whole matrix is positive.
//!
//! ## Non-goals
//!
//! * General sparse algebra; only the operations unfolding needs are provided.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};
#[cfg(feature = "std")]
use std::{format, vec::Vec};

// Internal dependencies
use crate::algorithms::response::LinearOperator;
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::to_f64;
use crate::primitives::shape::{format_shape, shape_length, validate_shape};

// ============================================================================
// Sparse Cell
// ============================================================================

/// Observed cells reached from one unfolded cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseCell<T> {
    /// Observed-space linear indices, strictly increasing.
    pub indices: Vec<usize>,

    /// Transition probabilities matching `indices`.
    pub probabilities: Vec<T>,
}

impl<T> Default for SparseCell<T> {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            probabilities: Vec::new(),
        }
    }
}

impl<T: FloatLinalg> SparseCell<T> {
    /// Sum of the transition probabilities.
    pub fn efficiency(&self) -> T {
        self.probabilities.iter().fold(T::zero(), |acc, &p| acc + p)
    }
}

// ============================================================================
// Response Matrix
// ============================================================================

/// Sparse response matrix with unfolded and observed array shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix<T> {
    unfolded_shape: Vec<usize>,
    observed_shape: Vec<usize>,
    cells: Vec<SparseCell<T>>,
}

impl<T: FloatLinalg> ResponseMatrix<T> {
    /// Empty response matrix for the given shapes.
    pub fn new(
        unfolded_shape: Vec<usize>,
        observed_shape: Vec<usize>,
    ) -> Result<Self, UnfoldError> {
        validate_shape(&unfolded_shape, "unfolded space")?;
        validate_shape(&observed_shape, "observed space")?;
        let n = shape_length(&unfolded_shape);
        Ok(Self {
            unfolded_shape,
            observed_shape,
            cells: vec![SparseCell::default(); n],
        })
    }

    /// Sparse copy of a dense `n_observed x n_unfolded` matrix.
    pub fn from_dense(
        unfolded_shape: Vec<usize>,
        observed_shape: Vec<usize>,
        dense: &Matrix<T>,
    ) -> Result<Self, UnfoldError> {
        let mut out = Self::new(unfolded_shape, observed_shape)?;
        out.sparsify(dense)?;
        Ok(out)
    }

    /// Replace the contents with the non-zero entries of `dense`.
    pub fn sparsify(&mut self, dense: &Matrix<T>) -> Result<(), UnfoldError> {
        let n_obs = self.observed_len();
        let n_unf = self.unfolded_len();
        if dense.n_rows() != n_obs || dense.n_cols() != n_unf {
            return Err(UnfoldError::ShapeMismatch {
                what: "dense response matrix",
                expected: format!("{n_obs}x{n_unf}"),
                got: format!("{}x{}", dense.n_rows(), dense.n_cols()),
            });
        }
        for (col, cell) in self.cells.iter_mut().enumerate() {
            cell.indices.clear();
            cell.probabilities.clear();
            for row in 0..n_obs {
                let v = dense[(row, col)];
                if v != T::zero() {
                    cell.indices.push(row);
                    cell.probabilities.push(v);
                }
            }
        }
        Ok(())
    }

    /// Set the observed cells reached from unfolded cell `i`.
    pub fn set_cell(
        &mut self,
        i: usize,
        indices: Vec<usize>,
        probabilities: Vec<T>,
    ) -> Result<(), UnfoldError> {
        let n = self.cells.len();
        let cell = self.cells.get_mut(i).ok_or(UnfoldError::DimensionMismatch {
            what: "unfolded cell index",
            expected: n,
            got: i,
        })?;
        cell.indices = indices;
        cell.probabilities = probabilities;
        Ok(())
    }

    /// The list for unfolded cell `i`.
    pub fn cell(&self, i: usize) -> &SparseCell<T> {
        &self.cells[i]
    }

    /// True if the matrix passes [`LinearOperator::validate`].
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Transposed response: observed and unfolded roles exchanged.
    #[allow(non_snake_case)]
    pub fn T(&self) -> Self {
        let mut cells = vec![SparseCell::default(); self.observed_len()];
        for (i, cell) in self.cells.iter().enumerate() {
            for (&idx, &p) in cell.indices.iter().zip(&cell.probabilities) {
                if let Some(target) = cells.get_mut(idx) {
                    target.indices.push(i);
                    target.probabilities.push(p);
                }
            }
        }
        Self {
            unfolded_shape: self.observed_shape.clone(),
            observed_shape: self.unfolded_shape.clone(),
            cells,
        }
    }

    /// Release excess capacity held by the cell lists.
    pub fn shrink_to_fit(&mut self) {
        for cell in &mut self.cells {
            cell.indices.shrink_to_fit();
            cell.probabilities.shrink_to_fit();
        }
    }

    /// Number of stored entries.
    pub fn n_entries(&self) -> usize {
        self.cells.iter().map(|c| c.indices.len()).sum()
    }

    fn check_arg(
        &self,
        what: &'static str,
        expected: usize,
        got: usize,
    ) -> Result<(), UnfoldError> {
        if expected != got {
            let shape = if what == "unfolded array" {
                &self.unfolded_shape
            } else {
                &self.observed_shape
            };
            return Err(UnfoldError::ShapeMismatch {
                what,
                expected: format_shape(shape),
                got: format!("length {got}"),
            });
        }
        Ok(())
    }
}

impl<T: FloatLinalg> LinearOperator<T> for ResponseMatrix<T> {
    fn unfolded_shape(&self) -> &[usize] {
        &self.unfolded_shape
    }

    fn observed_shape(&self) -> &[usize] {
        &self.observed_shape
    }

    fn times_vector(&self, unfolded: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.check_arg("unfolded array", self.unfolded_len(), unfolded.len())?;
        self.check_arg("observed array", self.observed_len(), out.len())?;
        out.iter_mut().for_each(|v| *v = T::zero());
        for (cell, &source) in self.cells.iter().zip(unfolded) {
            for (&idx, &p) in cell.indices.iter().zip(&cell.probabilities) {
                out[idx] = out[idx] + p * source;
            }
        }
        Ok(())
    }

    fn row_multiply(&self, observed: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.check_arg("observed array", self.observed_len(), observed.len())?;
        self.check_arg("unfolded array", self.unfolded_len(), out.len())?;
        for (cell, o) in self.cells.iter().zip(out.iter_mut()) {
            *o = cell
                .indices
                .iter()
                .zip(&cell.probabilities)
                .fold(T::zero(), |acc, (&idx, &p)| acc + p * observed[idx]);
        }
        Ok(())
    }

    fn linear_efficiency(&self, i: usize) -> T {
        self.cells[i].efficiency()
    }

    fn validate(&self) -> Result<(), UnfoldError> {
        let n_obs = self.observed_len();
        let mut has_positive = false;
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.indices.len() != cell.probabilities.len() {
                return Err(UnfoldError::InvalidResponse(format!(
                    "cell {i}: {} indices but {} probabilities",
                    cell.indices.len(),
                    cell.probabilities.len()
                )));
            }
            for (j, (&idx, &p)) in cell.indices.iter().zip(&cell.probabilities).enumerate() {
                if idx >= n_obs {
                    return Err(UnfoldError::InvalidResponse(format!(
                        "cell {i}: observed index {idx} out of range {n_obs}"
                    )));
                }
                if j > 0 && idx <= cell.indices[j - 1] {
                    return Err(UnfoldError::InvalidResponse(format!(
                        "cell {i}: observed indices are not strictly increasing"
                    )));
                }
                if !p.is_finite() || p < T::zero() {
                    return Err(UnfoldError::InvalidResponse(format!(
                        "cell {i}: probability {} for observed index {idx}",
                        to_f64(p)
                    )));
                }
                has_positive |= p > T::zero();
            }
        }
        if !has_positive {
            return Err(UnfoldError::InvalidResponse("no positive probabilities".into()));
        }
        Ok(())
    }

    fn dense_matrix(&self) -> Matrix<T> {
        let n_unf = self.unfolded_len();
        let mut out = Matrix::zeros(self.observed_len(), n_unf);
        for (col, cell) in self.cells.iter().enumerate() {
            for (&idx, &p) in cell.indices.iter().zip(&cell.probabilities) {
                out[(idx, col)] = p;
            }
        }
        out
    }
}
