//! Response operators mapping unfolded space to observed space.
//!
//! ## Purpose
//!
//! This module defines [`LinearOperator`], the narrow capability the EM
//! engine needs from a response matrix, and [`DenseResponse`], its dense
//! implementation. The sparse implementation lives in
//! [`crate::algorithms::sparse`].
//!
//! ## Design notes
//!
//! * **Convention**: `observed_expectation = R · unfolded`. The dense form is
//!   stored `n_observed x n_unfolded` (rows are observed cells).
//! * **Adjoint**: `row_multiply` computes `Rᵀ · y`. The dense operator caches
//!   `Rᵀ` so both products run over contiguous rows.
//! * **Shapes**: Both spaces carry an array shape so that 1-D and N-D
//!   problems go through the same engine.
//!
//! ## Key concepts
//!
//! * **Efficiency**: For unfolded cell `j`, the sum of its response entries,
//!   i.e. the probability that a true entry is observed anywhere.
//!
//! ## Invariants
//!
//! * Response entries are finite and non-negative.
//! * `unfolded_len() == shape_length(unfolded_shape())`, same for observed.
//!
//! ## Non-goals
//!
//! * This module does not check efficiencies; that is the unfolding base's job.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};
#[cfg(feature = "std")]
use std::{format, vec::Vec};

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::to_f64;
use crate::primitives::shape::{format_shape, shape_length, validate_shape};

// ============================================================================
// LinearOperator Trait
// ============================================================================

/// Linear response operator `R` from the unfolded to the observed space.
pub trait LinearOperator<T: FloatLinalg> {
    /// Shape of the unfolded space.
    fn unfolded_shape(&self) -> &[usize];

    /// Shape of the observed space.
    fn observed_shape(&self) -> &[usize];

    /// Number of unfolded cells.
    fn unfolded_len(&self) -> usize {
        shape_length(self.unfolded_shape())
    }

    /// Number of observed cells.
    fn observed_len(&self) -> usize {
        shape_length(self.observed_shape())
    }

    /// `out = R · unfolded`.
    fn times_vector(&self, unfolded: &[T], out: &mut [T]) -> Result<(), UnfoldError>;

    /// `out = Rᵀ · observed`.
    fn row_multiply(&self, observed: &[T], out: &mut [T]) -> Result<(), UnfoldError>;

    /// Efficiency of unfolded cell `i`.
    fn linear_efficiency(&self, i: usize) -> T;

    /// Efficiencies of all unfolded cells.
    fn efficiencies(&self) -> Vec<T> {
        (0..self.unfolded_len())
            .map(|i| self.linear_efficiency(i))
            .collect()
    }

    /// Check structural validity; returns a description of the first problem.
    fn validate(&self) -> Result<(), UnfoldError>;

    /// Dense `n_observed x n_unfolded` form of the operator.
    fn dense_matrix(&self) -> Matrix<T>;
}

// ============================================================================
// Dense Response
// ============================================================================

/// Dense response matrix with a cached transpose.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseResponse<T> {
    matrix: Matrix<T>,
    transposed: Matrix<T>,
    unfolded_shape: Vec<usize>,
    observed_shape: Vec<usize>,
}

impl<T: FloatLinalg> DenseResponse<T> {
    /// One-dimensional response from an `n_observed x n_unfolded` matrix.
    pub fn new(matrix: Matrix<T>) -> Result<Self, UnfoldError> {
        let unfolded_shape = vec![matrix.n_cols()];
        let observed_shape = vec![matrix.n_rows()];
        Self::with_shapes(matrix, unfolded_shape, observed_shape)
    }

    /// Response with explicit multi-dimensional shapes.
    ///
    /// Matrix columns follow the row-major order of `unfolded_shape` and
    /// matrix rows the row-major order of `observed_shape`.
    pub fn with_shapes(
        matrix: Matrix<T>,
        unfolded_shape: Vec<usize>,
        observed_shape: Vec<usize>,
    ) -> Result<Self, UnfoldError> {
        validate_shape(&unfolded_shape, "unfolded space")?;
        validate_shape(&observed_shape, "observed space")?;
        if matrix.n_cols() != shape_length(&unfolded_shape) {
            return Err(UnfoldError::ShapeMismatch {
                what: "unfolded space",
                expected: format_shape(&unfolded_shape),
                got: format!("{} matrix columns", matrix.n_cols()),
            });
        }
        if matrix.n_rows() != shape_length(&observed_shape) {
            return Err(UnfoldError::ShapeMismatch {
                what: "observed space",
                expected: format_shape(&observed_shape),
                got: format!("{} matrix rows", matrix.n_rows()),
            });
        }
        let transposed = matrix.T();
        let out = Self {
            matrix,
            transposed,
            unfolded_shape,
            observed_shape,
        };
        out.validate()?;
        Ok(out)
    }

    /// The `n_observed x n_unfolded` matrix.
    pub fn matrix(&self) -> &Matrix<T> {
        &self.matrix
    }

    /// The transposed `n_unfolded x n_observed` matrix.
    pub fn transposed(&self) -> &Matrix<T> {
        &self.transposed
    }
}

impl<T: FloatLinalg> LinearOperator<T> for DenseResponse<T> {
    fn unfolded_shape(&self) -> &[usize] {
        &self.unfolded_shape
    }

    fn observed_shape(&self) -> &[usize] {
        &self.observed_shape
    }

    fn times_vector(&self, unfolded: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.matrix.times_vector_into(unfolded, out)
    }

    fn row_multiply(&self, observed: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.transposed.times_vector_into(observed, out)
    }

    fn linear_efficiency(&self, i: usize) -> T {
        self.transposed.row_sum(i)
    }

    fn validate(&self) -> Result<(), UnfoldError> {
        let mut has_positive = false;
        for (k, &v) in self.matrix.as_slice().iter().enumerate() {
            if !v.is_finite() || v < T::zero() {
                let n = self.matrix.n_cols();
                return Err(UnfoldError::InvalidResponse(format!(
                    "entry ({}, {}) is {}",
                    k / n,
                    k % n,
                    to_f64(v)
                )));
            }
            has_positive |= v > T::zero();
        }
        if !has_positive {
            return Err(UnfoldError::InvalidResponse(format!(
                "no positive entries in {}x{} matrix",
                self.matrix.n_rows(),
                self.matrix.n_cols()
            )));
        }
        Ok(())
    }

    fn dense_matrix(&self) -> Matrix<T> {
        self.matrix.clone()
    }
}
