//! Dense row-major matrices for unfolding algebra.
//!
//! ## Purpose
//!
//! This module provides [`Matrix`], the dense matrix type used for response
//! matrices, filter matrices, covariance matrices and the error-propagation
//! Jacobian. It implements the products, transposes and reductions used by
//! the EM engine directly, and delegates decompositions (linear solves and
//! symmetric eigenvalues) to the [`FloatLinalg`] backend.
//!
//! ## Design notes
//!
//! * **Row-major**: `data[row * n_cols + col]`; rows are contiguous so that
//!   matrix-vector products reduce to SIMD dot products.
//! * **Diagonal tag**: matrices built as diagonal (for example a Poisson
//!   observation covariance) carry a tag that lets products skip the
//!   off-diagonal work.
//! * **Fallible algebra**: shape mismatches in products return
//!   [`UnfoldError::DimensionMismatch`] instead of panicking.
//!
//! ## Key concepts
//!
//! * **`times_vector`**: `M · x` (length `n_cols` in, `n_rows` out).
//! * **`row_multiply`**: `yᵀ · M`, i.e. `Mᵀ · y` (length `n_rows` in, `n_cols` out).
//! * **`times_t` / `t_times_this`**: `M Mᵀ` and `Mᵀ M`.
//!
//! ## Invariants
//!
//! * `data.len() == n_rows * n_cols` at all times.
//!
//! ## Non-goals
//!
//! * Sparse storage (see the sparse response matrix).
//! * Decomposition algorithms themselves (delegated to nalgebra).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{string::ToString, vec::Vec};
#[cfg(feature = "std")]
use std::{string::ToString, vec::Vec};

// External dependencies
use core::ops::{Index, IndexMut};

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::primitives::errors::UnfoldError;

// ============================================================================
// Matrix
// ============================================================================

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    n_rows: usize,
    n_cols: usize,
    data: Vec<T>,
    diagonal: bool,
}

impl<T: FloatLinalg> Default for Matrix<T> {
    fn default() -> Self {
        Self::zeros(0, 0)
    }
}

impl<T: FloatLinalg> Matrix<T> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Zero-filled `n_rows x n_cols` matrix.
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            data: vec![T::zero(); n_rows * n_cols],
            diagonal: false,
        }
    }

    /// Square matrix with `value` on the diagonal, tagged diagonal.
    pub fn diagonal_filled(n: usize, value: T) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = value;
        }
        m.diagonal = true;
        m
    }

    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        Self::diagonal_filled(n, T::one())
    }

    /// Diagonal matrix with the given diagonal values.
    pub fn from_diagonal(values: &[T]) -> Self {
        let n = values.len();
        let mut m = Self::zeros(n, n);
        for (i, &v) in values.iter().enumerate() {
            m.data[i * n + i] = v;
        }
        m.diagonal = true;
        m
    }

    /// Build from row-major data.
    pub fn from_row_slice(n_rows: usize, n_cols: usize, data: &[T]) -> Result<Self, UnfoldError> {
        if data.len() != n_rows * n_cols {
            return Err(UnfoldError::DimensionMismatch {
                what: "matrix data",
                expected: n_rows * n_cols,
                got: data.len(),
            });
        }
        Ok(Self {
            n_rows,
            n_cols,
            data: data.to_vec(),
            diagonal: false,
        })
    }

    /// Build from a vector of equally long rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, UnfoldError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(UnfoldError::DimensionMismatch {
                    what: "matrix row",
                    expected: n_cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            n_rows,
            n_cols,
            data,
            diagonal: false,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// True if the matrix is square.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.n_rows == self.n_cols
    }

    /// True if the matrix was built as diagonal.
    #[inline]
    pub fn is_diagonal(&self) -> bool {
        self.diagonal
    }

    /// Row-major data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// A single row.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// A single row, mutably. Clears the diagonal tag.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        self.diagonal = false;
        let n = self.n_cols;
        &mut self.data[i * n..(i + 1) * n]
    }

    /// Sums of all columns.
    pub fn column_sums(&self) -> Vec<T> {
        let mut sums = vec![T::zero(); self.n_cols];
        for r in 0..self.n_rows {
            for (s, &v) in sums.iter_mut().zip(self.row(r)) {
                *s = *s + v;
            }
        }
        sums
    }

    /// Sum of the elements of row `row`.
    pub fn row_sum(&self, row: usize) -> T {
        self.row(row).iter().fold(T::zero(), |acc, &v| acc + v)
    }

    /// Trace of a square matrix.
    pub fn trace(&self) -> T {
        let n = self.n_rows.min(self.n_cols);
        (0..n).fold(T::zero(), |acc, i| acc + self.data[i * self.n_cols + i])
    }

    /// Frobenius norm.
    pub fn frobenius_norm(&self) -> T {
        T::dot(&self.data, &self.data).sqrt()
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// `out = M · x`.
    pub fn times_vector_into(&self, x: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        check_len("vector factor", self.n_cols, x.len())?;
        check_len("vector product", self.n_rows, out.len())?;
        if self.diagonal {
            for (i, o) in out.iter_mut().enumerate() {
                *o = self.data[i * self.n_cols + i] * x[i];
            }
        } else {
            for (i, o) in out.iter_mut().enumerate() {
                *o = T::dot(self.row(i), x);
            }
        }
        Ok(())
    }

    /// `M · x` as a new vector.
    pub fn times_vector(&self, x: &[T]) -> Result<Vec<T>, UnfoldError> {
        let mut out = vec![T::zero(); self.n_rows];
        self.times_vector_into(x, &mut out)?;
        Ok(out)
    }

    /// `out = yᵀ · M` (equivalently `Mᵀ · y`).
    pub fn row_multiply_into(&self, y: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        check_len("row vector factor", self.n_rows, y.len())?;
        check_len("row vector product", self.n_cols, out.len())?;
        out.iter_mut().for_each(|o| *o = T::zero());
        for (r, &yr) in y.iter().enumerate() {
            if yr == T::zero() {
                continue;
            }
            for (o, &v) in out.iter_mut().zip(self.row(r)) {
                *o = *o + yr * v;
            }
        }
        Ok(())
    }

    /// `yᵀ · M` as a new vector.
    pub fn row_multiply(&self, y: &[T]) -> Result<Vec<T>, UnfoldError> {
        let mut out = vec![T::zero(); self.n_cols];
        self.row_multiply_into(y, &mut out)?;
        Ok(out)
    }

    /// Transpose.
    #[allow(non_snake_case)]
    pub fn T(&self) -> Self {
        let mut out = Self::zeros(self.n_cols, self.n_rows);
        for r in 0..self.n_rows {
            for c in 0..self.n_cols {
                out.data[c * self.n_rows + r] = self.data[r * self.n_cols + c];
            }
        }
        out.diagonal = self.diagonal;
        out
    }

    /// Matrix product `self · rhs`.
    pub fn times(&self, rhs: &Self) -> Result<Self, UnfoldError> {
        let mut out = Self::zeros(self.n_rows, rhs.n_cols);
        self.times_into(rhs, &mut out)?;
        Ok(out)
    }

    /// Matrix product written into `out`, which must already have the right shape.
    pub fn times_into(&self, rhs: &Self, out: &mut Self) -> Result<(), UnfoldError> {
        check_len("matrix product inner dimension", self.n_cols, rhs.n_rows)?;
        check_len("matrix product rows", self.n_rows, out.n_rows)?;
        check_len("matrix product columns", rhs.n_cols, out.n_cols)?;
        out.diagonal = self.diagonal && rhs.diagonal;
        let n = rhs.n_cols;
        out.data.iter_mut().for_each(|v| *v = T::zero());
        for i in 0..self.n_rows {
            let dest = &mut out.data[i * n..(i + 1) * n];
            for (k, &a) in self.row(i).iter().enumerate() {
                if a == T::zero() {
                    continue;
                }
                for (d, &b) in dest.iter_mut().zip(rhs.row(k)) {
                    *d = *d + a * b;
                }
            }
        }
        Ok(())
    }

    /// `M · Mᵀ`.
    pub fn times_t(&self) -> Self {
        let n = self.n_rows;
        let mut out = Self::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                let v = T::dot(self.row(i), self.row(j));
                out.data[i * n + j] = v;
                out.data[j * n + i] = v;
            }
        }
        out
    }

    /// `Mᵀ · M`.
    pub fn t_times_this(&self) -> Self {
        self.T().times_t()
    }

    /// `self · rhs · selfᵀ`, the congruence used for covariance propagation.
    pub fn sandwich(&self, rhs: &Self) -> Result<Self, UnfoldError> {
        let left = self.times(rhs)?;
        left.times(&self.T())
    }

    // ========================================================================
    // Element-wise Arithmetic
    // ========================================================================

    /// Multiply all elements by `factor` in place.
    pub fn scale(&mut self, factor: T) {
        self.data.iter_mut().for_each(|v| *v = *v * factor);
    }

    /// `self + rhs`.
    pub fn add(&self, rhs: &Self) -> Result<Self, UnfoldError> {
        self.zip_with(rhs, |a, b| a + b)
    }

    /// `self - rhs`.
    pub fn sub(&self, rhs: &Self) -> Result<Self, UnfoldError> {
        self.zip_with(rhs, |a, b| a - b)
    }

    /// `self += rhs` in place.
    pub fn add_assign(&mut self, rhs: &Self) -> Result<(), UnfoldError> {
        self.check_same_shape(rhs)?;
        self.diagonal = self.diagonal && rhs.diagonal;
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a = *a + b;
        }
        Ok(())
    }

    fn zip_with(&self, rhs: &Self, f: impl Fn(T, T) -> T) -> Result<Self, UnfoldError> {
        self.check_same_shape(rhs)?;
        Ok(Self {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            data: self.data.iter().zip(&rhs.data).map(|(&a, &b)| f(a, b)).collect(),
            diagonal: self.diagonal && rhs.diagonal,
        })
    }

    fn check_same_shape(&self, rhs: &Self) -> Result<(), UnfoldError> {
        check_len("matrix rows", self.n_rows, rhs.n_rows)?;
        check_len("matrix columns", self.n_cols, rhs.n_cols)
    }

    // ========================================================================
    // Decompositions
    // ========================================================================

    /// Solve `self · X = rhs` for `X`.
    pub fn solve_linear_systems(&self, rhs: &Self) -> Result<Self, UnfoldError> {
        if !self.is_square() {
            return Err(UnfoldError::SingularMatrix("matrix is not square".to_string()));
        }
        check_len("linear system right-hand side", self.n_rows, rhs.n_rows)?;
        let x = T::solve_systems(&self.data, &rhs.data, self.n_rows, rhs.n_cols)
            .ok_or_else(|| UnfoldError::SingularMatrix("linear solve failed".to_string()))?;
        Self::from_row_slice(self.n_rows, rhs.n_cols, &x)
    }

    /// Eigenvalues of a symmetric matrix, ascending.
    pub fn sym_eigenvalues(&self) -> Result<Vec<T>, UnfoldError> {
        if !self.is_square() {
            return Err(UnfoldError::SingularMatrix("matrix is not square".to_string()));
        }
        T::sym_eigenvalues(&self.data, self.n_rows).ok_or_else(|| {
            UnfoldError::SingularMatrix("symmetric eigendecomposition failed".to_string())
        })
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &T {
        &self.data[r * self.n_cols + c]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut T {
        self.diagonal = false;
        &mut self.data[r * self.n_cols + c]
    }
}

#[inline]
fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), UnfoldError> {
    if expected != got {
        return Err(UnfoldError::DimensionMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}
