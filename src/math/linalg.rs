//! Linear algebra backend abstraction for unfolding.
//!
//! ## Purpose
//!
//! This module provides a trait-based abstraction over the few dense
//! decompositions the crate needs (linear system solves and symmetric
//! eigenvalues), standardizing on the nalgebra backend, plus a SIMD dot
//! product kernel used by the matrix-vector products.
//!
//! ## Design notes
//!
//! * Uses QR decomposition (Householder reflections) for linear systems with
//!   an SVD fallback for rank-deficient matrices.
//! * Symmetric eigenvalues come from nalgebra's implicit QR symmetric solver.
//! * Matrices cross the boundary as row-major slices; nalgebra is column-major,
//!   so inputs are built with `from_row_slice` and outputs transposed back.
//! * Generic over `FloatLinalg` types (f32 and f64) which delegate to nalgebra.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::fmt::Debug;
use num_traits::Float;

// ============================================================================
// FloatLinalg Trait
// ============================================================================

/// Helper trait to bridge generic Float types to the nalgebra backend.
pub trait FloatLinalg: Float + Debug + Send + Sync + 'static {
    /// Solve `A X = B` where `A` is `n x n` and `B` is `n x m`, both row-major.
    ///
    /// Returns `X` in row-major order, or `None` if no solution could be found.
    fn solve_systems(a: &[Self], b: &[Self], n: usize, m: usize) -> Option<Vec<Self>>;

    /// Eigenvalues of a symmetric `n x n` row-major matrix, in ascending order.
    fn sym_eigenvalues(a: &[Self], n: usize) -> Option<Vec<Self>>;

    /// Dot product of two equally long slices.
    fn dot(a: &[Self], b: &[Self]) -> Self;
}

impl FloatLinalg for f64 {
    #[inline]
    fn solve_systems(a: &[Self], b: &[Self], n: usize, m: usize) -> Option<Vec<Self>> {
        nalgebra_backend::solve_systems_f64(a, b, n, m)
    }
    #[inline]
    fn sym_eigenvalues(a: &[Self], n: usize) -> Option<Vec<Self>> {
        nalgebra_backend::sym_eigenvalues_f64(a, n)
    }
    #[inline]
    fn dot(a: &[Self], b: &[Self]) -> Self {
        simd::dot_f64(a, b)
    }
}

impl FloatLinalg for f32 {
    #[inline]
    fn solve_systems(a: &[Self], b: &[Self], n: usize, m: usize) -> Option<Vec<Self>> {
        nalgebra_backend::solve_systems_f32(a, b, n, m)
    }
    #[inline]
    fn sym_eigenvalues(a: &[Self], n: usize) -> Option<Vec<Self>> {
        nalgebra_backend::sym_eigenvalues_f32(a, n)
    }
    #[inline]
    fn dot(a: &[Self], b: &[Self]) -> Self {
        a.iter().zip(b).fold(0.0, |acc, (&x, &y)| acc + x * y)
    }
}

// ============================================================================
// Nalgebra Backend Implementation
// ============================================================================

/// Nalgebra-based linear algebra operations.
pub mod nalgebra_backend {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra::linalg::SymmetricEigen;

    const EIGEN_MAX_SWEEPS: usize = 10_000;

    /// Solve `A X = B` using f64 precision.
    pub fn solve_systems_f64(a: &[f64], b: &[f64], n: usize, m: usize) -> Option<Vec<f64>> {
        let matrix = DMatrix::from_row_slice(n, n, a);
        let rhs = DMatrix::from_row_slice(n, m, b);

        let qr = matrix.clone().qr();
        if let Some(solution) = qr.solve(&rhs) {
            if solution.iter().all(|v| v.is_finite()) {
                return Some(solution.transpose().as_slice().to_vec());
            }
        }

        matrix
            .svd(true, true)
            .solve(&rhs, f64::EPSILON * 100.0)
            .ok()
            .map(|s: DMatrix<f64>| s.transpose().as_slice().to_vec())
    }

    /// Symmetric eigenvalues using f64 precision.
    pub fn sym_eigenvalues_f64(a: &[f64], n: usize) -> Option<Vec<f64>> {
        let matrix = DMatrix::from_row_slice(n, n, a);
        let eigen = SymmetricEigen::try_new(matrix, f64::EPSILON, EIGEN_MAX_SWEEPS)?;
        let mut values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        values.sort_by(|x, y| x.total_cmp(y));
        Some(values)
    }

    /// Solve `A X = B` using f32 precision.
    pub fn solve_systems_f32(a: &[f32], b: &[f32], n: usize, m: usize) -> Option<Vec<f32>> {
        let matrix = DMatrix::from_row_slice(n, n, a);
        let rhs = DMatrix::from_row_slice(n, m, b);

        let qr = matrix.clone().qr();
        if let Some(solution) = qr.solve(&rhs) {
            if solution.iter().all(|v| v.is_finite()) {
                return Some(solution.transpose().as_slice().to_vec());
            }
        }

        matrix
            .svd(true, true)
            .solve(&rhs, f32::EPSILON * 100.0)
            .ok()
            .map(|s: DMatrix<f32>| s.transpose().as_slice().to_vec())
    }

    /// Symmetric eigenvalues using f32 precision.
    pub fn sym_eigenvalues_f32(a: &[f32], n: usize) -> Option<Vec<f32>> {
        let matrix = DMatrix::from_row_slice(n, n, a);
        let eigen = SymmetricEigen::try_new(matrix, f32::EPSILON, EIGEN_MAX_SWEEPS)?;
        let mut values: Vec<f32> = eigen.eigenvalues.iter().copied().collect();
        values.sort_by(|x, y| x.total_cmp(y));
        Some(values)
    }
}

// ============================================================================
// SIMD Kernels
// ============================================================================

/// SIMD reductions for double precision.
pub mod simd {
    use wide::f64x2;

    /// Dot product of two slices, two lanes at a time.
    pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);

        let mut acc = f64x2::splat(0.0);
        let mut ca = a.chunks_exact(2);
        let mut cb = b.chunks_exact(2);
        for (x, y) in (&mut ca).zip(&mut cb) {
            acc += f64x2::new([x[0], x[1]]) * f64x2::new([y[0], y[1]]);
        }

        let [lo, hi] = acc.to_array();
        let mut sum = lo + hi;
        for (x, y) in ca.remainder().iter().zip(cb.remainder()) {
            sum += x * y;
        }
        sum
    }
}
