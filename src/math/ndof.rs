//! Effective number of degrees of freedom of smoother-like matrices.
//!
//! ## Purpose
//!
//! This module summarizes a symmetric positive semi-definite matrix (such as
//! `F Fᵀ` for a filter matrix `F`, or `R Rᵀ` for a response matrix) by its
//! effective rank. Two estimates are produced from the eigenvalue spectrum.
//!
//! ## Background
//!
//! With eigenvalues `λ_i ≥ 0` and `p_i = λ_i / Σλ`:
//! - entropic rank = `exp(-Σ p_i ln p_i)`, equal to the true rank when all
//!   non-zero eigenvalues coincide;
//! - trace rank = `Σλ / max λ`.
//!
//! Small negative eigenvalues produced by rounding are treated as zero.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;

// ============================================================================
// Effective Rank
// ============================================================================

/// Effective rank estimates of a symmetric positive semi-definite matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveRank<T> {
    /// Exponential of the eigenvalue entropy.
    pub entropic: T,

    /// Sum of eigenvalues divided by the largest eigenvalue.
    pub trace: T,
}

impl<T: Float> EffectiveRank<T> {
    /// Compute both estimates from an eigenvalue spectrum.
    ///
    /// Eigenvalues not exceeding `tol * max λ` are ignored.
    pub fn from_eigenvalues(eigenvalues: &[T], tol: T) -> Self {
        let max = eigenvalues.iter().fold(T::zero(), |m, &v| m.max(v));
        if max <= T::zero() {
            return Self {
                entropic: T::zero(),
                trace: T::zero(),
            };
        }

        let cutoff = tol.max(T::zero()) * max;
        let total = eigenvalues
            .iter()
            .filter(|&&v| v > cutoff)
            .fold(T::zero(), |acc, &v| acc + v);

        let entropy = eigenvalues
            .iter()
            .filter(|&&v| v > cutoff)
            .fold(T::zero(), |acc, &v| {
                let p = v / total;
                acc - p * p.ln()
            });

        Self {
            entropic: entropy.exp(),
            trace: total / max,
        }
    }

    /// Return the pair as `(entropic, trace)`.
    pub fn as_pair(&self) -> (T, T) {
        (self.entropic, self.trace)
    }
}

/// Effective rank of a symmetric positive semi-definite matrix.
pub fn sym_psd_effective_rank<T: FloatLinalg>(
    matrix: &Matrix<T>,
    tol: T,
) -> Result<EffectiveRank<T>, UnfoldError> {
    let eigenvalues = matrix.sym_eigenvalues()?;
    Ok(EffectiveRank::from_eigenvalues(&eigenvalues, tol))
}
