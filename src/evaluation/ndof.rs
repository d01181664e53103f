//! Effective degrees of freedom of the unfolding operators.
//!
//! ## Purpose
//!
//! These diagnostics summarize how much freedom the smoothing filter, the
//! response matrix and their composition leave in the unfolded solution.
//! Each is the effective rank of a Gram matrix built from the operator.
//!
//! ## Key concepts
//!
//! * **Smoothing**: `S Sᵀ` with `S = F` (filter mode) or `Fᵀ` (convolution
//!   mode); equivalently `F Fᵀ` or `Fᵀ F`.
//! * **Response**: `R Rᵀ`.
//! * **Smoothed response**: `T Tᵀ` with `T = R S`.

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::math::ndof::{EffectiveRank, sym_psd_effective_rank};
use crate::primitives::errors::UnfoldError;

/// Relative eigenvalue cutoff used by the diagnostics.
pub const NDOF_TOLERANCE: f64 = 1.0e-12;

/// Smoothing operator `S` applied by the EM iteration.
pub fn smoothing_operator<T: FloatLinalg>(
    filter_matrix: &Matrix<T>,
    use_convolutions: bool,
) -> Matrix<T> {
    if use_convolutions {
        filter_matrix.T()
    } else {
        filter_matrix.clone()
    }
}

/// Effective rank of `S Sᵀ`.
pub fn smoothing_ndof<T: FloatLinalg>(
    filter_matrix: &Matrix<T>,
    use_convolutions: bool,
    tol: T,
) -> Result<EffectiveRank<T>, UnfoldError> {
    let gram = if use_convolutions {
        filter_matrix.t_times_this()
    } else {
        filter_matrix.times_t()
    };
    sym_psd_effective_rank(&gram, tol)
}

/// Effective rank of `R Rᵀ`.
pub fn response_ndof<T: FloatLinalg>(
    response: &Matrix<T>,
    tol: T,
) -> Result<EffectiveRank<T>, UnfoldError> {
    sym_psd_effective_rank(&response.times_t(), tol)
}

/// Effective rank of `(R S)(R S)ᵀ`.
pub fn smoothed_response_ndof<T: FloatLinalg>(
    response: &Matrix<T>,
    filter_matrix: &Matrix<T>,
    use_convolutions: bool,
    tol: T,
) -> Result<EffectiveRank<T>, UnfoldError> {
    let composed = response.times(&smoothing_operator(filter_matrix, use_convolutions))?;
    sym_psd_effective_rank(&composed.times_t(), tol)
}
