//! Linear error propagation through the smoothed EM fixed point.
//!
//! ## Purpose
//!
//! Once the smoothed EM iteration has converged to `u = S · M(u, y)`, the
//! sensitivity of the solution to the observed data is the Jacobian
//! `J = du/dy`. Differentiating the fixed point gives the linear system
//! `(I - S B) J = S M0`, solved directly and then refined iteratively.
//! The unfolded covariance is `J Σ Jᵀ`.
//!
//! ## Design notes
//!
//! * **Normalization term**: The smoothing step renormalizes its output, so
//!   `S` is corrected by `(1 - colsum(S)_c) u_r / Σu` to account for the
//!   dependence of the norm factor on the data.
//! * **Refinement**: `J ← S M0 + S B J` until the relative Frobenius change
//!   drops to `ε`, the iteration budget is used up, or the change stops
//!   shrinking (see [`StallDetector`]).
//! * **Fallback**: A failed direct solve is logged and refinement starts
//!   from `S M0`.
//!
//! ## Key concepts
//!
//! * `M0[r][o] = (u_r / eff_r) R[o][r] / yhat_o`: derivative of the EM
//!   update with respect to the observed counts.
//! * `B = diag(Rᵀ (y / yhat) / eff) - (u_m / eff_m) Σ_o R[o][m] y_o / yhat_o² R[o][r]`:
//!   derivative of the EM update with respect to the previous iterate.
//!
//! ## Invariants
//!
//! * `J` is `n_unfolded x n_observed`.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// Internal dependencies
use crate::math::density::sum;
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::{lit, to_f64};

// ============================================================================
// Stall Detector
// ============================================================================

/// Default number of refinement iterations before stall detection kicks in.
pub const DEFAULT_STALL_THRESHOLD: usize = 4;

/// Stops an iteration whose convergence ratio has stopped improving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallDetector<T> {
    threshold: usize,
    previous_ratio: T,
}

impl<T: FloatLinalg> StallDetector<T> {
    /// Detector active after `threshold` iterations.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            previous_ratio: T::zero(),
        }
    }

    /// Record `ratio` for iteration `iteration`; true if the loop should stop.
    pub fn is_stalled(&mut self, iteration: usize, converged: bool, ratio: T) -> bool {
        if iteration > self.threshold && !converged && ratio >= self.previous_ratio {
            return true;
        }
        self.previous_ratio = ratio;
        false
    }
}

// ============================================================================
// Propagation
// ============================================================================

/// Linearization point and settings for [`error_propagation_matrix`].
#[derive(Debug, Clone, Copy)]
pub struct PropagationInput<'s, T> {
    /// Dense `n_observed x n_unfolded` response.
    pub response: &'s Matrix<T>,

    /// Per-cell efficiencies.
    pub efficiency: &'s [T],

    /// Smoothing operator `S` (`F` or `Fᵀ`), before scaling by `norm`.
    pub smoothing: &'s Matrix<T>,

    /// Observed spectrum.
    pub observed: &'s [T],

    /// Smoothed unfolded spectrum at the fixed point.
    pub unfolded: &'s [T],

    /// `R · unfolded`.
    pub yhat: &'s [T],

    /// Normalization factor applied by the last smoothing step.
    pub norm: T,

    /// Whether the returned unfolded result was smoothed.
    pub smooth_last: bool,

    /// Refinement iteration budget.
    pub max_iterations: usize,

    /// Refinement convergence tolerance.
    pub epsilon: T,

    /// Stall detector threshold.
    pub stall_threshold: usize,
}

/// Jacobian of the unfolded result with respect to the observed data.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation<T> {
    /// `n_unfolded x n_observed` Jacobian.
    pub jacobian: Matrix<T>,

    /// Refinement iterations made.
    pub iterations: usize,

    /// Whether refinement converged.
    pub converged: bool,
}

/// Compute the error propagation matrix at the given fixed point.
pub fn error_propagation_matrix<T: FloatLinalg>(
    input: &PropagationInput<'_, T>,
) -> Result<Propagation<T>, UnfoldError> {
    let r = input.response;
    let n_obs = r.n_rows();
    let n_unf = r.n_cols();
    let eff = input.efficiency;
    let u = input.unfolded;
    let yhat = input.yhat;
    let observed = input.observed;

    let mut s = input.smoothing.clone();
    s.scale(input.norm);

    // Account for the dependence of the smoothing norm factor on the data.
    let csums = s.column_sums();
    let u_sum = sum(u);
    if u_sum <= T::zero() {
        return Err(UnfoldError::ZeroDensity);
    }
    for row in 0..n_unf {
        let frac = u[row] / u_sum;
        for (v, &c) in s.row_mut(row).iter_mut().zip(&csums) {
            *v = *v + (T::one() - c) * frac;
        }
    }

    // M0
    let mut m0 = Matrix::zeros(n_unf, n_obs);
    for row in 0..n_unf {
        let factor = u[row] / eff[row];
        if factor > T::zero() {
            let dest = m0.row_mut(row);
            for (col, d) in dest.iter_mut().enumerate() {
                if yhat[col] > T::zero() {
                    *d = factor * r[(col, row)] / yhat[col];
                }
            }
        }
    }

    // diag(Rᵀ (y / yhat) / eff)
    let mut tmp: Vec<T> = observed
        .iter()
        .zip(yhat)
        .map(|(&o, &y)| if o > T::zero() { o / y } else { T::zero() })
        .collect();
    let num = r.row_multiply(&tmp)?;
    let diag: Vec<T> = num.iter().zip(eff).map(|(&n, &e)| n / e).collect();
    let diagm = Matrix::from_diagonal(&diag);

    for (t, &y) in tmp.iter_mut().zip(yhat) {
        if *t > T::zero() {
            *t = *t / y;
        }
    }

    let mut mat = Matrix::zeros(n_unf, n_unf);
    let mut weighted = vec![T::zero(); n_obs];
    for m in 0..n_unf {
        let factor = u[m] / eff[m];
        for (i, w) in weighted.iter_mut().enumerate() {
            *w = r[(i, m)] * tmp[i];
        }
        let row = r.row_multiply(&weighted)?;
        for (dst, &v) in mat.row_mut(m).iter_mut().zip(&row) {
            *dst = factor * v;
        }
    }

    let b = diagm.sub(&mat)?;
    let sm = s.times(&m0)?;
    let sb = s.times(&b)?;

    // Direct solution of (I - SB) J = SM.
    let imsb = Matrix::identity(n_unf).sub(&sb)?;
    let mut next = match imsb.solve_linear_systems(&sm) {
        Ok(j) => j,
        Err(e) => {
            log::warn!("error propagation: direct solve failed ({e}), refining from S*M0");
            sm.clone()
        }
    };

    // Iterative refinement.
    let two: T = lit(2.0);
    let mut prev = Matrix::zeros(n_unf, n_obs);
    let mut old_norm = next.frobenius_norm();
    let mut converged = false;
    let mut stall = StallDetector::new(input.stall_threshold);
    let mut iterations = 0;
    while iterations < input.max_iterations && !converged {
        core::mem::swap(&mut prev, &mut next);
        sb.times_into(&prev, &mut next)?;
        next.add_assign(&sm)?;

        let del = next.sub(&prev)?.frobenius_norm();
        let nn = next.frobenius_norm();
        let denom = nn + old_norm;
        old_norm = nn;
        let ratio = if denom > T::zero() { del * two / denom } else { T::zero() };
        converged = ratio <= input.epsilon;

        if stall.is_stalled(iterations, converged, ratio) {
            log::warn!(
                "error propagation stalled after {iterations} iterations, ratio {}",
                to_f64(ratio)
            );
            break;
        }
        iterations += 1;
    }
    log::debug!("error propagation: {iterations} iterations, converged = {converged}");

    let jacobian = if input.smooth_last {
        next
    } else {
        m0.add(&b.times(&next)?)?
    };
    Ok(Propagation {
        jacobian,
        iterations,
        converged,
    })
}
