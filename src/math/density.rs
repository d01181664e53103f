//! Density utilities used by the EM iteration.
//!
//! ## Purpose
//!
//! The EM iteration treats its current estimate as a density: after a
//! smoothing pass the estimate is made non-negative and rescaled to keep
//! the total it had before smoothing. This module also provides the
//! normalized L1 distance used as the convergence criterion.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::UnfoldError;

/// Sum of a slice.
#[inline]
pub fn sum<T: Float>(values: &[T]) -> T {
    values.iter().fold(T::zero(), |acc, &v| acc + v)
}

/// Clip negative values to zero and rescale so that the array integrates to
/// one over bins of width `bin_width`.
///
/// Returns the factor applied to the clipped values,
/// `1 / (bin_width * sum(positive))`. Fails with [`UnfoldError::ZeroDensity`]
/// if nothing positive remains.
pub fn normalize_as_density<T: Float>(values: &mut [T], bin_width: T) -> Result<T, UnfoldError> {
    let mut positive = T::zero();
    for v in values.iter_mut() {
        if *v > T::zero() {
            positive = positive + *v;
        } else {
            *v = T::zero();
        }
    }
    if positive <= T::zero() {
        return Err(UnfoldError::ZeroDensity);
    }

    let norm = T::one() / (bin_width * positive);
    values.iter_mut().for_each(|v| *v = *v * norm);
    Ok(norm)
}

/// Normalized L1 distance between two approximations.
///
/// `sum|prev - next| / ((sum|prev| + sum|next|) / 2)`, or zero when both
/// arrays vanish.
pub fn prob_delta<T: Float>(prev: &[T], next: &[T]) -> T {
    let mut del = T::zero();
    let mut total = T::zero();
    for (&p, &n) in prev.iter().zip(next) {
        del = del + (p - n).abs();
        total = total + p.abs() + n.abs();
    }
    let half = total / (T::one() + T::one());
    if half > T::zero() { del / half } else { T::zero() }
}
