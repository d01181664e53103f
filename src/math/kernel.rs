//! Symmetric beta kernels for LOrPE filter construction.
//!
//! ## Purpose
//!
//! This module provides the kernel family used to weight neighboring bins
//! when local orthogonal polynomial filters are built. A single integer
//! power selects the member of the family.
//!
//! ## Design notes
//!
//! * **Normalization**: Maps scaled distances `u = (x_j - x_i) / bandwidth`
//!   to weights. The overall scale does not matter because filter rows are
//!   built from polynomials orthonormal under the kernel weights.
//! * **Support**: Symmetric beta kernels are bounded on `[-1, 1]`; the
//!   Gaussian member is truncated at a fixed number of standard deviations.
//!
//! ## Key concepts
//!
//! * **Power `m >= 0`**: `K(u) = (1 - u^2)^m`. `m = 0` is uniform,
//!   `m = 1` Epanechnikov, `m = 2` biweight, `m = 3` triweight.
//! * **Power `m < 0`**: Gaussian `K(u) = exp(-u^2 / 2)`.
//!
//! ## Invariants
//!
//! * Kernels are non-negative and symmetric.
//! * Bounded kernels return exactly zero outside their support.
//!
//! ## Non-goals
//!
//! * This module does not normalize weights.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::numeric::lit;

// ============================================================================
// Constants
// ============================================================================

/// Truncation of the Gaussian member, in standard deviations.
pub const GAUSSIAN_CUTOFF: f64 = 12.0;

// ============================================================================
// Symbeta Kernel
// ============================================================================

/// Member of the symmetric beta kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbetaKernel {
    power: i32,
}

impl SymbetaKernel {
    /// Kernel with the given power; negative powers select the Gaussian.
    pub const fn new(power: i32) -> Self {
        Self { power }
    }

    /// The kernel power.
    pub const fn power(&self) -> i32 {
        self.power
    }

    /// True for the Gaussian member.
    pub const fn is_gaussian(&self) -> bool {
        self.power < 0
    }

    /// Half-width of the support in units of the bandwidth.
    pub fn support(&self) -> f64 {
        if self.is_gaussian() {
            GAUSSIAN_CUTOFF
        } else {
            1.0
        }
    }

    /// Evaluate the kernel at the scaled distance `u`.
    pub fn weight<T: Float>(&self, u: T) -> T {
        let au = u.abs();
        if self.is_gaussian() {
            if au > lit(GAUSSIAN_CUTOFF) {
                return T::zero();
            }
            return (-(u * u) / lit(2.0)).exp();
        }
        if au >= T::one() {
            return T::zero();
        }
        let base = T::one() - u * u;
        base.powi(self.power)
    }
}
