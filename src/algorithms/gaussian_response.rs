//! Response matrices for Gaussian smearing.
//!
//! ## Purpose
//!
//! Builds the dense response matrix of a detector that smears a true value
//! `x` into a Gaussian with mean `mean(x)` and width `width(x)`. Entry
//! `(o, u)` is the probability that an event uniformly distributed in
//! unfolded bin `u` lands in observed bin `o`, computed by Gauss-Legendre
//! integration over both bins.
//!
//! ## Key concepts
//!
//! * With `n` points the double integral is
//!   `0.5 Σ_i w_i Σ_j w_j g(o_mid + o_half x_j; mean(u_mid + u_half x_i), width(..)) o_half`.
//! * Probability smeared outside the observed range is lost, so columns can
//!   sum to less than one.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::format;
#[cfg(feature = "std")]
use std::format;

// External dependencies
use core::f64::consts::PI;
use num_traits::Float;

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::math::quadrature::GaussLegendre;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::lit;

/// Uniform binning of an interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBins {
    /// Lower edge.
    pub min: f64,

    /// Upper edge.
    pub max: f64,

    /// Number of bins.
    pub n_bins: usize,
}

impl UniformBins {
    /// Binning of `[min, max)` into `n_bins` bins.
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<Self, UnfoldError> {
        if n_bins == 0 {
            return Err(UnfoldError::InvalidParameter("number of bins must be positive".into()));
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(UnfoldError::InvalidParameter(format!(
                "invalid interval [{min}, {max})"
            )));
        }
        Ok(Self { min, max, n_bins })
    }

    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Center of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width()
    }
}

/// Dense `n_observed x n_unfolded` response for Gaussian smearing.
pub fn gaussian_response_matrix<T, M, W>(
    unfolded: UniformBins,
    observed: UniformBins,
    mean: M,
    width: W,
    n_integration_points: usize,
) -> Result<Matrix<T>, UnfoldError>
where
    T: FloatLinalg,
    M: Fn(f64) -> f64,
    W: Fn(f64) -> f64,
{
    let rule = GaussLegendre::new(n_integration_points)?;
    let u_half = unfolded.bin_width() / 2.0;
    let o_half = observed.bin_width() / 2.0;
    let norm = 1.0 / Float::sqrt(2.0 * PI);

    // Smearing parameters at every integration point of every unfolded bin.
    let mut nodes = vec![(0.0, 0.0); unfolded.n_bins * rule.n_points()];
    for iu in 0..unfolded.n_bins {
        let mid = unfolded.bin_center(iu);
        for (k, &x) in rule.abscissae().iter().enumerate() {
            let t = mid + u_half * x;
            let sigma = width(t);
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(UnfoldError::InvalidParameter(format!(
                    "smearing width at {t} is {sigma}"
                )));
            }
            nodes[iu * rule.n_points() + k] = (mean(t), sigma);
        }
    }

    let mut result = Matrix::zeros(observed.n_bins, unfolded.n_bins);
    for io in 0..observed.n_bins {
        let omid = observed.bin_center(io);
        for iu in 0..unfolded.n_bins {
            let mut sum = 0.0;
            for (i, &wi) in rule.weights().iter().enumerate() {
                let (mu, sigma) = nodes[iu * rule.n_points() + i];
                let mut inner = 0.0;
                for (&xj, &wj) in rule.abscissae().iter().zip(rule.weights()) {
                    let z = (omid + o_half * xj - mu) / sigma;
                    inner += wj * norm * Float::exp(-0.5 * z * z) / sigma;
                }
                sum += wi * inner;
            }
            result[(io, iu)] = lit(0.5 * sum * o_half);
        }
    }
    Ok(result)
}
