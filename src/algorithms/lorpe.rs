//! Local orthogonal polynomial (LOrPE) filters on a uniform 1-D grid.
//!
//! ## Purpose
//!
//! This module builds the smoothing filters used between EM iterations.
//! Each output bin is a local polynomial fit to its neighbors, weighted by a
//! symmetric beta kernel, evaluated at the bin center. The fit is linear in
//! the data, so the whole filter is a matrix.
//!
//! ## Design notes
//!
//! * **Orthonormal basis**: For each center, monomials in the scaled distance
//!   are orthonormalized (modified Gram-Schmidt, two passes) under the
//!   kernel-weighted discrete inner product on the points that survive the
//!   boundary treatment. Degrees the local points cannot support are dropped.
//! * **Taper**: Degree `k` enters with factor `taper[k]`. An integer degree
//!   `d` is the taper `[1; d + 1]`; a fractional degree adds one partially
//!   weighted term.
//! * **Dense storage**: Filter rows are kept in a square [`Matrix`], so
//!   `filter` and `convolve` are matrix-vector products.
//!
//! ## Key concepts
//!
//! * **Row weight** of point `j` for center `i`:
//!   `w_j Σ_k taper_k P_k(0) P_k(x_j)`, accumulated into the bin that `j`
//!   maps to.
//! * **Zero bandwidth** gives the identity filter.
//!
//! ## Invariants
//!
//! * With full taper, rows reproduce polynomials up to the fitted degree
//!   wherever enough points are available.
//! * Degree 0 rows are non-negative and sum to one.
//!
//! ## Non-goals
//!
//! * Non-uniform grids.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};
#[cfg(feature = "std")]
use std::{format, vec::Vec};

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::filter::{UnfoldingFilter, check_filter_buffers};
use crate::math::boundary::BoundaryMethod;
use crate::math::kernel::SymbetaKernel;
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::lit;

// ============================================================================
// Exclusion
// ============================================================================

/// Points removed from every local fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exclusion {
    /// Bin whose data never enters any fit.
    pub bin: Option<usize>,

    /// Drop the center point from its own fit.
    pub central_point: bool,
}

// ============================================================================
// Local Poly Filter
// ============================================================================

/// One-dimensional linear filter stored as a dense square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPolyFilter1D<T> {
    shape: [usize; 1],
    weights: Matrix<T>,
}

impl<T: FloatLinalg> LocalPolyFilter1D<T> {
    /// Filter with the given matrix; row `i` holds the weights of output bin `i`.
    pub fn from_matrix(weights: Matrix<T>) -> Result<Self, UnfoldError> {
        if !weights.is_square() || weights.n_rows() == 0 {
            return Err(UnfoldError::InvalidFilter(format!(
                "filter matrix must be square and non-empty, got {}x{}",
                weights.n_rows(),
                weights.n_cols()
            )));
        }
        if weights.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(UnfoldError::InvalidFilter("filter matrix has non-finite entries".into()));
        }
        Ok(Self {
            shape: [weights.n_rows()],
            weights,
        })
    }

    /// Identity filter on `n` bins.
    pub fn identity(n: usize) -> Self {
        Self {
            shape: [n],
            weights: Matrix::identity(n),
        }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.shape[0]
    }

    /// The filter matrix.
    pub fn weights(&self) -> &Matrix<T> {
        &self.weights
    }

    /// Weights of output bin `i`.
    pub fn row(&self, i: usize) -> &[T] {
        self.weights.row(i)
    }

    /// True if every row sums to one within `tol`.
    pub fn is_normalized(&self, tol: T) -> bool {
        (0..self.n_bins()).all(|i| (self.weights.row_sum(i) - T::one()).abs() <= tol)
    }
}

impl<T: FloatLinalg> UnfoldingFilter<T> for LocalPolyFilter1D<T> {
    fn data_shape(&self) -> &[usize] {
        &self.shape
    }

    fn filter(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        check_filter_buffers(self.shape[0], input, out)?;
        self.weights.times_vector_into(input, out)
    }

    fn convolve(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        check_filter_buffers(self.shape[0], input, out)?;
        self.weights.row_multiply_into(input, out)
    }

    fn filter_matrix(&self) -> Matrix<T> {
        self.weights.clone()
    }
}

// ============================================================================
// Construction
// ============================================================================

/// Largest supported LOrPE polynomial degree.
pub const MAX_POLY_DEGREE: f64 = 100.0;

/// Taper coefficients for a possibly fractional polynomial degree.
pub fn degree_taper(degree: f64) -> Result<Vec<f64>, UnfoldError> {
    if !degree.is_finite() || !(0.0..=MAX_POLY_DEGREE).contains(&degree) {
        return Err(UnfoldError::InvalidParameter(format!(
            "polynomial degree must be in [0, {MAX_POLY_DEGREE}], got {degree}"
        )));
    }
    let whole = Float::floor(degree);
    let mut taper = vec![1.0; whole as usize + 1];
    let frac = degree - whole;
    if frac > 0.0 {
        taper.push(frac);
    }
    Ok(taper)
}

/// Build a LOrPE filter on `n_bins` bins of width `bin_width`.
pub fn lorpe_filter_1d<T: FloatLinalg>(
    kernel: SymbetaKernel,
    bandwidth: f64,
    taper: &[f64],
    n_bins: usize,
    bin_width: f64,
    boundary: BoundaryMethod,
    exclusion: Exclusion,
) -> Result<LocalPolyFilter1D<T>, UnfoldError> {
    if !bandwidth.is_finite() || bandwidth < 0.0 {
        return Err(UnfoldError::InvalidBandwidth(bandwidth));
    }
    if n_bins == 0 {
        return Err(UnfoldError::InvalidParameter("filter needs at least one bin".into()));
    }
    if !bin_width.is_finite() || bin_width <= 0.0 {
        return Err(UnfoldError::InvalidParameter(format!(
            "bin width must be positive, got {bin_width}"
        )));
    }
    if taper.is_empty() {
        return Err(UnfoldError::InvalidParameter(
            "taper must have at least one coefficient".into(),
        ));
    }
    if let Some(bin) = exclusion.bin {
        if bin >= n_bins {
            return Err(UnfoldError::InvalidParameter(format!(
                "excluded bin {bin} is outside of {n_bins} bins"
            )));
        }
    }
    if bandwidth == 0.0 {
        return Ok(LocalPolyFilter1D::identity(n_bins));
    }

    let reach_f = Float::floor(kernel.support() * bandwidth / bin_width);
    let reach = if reach_f >= (2 * n_bins) as f64 {
        2 * n_bins
    } else {
        reach_f as usize
    };

    let mut weights = Matrix::zeros(n_bins, n_bins);
    let mut fit = LocalFit::with_degrees(taper.len());
    for center in 0..n_bins {
        fit.clear();
        for (pos, bin) in boundary.neighborhood(n_bins, center, reach) {
            if exclusion.bin == Some(bin) {
                continue;
            }
            if exclusion.central_point && pos == center as isize {
                continue;
            }
            let u = (pos - center as isize) as f64 * bin_width / bandwidth;
            let w = kernel.weight(u);
            if w > 0.0 {
                fit.push(u, w, bin);
            }
        }
        fit.orthonormalize();
        let row = weights.row_mut(center);
        for (j, &bin) in fit.bins.iter().enumerate() {
            row[bin] = row[bin] + lit::<T>(fit.row_weight(j, taper));
        }
    }
    LocalPolyFilter1D::from_matrix(weights)
}

/// Symmetric beta LOrPE filter on `n_bins` bins covering `[x_min, x_max)`.
///
/// `max_degree` may be fractional, see [`degree_taper`].
#[allow(clippy::too_many_arguments)]
pub fn symbeta_lorpe_filter_1d<T: FloatLinalg>(
    symbeta_power: i32,
    bandwidth: f64,
    max_degree: f64,
    n_bins: usize,
    x_min: f64,
    x_max: f64,
    boundary: BoundaryMethod,
    excluded_bin: Option<usize>,
    exclude_central_point: bool,
) -> Result<LocalPolyFilter1D<T>, UnfoldError> {
    if !(x_min.is_finite() && x_max.is_finite() && x_max > x_min) {
        return Err(UnfoldError::InvalidParameter(format!(
            "invalid interval [{x_min}, {x_max})"
        )));
    }
    if n_bins == 0 {
        return Err(UnfoldError::InvalidParameter("filter needs at least one bin".into()));
    }
    let taper = degree_taper(max_degree)?;
    lorpe_filter_1d(
        SymbetaKernel::new(symbeta_power),
        bandwidth,
        &taper,
        n_bins,
        (x_max - x_min) / n_bins as f64,
        boundary,
        Exclusion {
            bin: excluded_bin,
            central_point: exclude_central_point,
        },
    )
}

// ============================================================================
// Local Fit
// ============================================================================

/// Orthonormal polynomials on the points of one local fit.
struct LocalFit {
    max_degrees: usize,
    coords: Vec<f64>,
    kernel_weights: Vec<f64>,
    bins: Vec<usize>,
    // values[k][j] = P_k(x_j)
    values: Vec<Vec<f64>>,
    // value of P_k at the center
    at_center: Vec<f64>,
}

impl LocalFit {
    fn with_degrees(max_degrees: usize) -> Self {
        Self {
            max_degrees,
            coords: Vec::new(),
            kernel_weights: Vec::new(),
            bins: Vec::new(),
            values: Vec::new(),
            at_center: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.coords.clear();
        self.kernel_weights.clear();
        self.bins.clear();
        self.values.clear();
        self.at_center.clear();
    }

    fn push(&mut self, coord: f64, weight: f64, bin: usize) {
        self.coords.push(coord);
        self.kernel_weights.push(weight);
        self.bins.push(bin);
    }

    fn inner(&self, a: &[f64], b: &[f64]) -> f64 {
        self.kernel_weights
            .iter()
            .zip(a.iter().zip(b))
            .map(|(&w, (&x, &y))| w * x * y)
            .sum()
    }

    fn orthonormalize(&mut self) {
        let n_points = self.coords.len();
        let degrees = self.max_degrees.min(n_points);
        // coefficients[k][m]: P_k expressed in monomials x^m
        let mut coefficients: Vec<Vec<f64>> = Vec::with_capacity(degrees);

        for k in 0..degrees {
            let mut v: Vec<f64> = self.coords.iter().map(|&x| Float::powi(x, k as i32)).collect();
            let mut c = vec![0.0; degrees];
            c[k] = 1.0;
            let initial = Float::sqrt(self.inner(&v, &v));
            if initial <= 0.0 {
                break;
            }

            for _pass in 0..2 {
                for m in 0..self.values.len() {
                    let proj = self.inner(&v, &self.values[m]);
                    for (vj, &qj) in v.iter_mut().zip(&self.values[m]) {
                        *vj -= proj * qj;
                    }
                    for (cj, &qc) in c.iter_mut().zip(&coefficients[m]) {
                        *cj -= proj * qc;
                    }
                }
            }

            let norm = Float::sqrt(self.inner(&v, &v));
            if norm <= 1e-10 * initial {
                break;
            }
            v.iter_mut().for_each(|x| *x /= norm);
            c.iter_mut().for_each(|x| *x /= norm);
            self.at_center.push(c[0]);
            self.values.push(v);
            coefficients.push(c);
        }
    }

    fn row_weight(&self, j: usize, taper: &[f64]) -> f64 {
        let sum: f64 = self
            .values
            .iter()
            .zip(&self.at_center)
            .zip(taper)
            .map(|((q, &q0), &t)| t * q0 * q[j])
            .sum();
        self.kernel_weights[j] * sum
    }
}
