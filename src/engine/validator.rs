//! Input validation for unfolding configuration and data.
//!
//! ## Purpose
//!
//! This module checks observed spectra, initial approximations, covariance
//! matrices, filters and multiscale bandwidth ranges before the engine
//! touches any state.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: Validation stops at the first error encountered.
//! * **Efficiency**: Checks are ordered from cheap to expensive.
//! * **Generics**: Validation is generic over `Float` types.
//!
//! ## Invariants
//!
//! * Every failure is an invalid-argument class [`UnfoldError`].
//! * Validation is side-effect free.
//!
//! ## Non-goals
//!
//! * This module does not correct invalid inputs.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::format;
#[cfg(feature = "std")]
use std::format;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::lorpe::MAX_POLY_DEGREE;
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::to_f64;
use crate::primitives::shape::format_shape;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for unfolding inputs.
///
/// All methods return `Result<(), UnfoldError>` and fail fast upon
/// identifying the first violation.
pub struct Validator;

impl Validator {
    // ========================================================================
    // Data Validation
    // ========================================================================

    /// Validate observed and unfolded buffer lengths against the response.
    pub fn validate_dimensions(
        len_observed: usize,
        len_unfolded: usize,
        expected_observed: usize,
        expected_unfolded: usize,
    ) -> Result<(), UnfoldError> {
        if len_observed != expected_observed {
            return Err(UnfoldError::DimensionMismatch {
                what: "observed array",
                expected: expected_observed,
                got: len_observed,
            });
        }
        if len_unfolded != expected_unfolded {
            return Err(UnfoldError::DimensionMismatch {
                what: "unfolded array",
                expected: expected_unfolded,
                got: len_unfolded,
            });
        }
        Ok(())
    }

    /// Validate that `values` can be treated as a density.
    ///
    /// Entries must be finite and non-negative and the sum must be positive.
    pub fn validate_density<T: Float>(values: &[T]) -> Result<(), UnfoldError> {
        if values.is_empty() {
            return Err(UnfoldError::EmptyInput);
        }

        let mut total = T::zero();
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(UnfoldError::InvalidParameter(format!(
                    "element {i} is {}",
                    to_f64(v)
                )));
            }
            if v < T::zero() {
                return Err(UnfoldError::NegativeCount {
                    index: i,
                    value: to_f64(v),
                });
            }
            total = total + v;
        }
        if total == T::zero() {
            return Err(UnfoldError::ZeroSum);
        }
        Ok(())
    }

    /// Validate the shape of a user-supplied observation covariance matrix.
    pub fn validate_covariance<T: FloatLinalg>(
        covariance: &Matrix<T>,
        len_observed: usize,
    ) -> Result<(), UnfoldError> {
        if covariance.n_rows() != len_observed || covariance.n_cols() != len_observed {
            return Err(UnfoldError::InvalidCovariance {
                rows: covariance.n_rows(),
                cols: covariance.n_cols(),
                expected: len_observed,
            });
        }
        Ok(())
    }

    /// Validate that a filter operates on the unfolded space.
    pub fn validate_filter_shape(
        filter_shape: &[usize],
        unfolded_shape: &[usize],
    ) -> Result<(), UnfoldError> {
        if filter_shape != unfolded_shape {
            return Err(UnfoldError::ShapeMismatch {
                what: "filter",
                expected: format_shape(unfolded_shape),
                got: format_shape(filter_shape),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Parameter Validation
    // ========================================================================

    /// Validate the multiscale bandwidth range.
    pub fn validate_bandwidth_range(
        min_bandwidth: f64,
        max_bandwidth: f64,
        n_filters: usize,
    ) -> Result<(), UnfoldError> {
        if !min_bandwidth.is_finite() || min_bandwidth <= 0.0 {
            return Err(UnfoldError::InvalidBandwidth(min_bandwidth));
        }
        if !max_bandwidth.is_finite() || max_bandwidth < min_bandwidth {
            return Err(UnfoldError::InvalidBandwidth(max_bandwidth));
        }
        if n_filters == 0 {
            return Err(UnfoldError::InvalidParameter(
                "number of multiscale filters must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Validate the unfolded interval of a LOrPE filter family.
    pub fn validate_interval(x_min: f64, x_max: f64) -> Result<(), UnfoldError> {
        if !(x_min.is_finite() && x_max.is_finite() && x_max > x_min) {
            return Err(UnfoldError::InvalidParameter(format!(
                "invalid unfolded interval [{x_min}, {x_max})"
            )));
        }
        Ok(())
    }

    /// Validate a LOrPE polynomial degree.
    pub fn validate_degree(degree: f64) -> Result<(), UnfoldError> {
        if !degree.is_finite() || !(0.0..=MAX_POLY_DEGREE).contains(&degree) {
            return Err(UnfoldError::InvalidParameter(format!(
                "polynomial degree must be in [0, {MAX_POLY_DEGREE}], got {degree}"
            )));
        }
        Ok(())
    }

    /// Validate the stall-detector threshold.
    pub fn validate_stall_threshold(threshold: usize) -> Result<(), UnfoldError> {
        if threshold == 0 {
            return Err(UnfoldError::InvalidParameter("stall threshold must be positive".into()));
        }
        Ok(())
    }

    /// Validate that a builder parameter was set only once.
    pub fn validate_no_duplicates(duplicate: Option<&'static str>) -> Result<(), UnfoldError> {
        if let Some(parameter) = duplicate {
            return Err(UnfoldError::DuplicateParameter { parameter });
        }
        Ok(())
    }
}
