//! State and utilities shared by every unfolding engine.
//!
//! ## Purpose
//!
//! [`UnfoldBase`] owns the response operator and its efficiencies, the
//! optional initial approximation, and the handle to the smoothing filter.
//! It validates inputs against the response, synthesizes the uniform
//! starting point, builds observation covariance matrices and reports the
//! effective degrees of freedom of the filter and response.
//!
//! ## Design notes
//!
//! * **Generic response**: Dense and sparse responses go through the same
//!   [`LinearOperator`] interface.
//! * **Filter handle**: Filters are borrowed for the engine lifetime `'a`
//!   or shared through an `Arc` (see [`FilterRef`]).
//! * **Construction checks**: An invalid response or a unfolded cell with
//!   non-positive efficiency is rejected before the base exists.
//!
//! ## Invariants
//!
//! * Every efficiency is strictly positive.
//! * A stored filter always matches the unfolded shape.
//! * A stored initial approximation always matches the unfolded length and
//!   is a valid density.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::{sync::Arc, vec::Vec};

// Internal dependencies
use crate::algorithms::filter::{FilterRef, UnfoldingFilter};
use crate::algorithms::response::LinearOperator;
use crate::engine::validator::Validator;
use crate::evaluation::covariance::CovarianceModel;
use crate::evaluation::ndof::{
    NDOF_TOLERANCE, response_ndof, smoothed_response_ndof, smoothing_ndof,
};
use crate::math::density::{prob_delta, sum};
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::{count, lit};

// ============================================================================
// Unfold Base
// ============================================================================

/// Response, efficiencies, initial approximation and filter of an unfolder.
#[derive(Debug)]
pub struct UnfoldBase<'a, T: FloatLinalg, R> {
    response: R,
    efficiency: Vec<T>,
    initial_approximation: Option<Vec<T>>,
    filter: Option<FilterRef<'a, T>>,
    use_convolutions: bool,
}

impl<'a, T: FloatLinalg, R: LinearOperator<T>> UnfoldBase<'a, T, R> {
    /// Take ownership of `response` and compute the efficiencies.
    pub fn new(response: R) -> Result<Self, UnfoldError> {
        response.validate()?;
        let efficiency = response.efficiencies();
        if let Some(index) = efficiency.iter().position(|&e| !(e > T::zero())) {
            return Err(UnfoldError::NonPositiveEfficiency { index });
        }
        Ok(Self {
            response,
            efficiency,
            initial_approximation: None,
            filter: None,
            use_convolutions: false,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The response operator.
    pub fn response(&self) -> &R {
        &self.response
    }

    /// Per-cell efficiencies.
    pub fn efficiency(&self) -> &[T] {
        &self.efficiency
    }

    /// Number of observed cells.
    pub fn observed_len(&self) -> usize {
        self.response.observed_len()
    }

    /// Number of unfolded cells.
    pub fn unfolded_len(&self) -> usize {
        self.response.unfolded_len()
    }

    // ========================================================================
    // Initial Approximation
    // ========================================================================

    /// Use `approx` as the starting point of every subsequent unfold.
    pub fn set_initial_approximation(&mut self, approx: &[T]) -> Result<(), UnfoldError> {
        if approx.len() != self.unfolded_len() {
            return Err(UnfoldError::DimensionMismatch {
                what: "initial approximation",
                expected: self.unfolded_len(),
                got: approx.len(),
            });
        }
        Validator::validate_density(approx)?;
        self.initial_approximation = Some(approx.to_vec());
        Ok(())
    }

    /// Go back to the uniform starting point.
    pub fn clear_initial_approximation(&mut self) {
        self.initial_approximation = None;
    }

    /// The stored initial approximation, if any.
    pub fn initial_approximation(&self) -> Option<&[T]> {
        self.initial_approximation.as_deref()
    }

    /// Fill `out` with the flat approximation that folds to the observed total.
    ///
    /// Every cell gets `(Σ observed / mean efficiency) / n_unfolded`.
    pub fn build_uniform_initial_approximation(
        &self,
        observed: &[T],
        out: &mut [T],
    ) -> Result<(), UnfoldError> {
        Validator::validate_dimensions(
            observed.len(),
            out.len(),
            self.observed_len(),
            self.unfolded_len(),
        )?;
        let n = count::<T>(self.efficiency.len());
        let mean_eff = sum(&self.efficiency) / n;
        let value = sum(observed) / mean_eff / n;
        out.iter_mut().for_each(|v| *v = value);
        Ok(())
    }

    // ========================================================================
    // Filter
    // ========================================================================

    /// Borrow `filter` for smoothing.
    pub fn set_filter(&mut self, filter: &'a dyn UnfoldingFilter<T>) -> Result<(), UnfoldError> {
        self.replace_filter(Some(FilterRef::Borrowed(filter))).map(|_| ())
    }

    /// Share ownership of `filter` for smoothing.
    pub fn set_shared_filter(
        &mut self,
        filter: Arc<dyn UnfoldingFilter<T> + 'a>,
    ) -> Result<(), UnfoldError> {
        self.replace_filter(Some(FilterRef::Shared(filter))).map(|_| ())
    }

    /// Remove the filter.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Install `filter` (validated when present) and return the previous one.
    pub fn replace_filter(
        &mut self,
        filter: Option<FilterRef<'a, T>>,
    ) -> Result<Option<FilterRef<'a, T>>, UnfoldError> {
        if let Some(f) = &filter {
            Validator::validate_filter_shape(f.get().data_shape(), self.response.unfolded_shape())?;
        }
        Ok(core::mem::replace(&mut self.filter, filter))
    }

    /// The current filter handle.
    pub fn filter_ref(&self) -> Option<&FilterRef<'a, T>> {
        self.filter.as_ref()
    }

    /// The current filter; fails with [`UnfoldError::FilterNotSet`] if none is set.
    pub fn filter(&self) -> Result<&(dyn UnfoldingFilter<T> + 'a), UnfoldError> {
        self.filter
            .as_ref()
            .map(|f| f.get())
            .ok_or(UnfoldError::FilterNotSet)
    }

    /// Choose `convolve` (true) or `filter` (false) for smoothing.
    pub fn use_convolutions(&mut self, use_convolutions: bool) {
        self.use_convolutions = use_convolutions;
    }

    /// Whether smoothing uses `convolve`.
    pub fn using_convolutions(&self) -> bool {
        self.use_convolutions
    }

    // ========================================================================
    // Utilities
    // ========================================================================

    /// Normalized L1 distance between successive approximations.
    pub fn prob_delta(&self, prev: &[T], next: &[T]) -> T {
        prob_delta(prev, next)
    }

    /// Covariance of the observed data predicted to be `yhat`.
    pub fn observation_covariance(
        &self,
        yhat: &[T],
        model: CovarianceModel,
    ) -> Result<Matrix<T>, UnfoldError> {
        model.observation_covariance(yhat)
    }

    /// Smoothing operator `S` actually applied: `F` or `Fᵀ`.
    pub fn smoothing_matrix(&self) -> Result<Matrix<T>, UnfoldError> {
        let f = self.filter()?.filter_matrix();
        Ok(if self.use_convolutions { f.T() } else { f })
    }

    // ========================================================================
    // Degrees of Freedom
    // ========================================================================

    /// Effective rank `(entropic, trace)` of the smoothing operator.
    pub fn smoothing_ndof(&self) -> Result<(T, T), UnfoldError> {
        let f = self.filter()?.filter_matrix();
        Ok(smoothing_ndof(&f, self.use_convolutions, lit(NDOF_TOLERANCE))?.as_pair())
    }

    /// Effective rank `(entropic, trace)` of the response.
    pub fn response_ndof(&self) -> Result<(T, T), UnfoldError> {
        let r = self.response.dense_matrix();
        Ok(response_ndof(&r, lit(NDOF_TOLERANCE))?.as_pair())
    }

    /// Effective rank `(entropic, trace)` of the response composed with smoothing.
    pub fn smoothed_response_ndof(&self) -> Result<(T, T), UnfoldError> {
        let f = self.filter()?.filter_matrix();
        let r = self.response.dense_matrix();
        let rank = smoothed_response_ndof(&r, &f, self.use_convolutions, lit(NDOF_TOLERANCE))?;
        Ok(rank.as_pair())
    }
}
