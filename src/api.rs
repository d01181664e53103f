//! High-level API for smoothed EM unfolding.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry point. It implements
//! a fluent builder for the engine configuration that ends in `.build()`
//! (single-scale) or `.build_multiscale()` with the response of the problem.
//!
//! ## Design notes
//!
//! * **Ergonomic**: Fluent builder with sensible defaults for all parameters.
//! * **Validated**: Parameters are validated when the engine is built.
//! * **Type-Safe**: Generic over `Float` types for flexible precision.
//!
//! ### Configuration Flow
//!
//! 1. Create an [`EmUnfoldBuilder`] via `EmUnfold::new()`.
//! 2. Chain configuration methods (`.filter()`, `.max_iterations()`, etc.).
//! 3. Call `.build(response)` to get a [`SmoothedEmUnfold`] engine.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::{sync::Arc, vec::Vec};

// Internal dependencies
use crate::engine::preiterate::PreIterationStrategy;
use crate::engine::validator::Validator;
use crate::math::linalg::FloatLinalg;

// Publicly re-exported types
pub use crate::algorithms::filter::{DummyFilter, FilterRef, UnfoldingFilter};
pub use crate::algorithms::gaussian_response::{UniformBins, gaussian_response_matrix};
pub use crate::algorithms::lorpe::{LocalPolyFilter1D, symbeta_lorpe_filter_1d};
pub use crate::algorithms::provider::{
    FilterProvider, MemoizingSymbetaFilterProvider, SimpleSymbetaFilterProvider,
    SymbetaFilterParams,
};
pub use crate::algorithms::response::{DenseResponse, LinearOperator};
pub use crate::algorithms::sequential::SequentialFilterND;
pub use crate::algorithms::sparse::ResponseMatrix;
pub use crate::engine::executor::{
    MultiscaleEmUnfold1D, SmoothedEmSparseUnfoldND, SmoothedEmUnfold, SmoothedEmUnfold1D,
    SmoothedEmUnfoldND, UnfoldConfig, UnfoldOutput,
};
pub use crate::engine::preiterate::{MultiscaleConfig, MultiscalePreIteration, NoPreIteration};
pub use crate::evaluation::covariance::CovarianceModel;
pub use crate::math::boundary::BoundaryMethod;
pub use crate::math::matrix::Matrix;
pub use crate::primitives::errors::UnfoldError;

/// Fluent builder for configuring a smoothed EM unfolding engine.
#[derive(Debug, Clone)]
pub struct EmUnfoldBuilder<'a, T: FloatLinalg> {
    /// Iteration budget.
    pub max_iterations: Option<usize>,

    /// Convergence tolerance; negative values are clamped to zero.
    pub convergence_epsilon: Option<T>,

    /// Model the observed data as multinomial instead of Poisson.
    pub multinomial_covariance: Option<bool>,

    /// Smooth the returned iterate (default: true).
    pub smooth_last_iteration: Option<bool>,

    /// Smooth with `convolve` instead of `filter`.
    pub use_convolutions: Option<bool>,

    /// Stall detector threshold of the error propagation refinement.
    pub stall_threshold: Option<usize>,

    /// Smoothing filter.
    pub filter: Option<FilterRef<'a, T>>,

    /// Starting point of the iterations.
    pub initial_approximation: Option<Vec<T>>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub duplicate_param: Option<&'static str>,
}

impl<T: FloatLinalg> Default for EmUnfoldBuilder<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: FloatLinalg> EmUnfoldBuilder<'a, T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            max_iterations: None,
            convergence_epsilon: None,
            multinomial_covariance: None,
            smooth_last_iteration: None,
            use_convolutions: None,
            stall_threshold: None,
            filter: None,
            initial_approximation: None,
            duplicate_param: None,
        }
    }

    /// Set the iteration budget.
    pub fn max_iterations(mut self, n: usize) -> Self {
        if self.max_iterations.is_some() {
            self.duplicate_param = Some("max_iterations");
        }
        self.max_iterations = Some(n);
        self
    }

    /// Set the convergence tolerance.
    pub fn convergence_epsilon(mut self, epsilon: T) -> Self {
        if self.convergence_epsilon.is_some() {
            self.duplicate_param = Some("convergence_epsilon");
        }
        self.convergence_epsilon = Some(epsilon);
        self
    }

    /// Use the multinomial (true) or Poisson (false) observation covariance.
    pub fn multinomial_covariance(mut self, multinomial: bool) -> Self {
        if self.multinomial_covariance.is_some() {
            self.duplicate_param = Some("multinomial_covariance");
        }
        self.multinomial_covariance = Some(multinomial);
        self
    }

    /// Smooth the returned iterate (true) or add a final unsmoothed pass.
    pub fn smooth_last_iteration(mut self, smooth: bool) -> Self {
        if self.smooth_last_iteration.is_some() {
            self.duplicate_param = Some("smooth_last_iteration");
        }
        self.smooth_last_iteration = Some(smooth);
        self
    }

    /// Smooth with the filter's `convolve` method.
    pub fn use_convolutions(mut self, use_convolutions: bool) -> Self {
        if self.use_convolutions.is_some() {
            self.duplicate_param = Some("use_convolutions");
        }
        self.use_convolutions = Some(use_convolutions);
        self
    }

    /// Set the stall detector threshold of the error propagation refinement.
    pub fn stall_threshold(mut self, threshold: usize) -> Self {
        if self.stall_threshold.is_some() {
            self.duplicate_param = Some("stall_threshold");
        }
        self.stall_threshold = Some(threshold);
        self
    }

    /// Borrow the smoothing filter for the lifetime of the engine.
    pub fn filter(mut self, filter: &'a dyn UnfoldingFilter<T>) -> Self {
        if self.filter.is_some() {
            self.duplicate_param = Some("filter");
        }
        self.filter = Some(FilterRef::Borrowed(filter));
        self
    }

    /// Share ownership of the smoothing filter with the engine.
    pub fn shared_filter(mut self, filter: Arc<dyn UnfoldingFilter<T> + 'a>) -> Self {
        if self.filter.is_some() {
            self.duplicate_param = Some("filter");
        }
        self.filter = Some(FilterRef::Shared(filter));
        self
    }

    /// Start the iterations from `approx` instead of the uniform spectrum.
    pub fn initial_approximation(mut self, approx: Vec<T>) -> Self {
        if self.initial_approximation.is_some() {
            self.duplicate_param = Some("initial_approximation");
        }
        self.initial_approximation = Some(approx);
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build a single-scale engine around `response`.
    pub fn build<R: LinearOperator<T>>(
        self,
        response: R,
    ) -> Result<SmoothedEmUnfold<'a, T, R>, UnfoldError> {
        self.build_with(response, NoPreIteration)
    }

    /// Build an engine that pre-iterates with progressively narrower LOrPE filters.
    pub fn build_multiscale<R: LinearOperator<T>>(
        self,
        response: R,
        multiscale: MultiscaleConfig,
    ) -> Result<SmoothedEmUnfold<'a, T, R, MultiscalePreIteration<T>>, UnfoldError> {
        let pre = MultiscalePreIteration::new(multiscale)?;
        self.build_with(response, pre)
    }

    /// Build an engine with a custom pre-iteration strategy.
    pub fn build_with<R, P>(
        self,
        response: R,
        pre_iteration: P,
    ) -> Result<SmoothedEmUnfold<'a, T, R, P>, UnfoldError>
    where
        R: LinearOperator<T>,
        P: PreIterationStrategy<T>,
    {
        Validator::validate_no_duplicates(self.duplicate_param)?;

        let defaults = UnfoldConfig::<T>::default();
        let config = UnfoldConfig {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            convergence_epsilon: self
                .convergence_epsilon
                .unwrap_or(defaults.convergence_epsilon),
            covariance_model: self
                .multinomial_covariance
                .map(CovarianceModel::from_multinomial)
                .unwrap_or(defaults.covariance_model),
            smooth_last_iteration: self
                .smooth_last_iteration
                .unwrap_or(defaults.smooth_last_iteration),
            use_convolutions: self.use_convolutions.unwrap_or(defaults.use_convolutions),
            stall_threshold: self.stall_threshold.unwrap_or(defaults.stall_threshold),
        };

        let mut engine =
            SmoothedEmUnfold::with_config(response, self.filter, config, pre_iteration)?;
        if let Some(approx) = &self.initial_approximation {
            engine.set_initial_approximation(approx)?;
        }
        Ok(engine)
    }
}
