//! Pre-iteration strategies run before the main EM loop.
//!
//! ## Purpose
//!
//! With a narrow response, plain smoothed EM can take many iterations to
//! move mass across the spectrum. A [`PreIterationStrategy`] gets a chance
//! to advance the approximation first, for example with a sequence of
//! progressively narrower filters ([`MultiscalePreIteration`]). The number
//! of updates it makes is charged to the iteration budget.
//!
//! ## Design notes
//!
//! * **Stepper**: Strategies never see the engine; they drive an
//!   [`EmStepper`] that exposes single EM steps and filter replacement.
//! * **Filter restore**: The multiscale strategy always reinstalls the
//!   filter it found, also when a stage fails.
//!
//! ## Invariants
//!
//! * Strategies make at most `max_iterations` updates.
//! * After `pre_iterate` returns, the "next" buffer holds the approximation
//!   the main loop continues from.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::filter::FilterRef;
use crate::algorithms::provider::{
    FilterProvider, MemoizingSymbetaFilterProvider, SymbetaFilterParams,
};
use crate::algorithms::response::LinearOperator;
use crate::engine::base::UnfoldBase;
use crate::engine::executor::em_update;
use crate::engine::validator::Validator;
use crate::engine::workspace::EmWorkspace;
use crate::math::boundary::BoundaryMethod;
use crate::math::density::prob_delta;
use crate::math::linalg::FloatLinalg;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::to_f64;

// ============================================================================
// EM Stepper
// ============================================================================

/// Single-step access to a running unfold.
pub struct EmStepper<'s, 'a, T: FloatLinalg, R> {
    base: &'s mut UnfoldBase<'a, T, R>,
    workspace: &'s mut EmWorkspace<T>,
    normfactor: &'s mut T,
    observed: &'s [T],
    max_iterations: usize,
    epsilon: T,
}

impl<'s, 'a, T: FloatLinalg, R: LinearOperator<T>> EmStepper<'s, 'a, T, R> {
    pub(crate) fn new(
        base: &'s mut UnfoldBase<'a, T, R>,
        workspace: &'s mut EmWorkspace<T>,
        normfactor: &'s mut T,
        observed: &'s [T],
        max_iterations: usize,
        epsilon: T,
    ) -> Self {
        Self {
            base,
            workspace,
            normfactor,
            observed,
            max_iterations,
            epsilon,
        }
    }

    /// Total iteration budget of the unfold.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Convergence tolerance of the unfold.
    pub fn epsilon(&self) -> T {
        self.epsilon
    }

    /// Number of unfolded cells.
    pub fn unfolded_len(&self) -> usize {
        self.base.unfolded_len()
    }

    /// Current approximation.
    pub fn approximation(&self) -> &[T] {
        self.workspace.approx.next()
    }

    /// Run one smoothed EM update and return the distance moved.
    pub fn step(&mut self) -> Result<T, UnfoldError> {
        self.workspace.approx.swap();
        if let Some(norm) = em_update(self.base, self.workspace, self.observed, true)? {
            *self.normfactor = norm;
        }
        Ok(prob_delta(
            self.workspace.approx.prev(),
            self.workspace.approx.next(),
        ))
    }

    /// The filter currently installed.
    pub fn filter_ref(&self) -> Option<&FilterRef<'a, T>> {
        self.base.filter_ref()
    }

    /// Install `filter` and return the previous one.
    pub fn replace_filter(
        &mut self,
        filter: Option<FilterRef<'a, T>>,
    ) -> Result<Option<FilterRef<'a, T>>, UnfoldError> {
        self.base.replace_filter(filter)
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Work done on the approximation before the main EM loop.
pub trait PreIterationStrategy<T: FloatLinalg> {
    /// Advance the approximation held by `stepper`; returns the number of
    /// EM updates made.
    fn pre_iterate<'a, R: LinearOperator<T>>(
        &mut self,
        stepper: &mut EmStepper<'_, 'a, T, R>,
    ) -> Result<usize, UnfoldError>;
}

/// Start the main loop right away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPreIteration;

impl<T: FloatLinalg> PreIterationStrategy<T> for NoPreIteration {
    fn pre_iterate<'a, R: LinearOperator<T>>(
        &mut self,
        _stepper: &mut EmStepper<'_, 'a, T, R>,
    ) -> Result<usize, UnfoldError> {
        Ok(0)
    }
}

// ============================================================================
// Multiscale
// ============================================================================

/// Filter family and schedule of the multiscale pre-iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiscaleConfig {
    /// Kernel power of the symmetric beta family; negative selects the Gaussian.
    pub symbeta_power: i32,

    /// LOrPE polynomial degree, possibly fractional.
    pub max_degree: f64,

    /// Lower edge of the unfolded axis.
    pub x_min: f64,

    /// Upper edge of the unfolded axis.
    pub x_max: f64,

    /// Boundary treatment of the filters.
    pub boundary: BoundaryMethod,

    /// Narrowest bandwidth.
    pub min_bandwidth: f64,

    /// Widest bandwidth.
    pub max_bandwidth: f64,

    /// Number of filters, with log-equidistant bandwidths.
    pub n_filters: usize,

    /// EM updates per filter.
    pub iters_per_filter: usize,
}

impl MultiscaleConfig {
    /// Check the interval, degree and bandwidth range.
    pub fn validate(&self) -> Result<(), UnfoldError> {
        Validator::validate_interval(self.x_min, self.x_max)?;
        Validator::validate_degree(self.max_degree)?;
        Validator::validate_bandwidth_range(self.min_bandwidth, self.max_bandwidth, self.n_filters)
    }
}

/// Bandwidths equidistant in log space, widest first.
///
/// A single filter gets the geometric mean of the range.
pub fn log_equidistant_bandwidths(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![Float::sqrt(min * max)],
        _ => {
            let (lmin, lmax) = (Float::ln(min), Float::ln(max));
            let step = (lmax - lmin) / (n - 1) as f64;
            (0..n).map(|i| Float::exp(lmax - step * i as f64)).collect()
        }
    }
}

/// Smoothed EM updates with progressively narrower LOrPE filters.
#[derive(Debug)]
pub struct MultiscalePreIteration<T> {
    config: MultiscaleConfig,
    bandwidths: Vec<f64>,
    provider: MemoizingSymbetaFilterProvider<T>,
}

impl<T: FloatLinalg> MultiscalePreIteration<T> {
    /// Validate `config` and precompute the bandwidth schedule.
    pub fn new(config: MultiscaleConfig) -> Result<Self, UnfoldError> {
        config.validate()?;
        let bandwidths = log_equidistant_bandwidths(
            config.min_bandwidth,
            config.max_bandwidth,
            config.n_filters,
        );
        Ok(Self {
            config,
            bandwidths,
            provider: MemoizingSymbetaFilterProvider::new(),
        })
    }

    /// The configuration.
    pub fn config(&self) -> &MultiscaleConfig {
        &self.config
    }

    /// Bandwidth schedule, widest first.
    pub fn bandwidths(&self) -> &[f64] {
        &self.bandwidths
    }

    /// Filter cache shared by all unfolds.
    pub fn provider(&self) -> &MemoizingSymbetaFilterProvider<T> {
        &self.provider
    }

    /// Filter cache, mutably.
    pub fn provider_mut(&mut self) -> &mut MemoizingSymbetaFilterProvider<T> {
        &mut self.provider
    }

    fn run_stages<'a, R: LinearOperator<T>>(
        &mut self,
        stepper: &mut EmStepper<'_, 'a, T, R>,
    ) -> Result<usize, UnfoldError> {
        let cfg = self.config;
        let n_bins = stepper.unfolded_len();
        let bin_width = (cfg.x_max - cfg.x_min) / n_bins as f64;
        let budget = stepper.max_iterations();
        let epsilon = stepper.epsilon();

        let mut done = 0;
        for (stage, &bandwidth) in self.bandwidths.iter().enumerate() {
            if done >= budget {
                break;
            }
            let params = SymbetaFilterParams::new(
                cfg.symbeta_power,
                bandwidth,
                cfg.max_degree,
                n_bins,
                bin_width,
                cfg.boundary,
            )?;
            let filter = self.provider.provide_filter(&params)?;
            stepper.replace_filter(Some(FilterRef::Shared(filter)))?;

            let mut made = 0;
            let mut delta = T::zero();
            while made < cfg.iters_per_filter && done < budget {
                delta = stepper.step()?;
                made += 1;
                done += 1;
                if delta <= epsilon {
                    break;
                }
            }
            log::debug!(
                "multiscale stage {stage}: bandwidth {bandwidth}, {made} iterations, delta {}",
                to_f64(delta)
            );
        }
        Ok(done)
    }
}

impl<T: FloatLinalg> PreIterationStrategy<T> for MultiscalePreIteration<T> {
    fn pre_iterate<'a, R: LinearOperator<T>>(
        &mut self,
        stepper: &mut EmStepper<'_, 'a, T, R>,
    ) -> Result<usize, UnfoldError> {
        let original = stepper.filter_ref().cloned();
        let result = self.run_stages(stepper);
        stepper.replace_filter(original)?;
        result
    }
}
