//! Execution engine for smoothed expectation-maximization unfolding.
//!
//! ## Purpose
//!
//! This module provides [`SmoothedEmUnfold`], the engine that runs the
//! D'Agostini (EM) iteration with a smoothing step after every update,
//! checks convergence, optionally performs a final unsmoothed pass, and
//! propagates the observation covariance to the unfolded result.
//!
//! ## Design notes
//!
//! * **One engine**: Dense, sparse, 1-D and N-D problems share this engine
//!   through the [`LinearOperator`] and [`UnfoldingFilter`] interfaces.
//! * **Pre-iteration hook**: A [`PreIterationStrategy`] type parameter runs
//!   before the main loop; its iterations count against the budget.
//! * **Reusable buffers**: All per-iteration storage lives in an
//!   [`EmWorkspace`] that survives between calls.
//! * **Diagnostics**: Iteration counts and the last smoothing norm factor
//!   are kept as engine state after every call.
//!
//! ## Key concepts
//!
//! * **EM update**: `yhat = R·prev`, `ratio = observed / yhat`,
//!   `raw = prev · (Rᵀ·ratio) / efficiency`.
//! * **Smoothing**: `next = F·raw` (or `Fᵀ·raw`), clipped at zero and
//!   rescaled to the total of `raw`.
//! * **Convergence**: normalized L1 distance between successive iterates
//!   at most `ε`.
//!
//! ## Invariants
//!
//! * Validation failures leave the outputs untouched.
//! * Iterations made (pre-iteration included) never exceed `max_iterations`.
//!
//! ## Non-goals
//!
//! * Bandwidth selection.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// Internal dependencies
use crate::algorithms::filter::{FilterRef, UnfoldingFilter};
use crate::algorithms::response::{DenseResponse, LinearOperator};
use crate::algorithms::sparse::ResponseMatrix;
use crate::engine::base::UnfoldBase;
use crate::engine::preiterate::{
    EmStepper, MultiscalePreIteration, NoPreIteration, PreIterationStrategy,
};
use crate::engine::propagation::{
    DEFAULT_STALL_THRESHOLD, Propagation, PropagationInput, error_propagation_matrix,
};
use crate::engine::validator::Validator;
use crate::engine::workspace::EmWorkspace;
use crate::evaluation::covariance::CovarianceModel;
use crate::math::density::{normalize_as_density, prob_delta, sum};
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::numeric::{lit, to_f64};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the EM engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnfoldConfig<T> {
    /// Iteration budget for the EM loop and the error propagation refinement.
    pub max_iterations: usize,

    /// Convergence tolerance, never negative.
    pub convergence_epsilon: T,

    /// Counting statistics of the observed data.
    pub covariance_model: CovarianceModel,

    /// Return the smoothed iterate (true) or add a final unsmoothed pass.
    pub smooth_last_iteration: bool,

    /// Smooth with `convolve` instead of `filter`.
    pub use_convolutions: bool,

    /// Refinement iterations before stall detection starts.
    pub stall_threshold: usize,
}

impl<T: FloatLinalg> Default for UnfoldConfig<T> {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            convergence_epsilon: lit(1.0e-10),
            covariance_model: CovarianceModel::Poisson,
            smooth_last_iteration: true,
            use_convolutions: false,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Result of [`SmoothedEmUnfold::unfold_to_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnfoldOutput<T> {
    /// Unfolded spectrum.
    pub unfolded: Vec<T>,

    /// Covariance of the unfolded spectrum, when requested.
    pub covariance: Option<Matrix<T>>,

    /// Whether the EM loop (and error propagation, if run) converged.
    pub converged: bool,

    /// EM iterations made, pre-iteration included.
    pub iterations: usize,

    /// Error propagation refinement iterations.
    pub ep_iterations: usize,

    /// Norm factor applied by the last smoothing step.
    pub normfactor: T,
}

// ============================================================================
// EM Update
// ============================================================================

/// One EM update from `workspace.approx.prev()` into `workspace.approx.next()`.
///
/// Returns the smoothing norm factor when `smoothing` is set.
pub(crate) fn em_update<'a, T, R>(
    base: &UnfoldBase<'a, T, R>,
    workspace: &mut EmWorkspace<T>,
    observed: &[T],
    smoothing: bool,
) -> Result<Option<T>, UnfoldError>
where
    T: FloatLinalg,
    R: LinearOperator<T>,
{
    let EmWorkspace {
        approx,
        yhat,
        num,
        raw,
    } = workspace;
    let (prev, next) = approx.split();
    let response = base.response();

    response.times_vector(prev, yhat)?;
    for (bin, (y, &obs)) in yhat.iter_mut().zip(observed).enumerate() {
        if obs > T::zero() {
            if *y <= T::zero() {
                return Err(UnfoldError::NonPositivePrediction {
                    bin,
                    predicted: to_f64(*y),
                    observed: to_f64(obs),
                });
            }
            *y = obs / *y;
        } else {
            *y = T::zero();
        }
    }
    response.row_multiply(yhat, num)?;

    let eff = base.efficiency();
    let out: &mut [T] = if smoothing { &mut raw[..] } else { &mut *next };
    for (((o, &p), &n), &e) in out.iter_mut().zip(prev.iter()).zip(num.iter()).zip(eff) {
        *o = p * n / e;
    }
    if !smoothing {
        return Ok(None);
    }

    let filter = base.filter()?;
    if base.using_convolutions() {
        filter.convolve(raw, next)?;
    } else {
        filter.filter(raw, next)?;
    }
    let total = sum(raw);
    let norm = normalize_as_density(next, T::one() / total)?;
    Ok(Some(norm))
}

// ============================================================================
// Engine
// ============================================================================

/// Smoothed EM unfolding engine.
#[derive(Debug)]
pub struct SmoothedEmUnfold<'a, T: FloatLinalg, R, P = NoPreIteration> {
    base: UnfoldBase<'a, T, R>,
    config: UnfoldConfig<T>,
    pre_iteration: P,
    workspace: EmWorkspace<T>,
    last_iterations: usize,
    last_ep_iterations: usize,
    last_normfactor: T,
}

impl<'a, T, R> SmoothedEmUnfold<'a, T, R, NoPreIteration>
where
    T: FloatLinalg,
    R: LinearOperator<T>,
{
    /// Engine with default configuration and a borrowed filter.
    pub fn new(response: R, filter: &'a dyn UnfoldingFilter<T>) -> Result<Self, UnfoldError> {
        Self::with_config(
            response,
            Some(FilterRef::Borrowed(filter)),
            UnfoldConfig::default(),
            NoPreIteration,
        )
    }
}

impl<'a, T, R, P> SmoothedEmUnfold<'a, T, R, P>
where
    T: FloatLinalg,
    R: LinearOperator<T>,
    P: PreIterationStrategy<T>,
{
    /// Engine with explicit configuration and pre-iteration strategy.
    pub fn with_config(
        response: R,
        filter: Option<FilterRef<'a, T>>,
        config: UnfoldConfig<T>,
        pre_iteration: P,
    ) -> Result<Self, UnfoldError> {
        Validator::validate_stall_threshold(config.stall_threshold)?;
        let mut base = UnfoldBase::new(response)?;
        base.replace_filter(filter)?;
        base.use_convolutions(config.use_convolutions);
        let workspace = EmWorkspace::new(base.observed_len(), base.unfolded_len());
        let mut engine = Self {
            base,
            config,
            pre_iteration,
            workspace,
            last_iterations: 0,
            last_ep_iterations: 0,
            last_normfactor: T::one(),
        };
        engine.set_convergence_epsilon(config.convergence_epsilon);
        Ok(engine)
    }

    // ========================================================================
    // Base Access
    // ========================================================================

    /// Shared unfolding state.
    pub fn base(&self) -> &UnfoldBase<'a, T, R> {
        &self.base
    }

    /// Shared unfolding state, mutably.
    pub fn base_mut(&mut self) -> &mut UnfoldBase<'a, T, R> {
        &mut self.base
    }

    /// The pre-iteration strategy.
    pub fn pre_iteration(&self) -> &P {
        &self.pre_iteration
    }

    /// Borrow `filter` for smoothing.
    pub fn set_filter(&mut self, filter: &'a dyn UnfoldingFilter<T>) -> Result<(), UnfoldError> {
        self.base.set_filter(filter)
    }

    /// Use `approx` as the starting point of every subsequent unfold.
    pub fn set_initial_approximation(&mut self, approx: &[T]) -> Result<(), UnfoldError> {
        self.base.set_initial_approximation(approx)
    }

    /// Choose `convolve` (true) or `filter` (false) for smoothing.
    pub fn use_convolutions(&mut self, use_convolutions: bool) {
        self.config.use_convolutions = use_convolutions;
        self.base.use_convolutions(use_convolutions);
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Current configuration.
    pub fn config(&self) -> &UnfoldConfig<T> {
        &self.config
    }

    /// Set the iteration budget.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    /// Iteration budget.
    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    /// Set the convergence tolerance; negative values are clamped to zero.
    pub fn set_convergence_epsilon(&mut self, epsilon: T) {
        self.config.convergence_epsilon = if epsilon > T::zero() {
            epsilon
        } else {
            T::zero()
        };
    }

    /// Convergence tolerance.
    pub fn convergence_epsilon(&self) -> T {
        self.config.convergence_epsilon
    }

    /// Model the observed data as multinomial (true) or Poisson (false).
    pub fn use_multinomial_covariance(&mut self, multinomial: bool) {
        self.config.covariance_model = CovarianceModel::from_multinomial(multinomial);
    }

    /// Whether the observed data are modeled as multinomial.
    pub fn using_multinomial_covariance(&self) -> bool {
        self.config.covariance_model.is_multinomial()
    }

    /// Return the smoothed iterate (true) or add a final unsmoothed pass.
    pub fn smooth_last_iteration(&mut self, smooth: bool) {
        self.config.smooth_last_iteration = smooth;
    }

    /// Whether the returned iterate is smoothed.
    pub fn smoothing_last_iteration(&self) -> bool {
        self.config.smooth_last_iteration
    }

    /// Set the stall detector threshold of the error propagation refinement.
    pub fn set_stall_threshold(&mut self, threshold: usize) -> Result<(), UnfoldError> {
        Validator::validate_stall_threshold(threshold)?;
        self.config.stall_threshold = threshold;
        Ok(())
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// EM iterations made by the last unfold, pre-iteration included.
    pub fn last_n_iterations(&self) -> usize {
        self.last_iterations
    }

    /// Error propagation refinement iterations made by the last unfold.
    pub fn last_ep_iterations(&self) -> usize {
        self.last_ep_iterations
    }

    /// Norm factor applied by the last smoothing step.
    pub fn last_smoothing_normfactor(&self) -> T {
        self.last_normfactor
    }

    // ========================================================================
    // Main Algorithmic Logic
    // ========================================================================

    /// Unfold `observed` into `unfolded`.
    ///
    /// When `unfolded_covariance` is given it receives the propagated
    /// covariance, computed from `observation_covariance` or, if that is
    /// `None`, from the configured covariance model. Returns whether the
    /// iterations converged; non-convergence is not an error.
    pub fn unfold(
        &mut self,
        observed: &[T],
        observation_covariance: Option<&Matrix<T>>,
        unfolded: &mut [T],
        unfolded_covariance: Option<&mut Matrix<T>>,
    ) -> Result<bool, UnfoldError> {
        let n_obs = self.base.observed_len();
        let n_unf = self.base.unfolded_len();
        Validator::validate_dimensions(observed.len(), unfolded.len(), n_obs, n_unf)?;
        Validator::validate_density(observed)?;
        if let Some(cov) = observation_covariance {
            Validator::validate_covariance(cov, n_obs)?;
        }

        self.last_normfactor = T::one();
        self.last_ep_iterations = 0;
        self.workspace.ensure_capacity(n_obs, n_unf);
        match self.base.initial_approximation() {
            Some(approx) => self.workspace.approx.load_next(approx),
            None => self
                .base
                .build_uniform_initial_approximation(observed, self.workspace.approx.next_mut())?,
        }

        let max_iterations = self.config.max_iterations;
        let epsilon = self.config.convergence_epsilon;

        let pre = {
            let mut stepper = EmStepper::new(
                &mut self.base,
                &mut self.workspace,
                &mut self.last_normfactor,
                observed,
                max_iterations,
                epsilon,
            );
            self.pre_iteration.pre_iterate(&mut stepper)?
        };

        let mut iterations = pre.min(max_iterations);
        let mut converged = false;
        let mut delta = T::zero();
        while iterations < max_iterations && !converged {
            self.workspace.approx.swap();
            if let Some(norm) = em_update(&self.base, &mut self.workspace, observed, true)? {
                self.last_normfactor = norm;
            }
            delta = prob_delta(self.workspace.approx.prev(), self.workspace.approx.next());
            converged = delta <= epsilon;
            iterations += 1;
        }
        self.last_iterations = iterations;
        log::debug!(
            "EM loop: {iterations} iterations ({pre} pre), delta {}, converged = {converged}",
            to_f64(delta)
        );

        let smooth_last = self.config.smooth_last_iteration;
        if !smooth_last {
            self.workspace.approx.swap();
            em_update(&self.base, &mut self.workspace, observed, false)?;
        }

        unfolded.copy_from_slice(self.workspace.approx.next());

        if let Some(cov_out) = unfolded_covariance {
            let smoothed: Vec<T> = if smooth_last {
                self.workspace.approx.next().to_vec()
            } else {
                self.workspace.approx.prev().to_vec()
            };
            let mut yhat = vec![T::zero(); n_obs];
            self.base.response().times_vector(&smoothed, &mut yhat)?;

            let propagation = self.error_propagation_matrix(
                observed,
                &smoothed,
                &yhat,
                self.last_normfactor,
                smooth_last,
            )?;
            converged = converged && propagation.converged;
            self.last_ep_iterations = propagation.iterations;

            *cov_out = match observation_covariance {
                Some(sigma) => propagation.jacobian.sandwich(sigma)?,
                None => {
                    if !smooth_last {
                        self.base
                            .response()
                            .times_vector(self.workspace.approx.next(), &mut yhat)?;
                    }
                    let sigma = self
                        .base
                        .observation_covariance(&yhat, self.config.covariance_model)?;
                    propagation.jacobian.sandwich(&sigma)?
                }
            };
        }

        Ok(converged)
    }

    /// Unfold and collect the result with its diagnostics.
    pub fn unfold_to_result(
        &mut self,
        observed: &[T],
        observation_covariance: Option<&Matrix<T>>,
        want_covariance: bool,
    ) -> Result<UnfoldOutput<T>, UnfoldError> {
        let mut unfolded = vec![T::zero(); self.base.unfolded_len()];
        let mut covariance = want_covariance.then(Matrix::default);
        let converged = self.unfold(
            observed,
            observation_covariance,
            &mut unfolded,
            covariance.as_mut(),
        )?;
        Ok(UnfoldOutput {
            unfolded,
            covariance,
            converged,
            iterations: self.last_iterations,
            ep_iterations: self.last_ep_iterations,
            normfactor: self.last_normfactor,
        })
    }

    /// Perform a single EM update from `prev` into `next`.
    pub fn update(
        &mut self,
        observed: &[T],
        prev: &[T],
        next: &mut [T],
        smoothing: bool,
    ) -> Result<(), UnfoldError> {
        let n_obs = self.base.observed_len();
        let n_unf = self.base.unfolded_len();
        Validator::validate_dimensions(observed.len(), prev.len(), n_obs, n_unf)?;
        Validator::validate_dimensions(observed.len(), next.len(), n_obs, n_unf)?;

        self.workspace.ensure_capacity(n_obs, n_unf);
        self.workspace.approx.load_next(prev);
        self.workspace.approx.swap();
        if let Some(norm) = em_update(&self.base, &mut self.workspace, observed, smoothing)? {
            self.last_normfactor = norm;
        }
        next.copy_from_slice(self.workspace.approx.next());
        Ok(())
    }

    /// Jacobian of the unfolded result with respect to the observed data,
    /// linearized at the smoothed spectrum `unfolded` with `yhat = R · unfolded`.
    pub fn error_propagation_matrix(
        &self,
        observed: &[T],
        unfolded: &[T],
        yhat: &[T],
        norm: T,
        smooth_last: bool,
    ) -> Result<Propagation<T>, UnfoldError> {
        let response = self.base.response().dense_matrix();
        let smoothing = self.base.smoothing_matrix()?;
        error_propagation_matrix(&PropagationInput {
            response: &response,
            efficiency: self.base.efficiency(),
            smoothing: &smoothing,
            observed,
            unfolded,
            yhat,
            norm,
            smooth_last,
            max_iterations: self.config.max_iterations,
            epsilon: self.config.convergence_epsilon,
            stall_threshold: self.config.stall_threshold,
        })
    }

    // ========================================================================
    // Degrees of Freedom
    // ========================================================================

    /// Effective rank `(entropic, trace)` of the smoothing operator.
    pub fn smoothing_ndof(&self) -> Result<(T, T), UnfoldError> {
        self.base.smoothing_ndof()
    }

    /// Effective rank `(entropic, trace)` of the response.
    pub fn response_ndof(&self) -> Result<(T, T), UnfoldError> {
        self.base.response_ndof()
    }

    /// Effective rank `(entropic, trace)` of the smoothed response.
    pub fn smoothed_response_ndof(&self) -> Result<(T, T), UnfoldError> {
        self.base.smoothed_response_ndof()
    }
}

// ============================================================================
// Aliases
// ============================================================================

/// One-dimensional unfolding with a dense response.
pub type SmoothedEmUnfold1D<'a, T> = SmoothedEmUnfold<'a, T, DenseResponse<T>>;

/// Multi-dimensional unfolding with a dense response.
pub type SmoothedEmUnfoldND<'a, T> = SmoothedEmUnfold<'a, T, DenseResponse<T>>;

/// Multi-dimensional unfolding with a sparse response.
pub type SmoothedEmSparseUnfoldND<'a, T> = SmoothedEmUnfold<'a, T, ResponseMatrix<T>>;

/// One-dimensional unfolding with multiscale pre-iteration.
pub type MultiscaleEmUnfold1D<'a, T> =
    SmoothedEmUnfold<'a, T, DenseResponse<T>, MultiscalePreIteration<T>>;
