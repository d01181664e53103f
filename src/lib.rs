//! # emunfold — Smoothed Expectation-Maximization Unfolding for Rust
//!
//! Unfolding recovers a spectrum `u` from observed counts `y` distorted by a
//! known detector response `R` (`y ≈ R·u`). This crate implements the
//! D'Agostini expectation-maximization iteration with a smoothing step after
//! every update (the "smoothed EM" or EMS method), linear error propagation of
//! the observation covariance to the unfolded result, and a multiscale
//! variant that speeds up convergence for narrow responses.
//!
//! **Features:**
//! - Dense and sparse response matrices, one- and multi-dimensional spaces
//! - Local orthogonal polynomial (LOrPE) smoothing filters with symmetric beta
//!   kernels, separable N-D filters, and a memoizing filter cache
//! - Poisson or multinomial observation covariance, or a caller-supplied one
//! - Effective degrees of freedom of the filter, the response and their product
//! - Gaussian smearing response builder with Gauss-Legendre integration
//! - `no_std` support (with `alloc`)
//!
//! **How smoothed EM works:**
//!
//! 1. Fold the current approximation: `yhat = R·u`
//! 2. Back-project the ratio: `u'_i = u_i · Σ_o R[o][i] · y_o / yhat_o / eff_i`
//! 3. Smooth `u'` with the filter and rescale it to its pre-smoothing total
//! 4. Repeat until the normalized L1 change is at most `ε`
//!
//! ## Quick Start
//!
//! ```rust
//! use emunfold_rs::prelude::*;
//!
//! // Observed (rows) by unfolded (columns) response.
//! let matrix = Matrix::from_rows(&[
//!     vec![0.8, 0.1, 0.0],
//!     vec![0.2, 0.8, 0.2],
//!     vec![0.0, 0.1, 0.8],
//! ])?;
//! let filter = DummyFilter::new(3);
//!
//! let mut unfolder = EmUnfold::<f64>::new()
//!     .filter(&filter)
//!     .max_iterations(1000)
//!     .build(DenseResponse::new(matrix)?)?;
//!
//! let observed = [10.0, 20.0, 15.0];
//! let result = unfolder.unfold_to_result(&observed, None, true)?;
//!
//! assert_eq!(result.unfolded.len(), 3);
//! assert!(result.covariance.is_some());
//! # Ok::<(), UnfoldError>(())
//! ```
//!
//! ## Smoothing Filters
//!
//! LOrPE filters are built from a symmetric beta kernel `(1 - x²)^m` (or a
//! Gaussian for negative `m`), a bandwidth and a possibly fractional
//! polynomial degree:
//!
//! ```rust
//! use emunfold_rs::prelude::*;
//!
//! let filter = symbeta_lorpe_filter_1d::<f64>(
//!     4,                      // kernel power
//!     0.3,                    // bandwidth
//!     1.0,                    // polynomial degree
//!     50,                     // bins
//!     0.0,                    // x min
//!     5.0,                    // x max
//!     BoundaryMethod::Truncate,
//!     None,                   // excluded bin
//!     false,                  // exclude central point
//! )?;
//! assert_eq!(filter.n_bins(), 50);
//! # Ok::<(), UnfoldError>(())
//! ```
//!
//! ## Multiscale Pre-Iteration
//!
//! `build_multiscale` runs a few iterations with progressively narrower
//! filters (bandwidths equidistant in log space, widest first) before the
//! main loop. The filters are memoized across calls.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`prelude::UnfoldError`]. Argument errors
//! are raised before any state is modified; numerical inconsistencies such as
//! a zero prediction in a populated bin are runtime errors. Non-convergence
//! is not an error: `unfold` returns `Ok(false)` with the best estimate.
//!
//! ## References
//!
//! - D'Agostini, G. (1995). "A multidimensional unfolding method based on Bayes' theorem"
//! - Volobouev, I. (2017). "On the expectation-maximization unfolding with smoothing"

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;

// ============================================================================
// Internal Modules
// ============================================================================

// Layer 1: Primitives - errors, shapes and iteration buffers.
mod primitives;

// Layer 2: Math - pure mathematical functions.
//
// Contains the dense matrix, the linear algebra bridge, kernels, boundary
// handling, density utilities and quadrature.
mod math;

// Layer 3: Algorithms - response operators and smoothing filters.
mod algorithms;

// Layer 4: Evaluation - covariance models and degrees-of-freedom diagnostics.
mod evaluation;

// Layer 5: Engine - the smoothed EM iteration, pre-iteration strategies and
// error propagation.
mod engine;

// High-level fluent API.
//
// Provides the `EmUnfold` builder.
mod api;

// ============================================================================
// Prelude
// ============================================================================

/// Standard prelude.
///
/// This module is intended to be wildcard-imported for convenient access
/// to the most commonly used types:
///
/// ```
/// use emunfold_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{
        BoundaryMethod, CovarianceModel, DenseResponse, DummyFilter, EmUnfoldBuilder as EmUnfold,
        FilterProvider, FilterRef, LinearOperator, LocalPolyFilter1D, Matrix,
        MemoizingSymbetaFilterProvider, MultiscaleConfig, MultiscaleEmUnfold1D, ResponseMatrix,
        SequentialFilterND, SmoothedEmSparseUnfoldND, SmoothedEmUnfold, SmoothedEmUnfold1D,
        SmoothedEmUnfoldND, SymbetaFilterParams, UnfoldConfig, UnfoldError, UnfoldOutput,
        UnfoldingFilter, UniformBins, gaussian_response_matrix, symbeta_lorpe_filter_1d,
    };
}

// ============================================================================
// Testing re-exports
// ============================================================================

/// Internal modules for development and testing.
///
/// This module re-exports internal modules for development and testing purposes.
/// It is only available with the `dev` feature enabled.
///
/// **Warning**: These are internal implementation details and may change without notice.
/// Do not use in production code.
#[cfg(feature = "dev")]
pub mod internals {
    /// Internal primitive types and utilities.
    pub mod primitives {
        pub use crate::primitives::*;
    }
    /// Internal math functions.
    pub mod math {
        pub use crate::math::*;
    }
    /// Internal response operators and filters.
    pub mod algorithms {
        pub use crate::algorithms::*;
    }
    /// Internal execution engine.
    pub mod engine {
        pub use crate::engine::*;
    }
    /// Internal evaluation and diagnostics.
    pub mod evaluation {
        pub use crate::evaluation::*;
    }
    /// Internal API.
    pub mod api {
        pub use crate::api::*;
    }
}
