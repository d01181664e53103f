//! Error types for unfolding operations.
//!
//! ## Purpose
//!
//! This module defines the error conditions that can occur while building
//! response matrices and filters, configuring an unfolding engine, and running
//! the expectation-maximization iterations.
//!
//! ## Design notes
//!
//! * **Two classes**: Variants are either argument errors (raised before any
//!   state is touched) or runtime errors (numerical inconsistencies detected
//!   while iterating). [`UnfoldError::is_invalid_argument`] and
//!   [`UnfoldError::is_runtime`] expose the classification.
//! * **Contextual**: Errors carry the offending index and values.
//! * **No-std**: Uses `alloc` for dynamic messages.
//!
//! ## Key concepts
//!
//! 1. **Input validation**: Length and shape mismatches, negative or all-zero counts.
//! 2. **Construction validation**: Non-positive efficiency, malformed sparse responses.
//! 3. **Numerical failures**: Non-positive predictions for populated bins, singular systems.
//!
//! ## Invariants
//!
//! * Every variant belongs to exactly one class.
//! * Non-convergence is never an error.
//!
//! ## Non-goals
//!
//! * This module does not perform the validation logic itself.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(feature = "std")]
use std::error::Error;
#[cfg(feature = "std")]
use std::string::String;

// External dependencies
use core::fmt::{Display, Formatter, Result};

// ============================================================================
// Error Type
// ============================================================================

/// Error type for unfolding operations.
#[derive(Debug, Clone, PartialEq)]
pub enum UnfoldError {
    /// An input array or dimension list is empty.
    EmptyInput,

    /// A length does not match the discretization it must agree with.
    DimensionMismatch {
        /// Which space or object the length refers to.
        what: &'static str,
        /// Length required by the response matrix.
        expected: usize,
        /// Length that was supplied.
        got: usize,
    },

    /// An array shape does not match the expected shape.
    ShapeMismatch {
        /// Which space or object the shape refers to.
        what: &'static str,
        /// Required shape, formatted.
        expected: String,
        /// Supplied shape, formatted.
        got: String,
    },

    /// A count or density value is negative.
    NegativeCount {
        /// Position of the offending entry.
        index: usize,
        /// The negative value.
        value: f64,
    },

    /// All counts are zero, so there is nothing to unfold.
    ZeroSum,

    /// An unfolded cell has zero or negative efficiency.
    NonPositiveEfficiency {
        /// Linear index of the offending unfolded cell.
        index: usize,
    },

    /// The sparse response matrix failed its validity check.
    InvalidResponse(String),

    /// The observation covariance matrix has the wrong dimensions.
    InvalidCovariance {
        /// Number of rows supplied.
        rows: usize,
        /// Number of columns supplied.
        cols: usize,
        /// Required size of both dimensions.
        expected: usize,
    },

    /// The filter is incompatible with the unfolded space or malformed.
    InvalidFilter(String),

    /// Filter bandwidth is negative or not finite.
    InvalidBandwidth(f64),

    /// Generic invalid parameter with a descriptive message.
    InvalidParameter(String),

    /// A builder parameter was set more than once.
    DuplicateParameter {
        /// Name of the parameter.
        parameter: &'static str,
    },

    /// A filter is required but none has been set.
    FilterNotSet,

    /// The folded prediction is not positive in a bin with observed entries.
    NonPositivePrediction {
        /// Observed-space bin.
        bin: usize,
        /// Predicted (folded) value.
        predicted: f64,
        /// Observed count.
        observed: f64,
    },

    /// Smoothing removed all positive mass from the spectrum.
    ZeroDensity,

    /// A linear system or decomposition could not be computed.
    SingularMatrix(String),

    /// The filter cache holds no items.
    EmptyCache,
}

impl UnfoldError {
    /// True for errors raised by argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        !self.is_runtime()
    }

    /// True for numerical or state errors raised while computing.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::FilterNotSet
                | Self::NonPositivePrediction { .. }
                | Self::ZeroDensity
                | Self::SingularMatrix(_)
                | Self::EmptyCache
        )
    }
}

impl Display for UnfoldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::EmptyInput => write!(f, "Input array is empty"),
            Self::DimensionMismatch {
                what,
                expected,
                got,
            } => write!(
                f,
                "Incompatible discretization of the {what}: expected {expected}, got {got}"
            ),
            Self::ShapeMismatch {
                what,
                expected,
                got,
            } => write!(
                f,
                "Incompatible shape of the {what}: expected {expected}, got {got}"
            ),
            Self::NegativeCount { index, value } => {
                write!(f, "Counts must not be negative: entry {index} is {value}")
            }
            Self::ZeroSum => write!(f, "Argument array sums to zero"),
            Self::NonPositiveEfficiency { index } => write!(
                f,
                "Efficiency for unfolded cell {index} is not positive; remove this cell from the response matrix"
            ),
            Self::InvalidResponse(msg) => write!(f, "Invalid response matrix: {msg}"),
            Self::InvalidCovariance {
                rows,
                cols,
                expected,
            } => write!(
                f,
                "Incompatible dimensions for the covariance matrix of observations: {rows}x{cols}, expected {expected}x{expected}"
            ),
            Self::InvalidFilter(msg) => write!(f, "Invalid filter: {msg}"),
            Self::InvalidBandwidth(bw) => {
                write!(f, "Invalid bandwidth: {bw} (must be >= 0 and finite)")
            }
            Self::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            Self::DuplicateParameter { parameter } => write!(
                f,
                "Parameter '{parameter}' was set multiple times. Each parameter can only be configured once."
            ),
            Self::FilterNotSet => write!(f, "Filter has not been set"),
            Self::NonPositivePrediction {
                bin,
                predicted,
                observed,
            } => write!(
                f,
                "{predicted} entries predicted, {observed} observed for bin {bin}. \
                 Change the response matrix, the initial approximation, or the filter."
            ),
            Self::ZeroDensity => write!(f, "Smoothed spectrum has no positive values"),
            Self::SingularMatrix(msg) => write!(f, "Singular matrix: {msg}"),
            Self::EmptyCache => write!(f, "No items memoized"),
        }
    }
}

// ============================================================================
// Standard Error Trait
// ============================================================================

#[cfg(feature = "std")]
impl Error for UnfoldError {}
