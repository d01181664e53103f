//! Array shapes for multi-dimensional unfolding spaces.
//!
//! ## Purpose
//!
//! Unfolded and observed spaces are stored as flat, row-major arrays (last
//! index varies fastest). This module provides the small set of shape
//! operations the rest of the crate needs: total length, strides, and
//! human-readable formatting for error messages.
//!
//! ## Invariants
//!
//! * A valid shape has at least one dimension and no zero extents.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{format, string::String, vec::Vec};

// Internal dependencies
use crate::primitives::errors::UnfoldError;

/// Shape of a row-major multi-dimensional array.
pub type ArrayShape = Vec<usize>;

/// Total number of elements described by `shape`.
///
/// An empty shape describes a scalar and has length 1, matching the
/// convention that the product over no extents is one.
#[inline]
pub fn shape_length(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for `shape`.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

/// Format a shape as `[n0, n1, ...]`.
pub fn format_shape(shape: &[usize]) -> String {
    format!("{shape:?}")
}

/// Check that a shape is usable as an array discretization.
pub fn validate_shape(shape: &[usize], what: &'static str) -> Result<(), UnfoldError> {
    if shape.is_empty() {
        return Err(UnfoldError::EmptyInput);
    }
    if shape.iter().any(|&n| n == 0) {
        return Err(UnfoldError::ShapeMismatch {
            what,
            expected: String::from("non-zero extents"),
            got: format_shape(shape),
        });
    }
    Ok(())
}
