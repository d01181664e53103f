//! Smoothing filters applied between EM iterations.
//!
//! ## Purpose
//!
//! This module defines [`UnfoldingFilter`], the linear smoothing operator `F`
//! used by the smoothed EM iteration, along with [`DummyFilter`] (the identity)
//! and [`FilterRef`], the handle through which an unfolder holds its filter.
//!
//! ## Design notes
//!
//! * **Two directions**: `filter(x) = F · x` and `convolve(x) = Fᵀ · x`. The
//!   unfolder picks one of them through its `use_convolutions` switch.
//! * **Shared handles**: Filters handed out by a memoizing provider are
//!   reference counted; filters owned by the caller are borrowed. Both go
//!   through [`FilterRef`] so the unfolder can swap filters in and out
//!   during multiscale pre-iteration.
//!
//! ## Invariants
//!
//! * `filter_matrix()` is `data_len() x data_len()`.
//! * `filter` and `convolve` reject buffers whose length is not `data_len()`.
//!
//! ## Non-goals
//!
//! * Non-linear smoothing.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::{sync::Arc, vec::Vec};

// External dependencies
use core::fmt;

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::shape::shape_length;

// ============================================================================
// UnfoldingFilter Trait
// ============================================================================

/// Linear smoothing operator on arrays of a fixed shape.
pub trait UnfoldingFilter<T: FloatLinalg>: Send + Sync {
    /// Shape of the arrays this filter operates on.
    fn data_shape(&self) -> &[usize];

    /// Number of elements in a filtered array.
    fn data_len(&self) -> usize {
        shape_length(self.data_shape())
    }

    /// `out = F · input`.
    fn filter(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError>;

    /// `out = Fᵀ · input`.
    fn convolve(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError>;

    /// Dense filter matrix `F`.
    fn filter_matrix(&self) -> Matrix<T>;
}

/// Check both buffers passed to a filter against its data length.
pub fn check_filter_buffers<V>(len: usize, input: &[V], out: &[V]) -> Result<(), UnfoldError> {
    if input.len() != len {
        return Err(UnfoldError::DimensionMismatch {
            what: "filter input",
            expected: len,
            got: input.len(),
        });
    }
    if out.len() != len {
        return Err(UnfoldError::DimensionMismatch {
            what: "filter output",
            expected: len,
            got: out.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Dummy Filter
// ============================================================================

/// Identity filter; turns smoothed EM into plain EM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyFilter {
    shape: Vec<usize>,
}

impl DummyFilter {
    /// Identity filter for one-dimensional arrays of length `n`.
    pub fn new(n: usize) -> Self {
        Self { shape: vec![n] }
    }

    /// Identity filter for arrays of the given shape.
    pub fn with_shape(shape: Vec<usize>) -> Self {
        Self { shape }
    }
}

impl<T: FloatLinalg> UnfoldingFilter<T> for DummyFilter {
    fn data_shape(&self) -> &[usize] {
        &self.shape
    }

    fn filter(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        check_filter_buffers(shape_length(&self.shape), input, out)?;
        out.copy_from_slice(input);
        Ok(())
    }

    fn convolve(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        <Self as UnfoldingFilter<T>>::filter(self, input, out)
    }

    fn filter_matrix(&self) -> Matrix<T> {
        Matrix::identity(shape_length(&self.shape))
    }
}

// ============================================================================
// Filter Handle
// ============================================================================

/// Handle to the filter an unfolder currently uses.
pub enum FilterRef<'a, T: FloatLinalg> {
    /// Filter owned by the caller.
    Borrowed(&'a dyn UnfoldingFilter<T>),

    /// Reference-counted filter, typically from a filter provider.
    Shared(Arc<dyn UnfoldingFilter<T> + 'a>),
}

impl<'a, T: FloatLinalg> FilterRef<'a, T> {
    /// The referenced filter.
    pub fn get(&self) -> &(dyn UnfoldingFilter<T> + 'a) {
        match self {
            FilterRef::Borrowed(f) => *f,
            FilterRef::Shared(f) => f.as_ref(),
        }
    }
}

impl<T: FloatLinalg> Clone for FilterRef<'_, T> {
    fn clone(&self) -> Self {
        match self {
            FilterRef::Borrowed(f) => FilterRef::Borrowed(*f),
            FilterRef::Shared(f) => FilterRef::Shared(Arc::clone(f)),
        }
    }
}

impl<T: FloatLinalg> fmt::Debug for FilterRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRef::Borrowed(_) => f.write_str("FilterRef::Borrowed(..)"),
            FilterRef::Shared(_) => f.write_str("FilterRef::Shared(..)"),
        }
    }
}

impl<'a, T: FloatLinalg> From<&'a dyn UnfoldingFilter<T>> for FilterRef<'a, T> {
    fn from(f: &'a dyn UnfoldingFilter<T>) -> Self {
        FilterRef::Borrowed(f)
    }
}

impl<'a, T: FloatLinalg> From<Arc<dyn UnfoldingFilter<T> + 'a>> for FilterRef<'a, T> {
    fn from(f: Arc<dyn UnfoldingFilter<T> + 'a>) -> Self {
        FilterRef::Shared(f)
    }
}
