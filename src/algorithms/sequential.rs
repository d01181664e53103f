//! Multi-dimensional filters built from one-dimensional ones.
//!
//! ## Purpose
//!
//! [`SequentialFilterND`] smooths an N-D array by applying a 1-D filter along
//! each axis in turn. Its matrix is the Kronecker product of the 1-D filter
//! matrices, in row-major order (last index varies fastest).
//!
//! ## Invariants
//!
//! * The filter for axis `d` has `data_len() == shape[d]`.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::{format, sync::Arc, vec::Vec};

// Internal dependencies
use crate::algorithms::filter::{UnfoldingFilter, check_filter_buffers};
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;
use crate::primitives::shape::{shape_length, strides};

/// Separable N-D filter: one 1-D filter per axis.
pub struct SequentialFilterND<T: FloatLinalg> {
    shape: Vec<usize>,
    axis_filters: Vec<Arc<dyn UnfoldingFilter<T>>>,
}

impl<T: FloatLinalg> SequentialFilterND<T> {
    /// Combine one-dimensional filters, one per axis.
    pub fn new(axis_filters: Vec<Arc<dyn UnfoldingFilter<T>>>) -> Result<Self, UnfoldError> {
        if axis_filters.is_empty() {
            return Err(UnfoldError::InvalidFilter(
                "at least one axis filter is required".into(),
            ));
        }
        let mut shape = Vec::with_capacity(axis_filters.len());
        for (d, f) in axis_filters.iter().enumerate() {
            if f.data_shape().len() != 1 {
                return Err(UnfoldError::InvalidFilter(format!(
                    "filter for axis {d} is not one-dimensional"
                )));
            }
            shape.push(f.data_len());
        }
        Ok(Self {
            shape,
            axis_filters,
        })
    }

    /// Number of axes.
    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    fn apply(&self, input: &[T], out: &mut [T], transpose: bool) -> Result<(), UnfoldError> {
        let len = shape_length(&self.shape);
        check_filter_buffers(len, input, out)?;
        out.copy_from_slice(input);

        let st = strides(&self.shape);
        let mut line = Vec::new();
        let mut smoothed = Vec::new();
        for (d, f) in self.axis_filters.iter().enumerate() {
            let n = self.shape[d];
            let stride = st[d];
            let outer = len / (n * stride);
            line.resize(n, T::zero());
            smoothed.resize(n, T::zero());
            for o in 0..outer {
                for inner in 0..stride {
                    let base = o * n * stride + inner;
                    for (k, v) in line.iter_mut().enumerate() {
                        *v = out[base + k * stride];
                    }
                    if transpose {
                        f.convolve(&line, &mut smoothed)?;
                    } else {
                        f.filter(&line, &mut smoothed)?;
                    }
                    for (k, &v) in smoothed.iter().enumerate() {
                        out[base + k * stride] = v;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<T: FloatLinalg> UnfoldingFilter<T> for SequentialFilterND<T> {
    fn data_shape(&self) -> &[usize] {
        &self.shape
    }

    fn filter(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.apply(input, out, false)
    }

    fn convolve(&self, input: &[T], out: &mut [T]) -> Result<(), UnfoldError> {
        self.apply(input, out, true)
    }

    fn filter_matrix(&self) -> Matrix<T> {
        let mut acc = Matrix::identity(1);
        for f in &self.axis_filters {
            acc = kronecker(&acc, &f.filter_matrix());
        }
        acc
    }
}

/// Kronecker product `a ⊗ b`.
pub fn kronecker<T: FloatLinalg>(a: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    let (ar, ac) = (a.n_rows(), a.n_cols());
    let (br, bc) = (b.n_rows(), b.n_cols());
    let mut out = Matrix::zeros(ar * br, ac * bc);
    for i in 0..ar {
        for j in 0..ac {
            let aij = a[(i, j)];
            if aij == T::zero() {
                continue;
            }
            for k in 0..br {
                for l in 0..bc {
                    out[(i * br + k, j * bc + l)] = aij * b[(k, l)];
                }
            }
        }
    }
    out
}
