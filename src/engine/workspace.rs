//! Workspace for reusable EM iteration buffers.
//!
//! This module provides pre-allocated buffers so that repeated `unfold`
//! calls and the iterations inside them do not allocate.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::buffer::{PingPong, ensure_len};

/// Buffers used by one EM iteration.
#[derive(Debug, Clone)]
pub struct EmWorkspace<T> {
    /// Previous and next unfolded approximations.
    pub approx: PingPong<T>,

    /// Predicted observed spectrum, then the observed/predicted ratio.
    pub yhat: Vec<T>,

    /// Back-projected ratio `Rᵀ · (observed / yhat)`.
    pub num: Vec<T>,

    /// Unsmoothed update fed to the filter.
    pub raw: Vec<T>,
}

impl<T: Float> Default for EmWorkspace<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<T: Float> EmWorkspace<T> {
    /// Workspace sized for the given observed and unfolded lengths.
    pub fn new(n_observed: usize, n_unfolded: usize) -> Self {
        let mut ws = Self {
            approx: PingPong::new(n_unfolded),
            yhat: Vec::new(),
            num: Vec::new(),
            raw: Vec::new(),
        };
        ws.ensure_capacity(n_observed, n_unfolded);
        ws
    }

    /// Resize every buffer for the given lengths. Does not shrink capacity.
    pub fn ensure_capacity(&mut self, n_observed: usize, n_unfolded: usize) {
        self.approx.ensure_len(n_unfolded);
        ensure_len(&mut self.yhat, n_observed);
        ensure_len(&mut self.num, n_unfolded);
        ensure_len(&mut self.raw, n_unfolded);
    }
}
