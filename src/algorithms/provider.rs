//! Filter providers with optional memoization.
//!
//! ## Purpose
//!
//! Multiscale pre-iteration and bandwidth scans request many LOrPE filters,
//! often with identical parameters. A [`FilterProvider`] builds filters from
//! [`SymbetaFilterParams`]; the memoizing implementation keeps every filter
//! it has built and hands out shared references on repeated requests.
//!
//! ## Design notes
//!
//! * **Exact keys**: Parameters are compared exactly (floats through
//!   `total_cmp`), so only bit-identical requests share a filter.
//! * **Shared results**: Filters are returned as `Arc` so the caller can
//!   install them in an unfolder while the cache keeps its own reference.
//! * **Unbounded cache**: Entries are only removed by [`MemoizingSymbetaFilterProvider::clear`].
//!
//! ## Invariants
//!
//! * While memoizing, identical requests return pointer-equal `Arc`s.
//! * A cached filter is returned whenever one exists, memoizing or not.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::{collections::BTreeMap, sync::Arc, vec::Vec};

// External dependencies
use core::cmp::Ordering;

// Internal dependencies
use crate::algorithms::lorpe::{Exclusion, LocalPolyFilter1D, degree_taper, lorpe_filter_1d};
use crate::math::boundary::BoundaryMethod;
use crate::math::kernel::SymbetaKernel;
use crate::math::linalg::FloatLinalg;
use crate::primitives::errors::UnfoldError;

// ============================================================================
// Filter Parameters
// ============================================================================

/// Parameters that fully determine a symmetric beta LOrPE filter.
#[derive(Debug, Clone, Copy)]
pub struct SymbetaFilterParams {
    /// Kernel power; negative selects the Gaussian.
    pub symbeta_power: i32,

    /// Kernel bandwidth in the units of the unfolded axis.
    pub bandwidth: f64,

    /// Polynomial degree, possibly fractional.
    pub degree: f64,

    /// Number of bins.
    pub n_bins: usize,

    /// Width of one bin.
    pub bin_width: f64,

    /// Treatment of the kernel support near the edges.
    pub boundary: BoundaryMethod,

    /// Bin excluded from every fit.
    pub excluded_bin: Option<usize>,

    /// Drop the center point from its own fit.
    pub exclude_central_point: bool,
}

impl SymbetaFilterParams {
    /// Parameters without exclusions.
    pub fn new(
        symbeta_power: i32,
        bandwidth: f64,
        degree: f64,
        n_bins: usize,
        bin_width: f64,
        boundary: BoundaryMethod,
    ) -> Result<Self, UnfoldError> {
        if !bandwidth.is_finite() || bandwidth < 0.0 {
            return Err(UnfoldError::InvalidBandwidth(bandwidth));
        }
        Ok(Self {
            symbeta_power,
            bandwidth,
            degree,
            n_bins,
            bin_width,
            boundary,
            excluded_bin: None,
            exclude_central_point: false,
        })
    }

    /// Exclude a bin from every fit.
    pub fn with_excluded_bin(mut self, bin: usize) -> Self {
        self.excluded_bin = Some(bin);
        self
    }

    /// Drop the center point from its own fit.
    pub fn with_central_point_excluded(mut self, exclude: bool) -> Self {
        self.exclude_central_point = exclude;
        self
    }

    /// Same parameters with another bandwidth.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Build the filter these parameters describe.
    pub fn build<T: FloatLinalg>(&self) -> Result<LocalPolyFilter1D<T>, UnfoldError> {
        let taper = degree_taper(self.degree)?;
        lorpe_filter_1d(
            SymbetaKernel::new(self.symbeta_power),
            self.bandwidth,
            &taper,
            self.n_bins,
            self.bin_width,
            self.boundary,
            Exclusion {
                bin: self.excluded_bin,
                central_point: self.exclude_central_point,
            },
        )
    }
}

impl PartialEq for SymbetaFilterParams {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SymbetaFilterParams {}

impl PartialOrd for SymbetaFilterParams {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SymbetaFilterParams {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbeta_power
            .cmp(&other.symbeta_power)
            .then_with(|| self.bandwidth.total_cmp(&other.bandwidth))
            .then_with(|| self.degree.total_cmp(&other.degree))
            .then_with(|| self.n_bins.cmp(&other.n_bins))
            .then_with(|| self.bin_width.total_cmp(&other.bin_width))
            .then_with(|| self.boundary.cmp(&other.boundary))
            .then_with(|| self.excluded_bin.cmp(&other.excluded_bin))
            .then_with(|| self.exclude_central_point.cmp(&other.exclude_central_point))
    }
}

// ============================================================================
// FilterProvider Trait
// ============================================================================

/// Source of LOrPE filters.
pub trait FilterProvider<T: FloatLinalg> {
    /// Filter for the given parameters.
    fn provide_filter(
        &mut self,
        params: &SymbetaFilterParams,
    ) -> Result<Arc<LocalPolyFilter1D<T>>, UnfoldError>;
}

// ============================================================================
// Simple Provider
// ============================================================================

/// Provider that builds a new filter on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSymbetaFilterProvider;

impl<T: FloatLinalg> FilterProvider<T> for SimpleSymbetaFilterProvider {
    fn provide_filter(
        &mut self,
        params: &SymbetaFilterParams,
    ) -> Result<Arc<LocalPolyFilter1D<T>>, UnfoldError> {
        if !params.bandwidth.is_finite() || params.bandwidth < 0.0 {
            return Err(UnfoldError::InvalidBandwidth(params.bandwidth));
        }
        Ok(Arc::new(params.build()?))
    }
}

// ============================================================================
// Memoizing Provider
// ============================================================================

/// Provider that caches filters by their exact parameters.
#[derive(Debug, Clone)]
pub struct MemoizingSymbetaFilterProvider<T> {
    cache: BTreeMap<SymbetaFilterParams, Arc<LocalPolyFilter1D<T>>>,
    memoizing: bool,
}

impl<T: FloatLinalg> Default for MemoizingSymbetaFilterProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatLinalg> MemoizingSymbetaFilterProvider<T> {
    /// Empty cache with memoization turned on.
    pub fn new() -> Self {
        Self {
            cache: BTreeMap::new(),
            memoizing: true,
        }
    }

    /// Resume caching newly built filters.
    pub fn start_memoizing(&mut self) {
        self.memoizing = true;
    }

    /// Stop caching newly built filters. Cached filters are still served.
    pub fn stop_memoizing(&mut self) {
        self.memoizing = false;
    }

    /// Whether newly built filters are cached.
    pub fn is_memoizing(&self) -> bool {
        self.memoizing
    }

    /// Number of cached filters.
    pub fn n_memoized(&self) -> usize {
        self.cache.len()
    }

    /// Distinct bandwidths in the cache, ascending.
    pub fn known_bandwidth_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.cache.keys().map(|p| p.bandwidth).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        values
    }

    /// Parameters of the first cached filter in key order.
    pub fn first_memoized_info(&self) -> Result<&SymbetaFilterParams, UnfoldError> {
        self.cache.keys().next().ok_or(UnfoldError::EmptyCache)
    }

    /// Drop every cached filter.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl<T: FloatLinalg> FilterProvider<T> for MemoizingSymbetaFilterProvider<T> {
    fn provide_filter(
        &mut self,
        params: &SymbetaFilterParams,
    ) -> Result<Arc<LocalPolyFilter1D<T>>, UnfoldError> {
        if !params.bandwidth.is_finite() || params.bandwidth < 0.0 {
            return Err(UnfoldError::InvalidBandwidth(params.bandwidth));
        }
        if let Some(found) = self.cache.get(params) {
            return Ok(Arc::clone(found));
        }
        let filter = Arc::new(params.build()?);
        if self.memoizing {
            self.cache.insert(*params, Arc::clone(&filter));
            log::debug!(
                "memoized filter with bandwidth {} ({} cached)",
                params.bandwidth,
                self.cache.len()
            );
        }
        Ok(filter)
    }
}
