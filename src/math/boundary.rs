//! Boundary handling for local polynomial filters.
//!
//! ## Purpose
//!
//! A local filter centered near the edge of the unfolded range sees only part
//! of its kernel support. This module decides which grid points contribute to
//! the local fit at a given center, and into which original bin each
//! contribution is accumulated.
//!
//! ## Design notes
//!
//! * **Strategy Pattern**: [`BoundaryMethod`] selects the treatment.
//! * **Mapping**: Every contributing point is reported together with the
//!   original bin it maps to, so reflected points fold their weight back
//!   onto the grid.
//!
//! ## Key concepts
//!
//! * **Truncate**: The kernel support is cut at the edges; the local
//!   polynomial basis is orthonormalized on the points that remain.
//! * **Reflect**: Points beyond an edge are mirrored across it, which makes
//!   the effective data symmetric about the boundary.
//!
//! ## Invariants
//!
//! * Reported bin indices are always inside `[0, n_bins)`.
//! * Positions are in bin units relative to the start of the grid.
//!
//! ## Non-goals
//!
//! * This module does not compute weights.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// Treatment of the kernel support near the ends of the unfolded range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BoundaryMethod {
    /// Cut the kernel support at the edges of the range.
    #[default]
    Truncate,

    /// Mirror the data across the edges of the range.
    Reflect,
}

impl BoundaryMethod {
    /// Points contributing to the local fit centered on bin `center`.
    ///
    /// Returns `(position, bin)` pairs where `position` is the signed bin
    /// coordinate of the point and `bin` is the original bin receiving its
    /// weight. `reach` is the half-width of the kernel support in bins.
    pub fn neighborhood(&self, n_bins: usize, center: usize, reach: usize) -> Vec<(isize, usize)> {
        let n = n_bins as isize;
        let c = center as isize;
        let r = reach as isize;
        let lo = c - r;
        let hi = c + r;

        let mut points = Vec::with_capacity((2 * reach + 1).min(3 * n_bins));
        for pos in lo..=hi {
            if (0..n).contains(&pos) {
                points.push((pos, pos as usize));
                continue;
            }
            if *self == BoundaryMethod::Truncate {
                continue;
            }
            let mirrored = if pos < 0 { -1 - pos } else { 2 * n - 1 - pos };
            if (0..n).contains(&mirrored) {
                points.push((pos, mirrored as usize));
            }
        }
        points
    }
}
