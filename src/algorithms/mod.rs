//! Layer 3: Algorithms
//!
//! # Purpose
//!
//! This layer provides the operators the EM engine composes:
//! - Dense and sparse response matrices behind the `LinearOperator` capability
//! - Smoothing filters (identity, LOrPE, separable N-D)
//! - Filter providers with memoization
//! - Gaussian smearing response builders
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine
//!   ↓
//! Layer 4: Evaluation
//!   ↓
//! Layer 3: Algorithms ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Response operator capability and the dense response.
pub mod response;

/// Sparse response matrix.
pub mod sparse;

/// Filter capability, identity filter and filter handles.
pub mod filter;

/// Local orthogonal polynomial filters.
pub mod lorpe;

/// Separable multi-dimensional filters.
pub mod sequential;

/// Filter providers and the memoizing cache.
pub mod provider;

/// Gaussian smearing response matrices.
pub mod gaussian_response;
