//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides pure mathematical building blocks used throughout the
//! unfolding code:
//! - Dense matrices and the nalgebra decomposition bridge
//! - Symmetric beta kernels and boundary handling for LOrPE filters
//! - Density normalization and the convergence distance
//! - Effective rank of smoother matrices
//! - Gauss-Legendre quadrature
//!
//! These are reusable mathematical building blocks with no algorithm-specific logic.
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
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Linear algebra backend (nalgebra bridge and SIMD kernels).
pub mod linalg;

/// Dense row-major matrices.
pub mod matrix;

/// Symmetric beta kernel family.
pub mod kernel;

/// Boundary handling for local filters.
pub mod boundary;

/// Density normalization and L1 distance.
pub mod density;

/// Effective rank of symmetric positive semi-definite matrices.
pub mod ndof;

/// Gauss-Legendre quadrature.
pub mod quadrature;
