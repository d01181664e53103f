//! Layer 4: Evaluation
//!
//! # Purpose
//!
//! This layer evaluates statistical properties of an unfolding setup:
//! - Observation covariance models (Poisson, multinomial)
//! - Effective degrees of freedom of the filter and response
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine
//!   ↓
//! Layer 4: Evaluation ← You are here
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Observation covariance models.
pub mod covariance;

/// Effective degrees of freedom diagnostics.
pub mod ndof;
