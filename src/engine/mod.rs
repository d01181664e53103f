//! Layer 5: Engine
//!
//! # Purpose
//!
//! This layer runs the unfolding:
//! - Shared unfolder state (response, efficiencies, filter handle)
//! - The smoothed EM iteration and its pre-iteration hook
//! - Linear error propagation to the unfolded covariance
//! - Input validation and reusable iteration buffers
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine ← You are here
//!   ↓
//! Layer 4: Evaluation
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Shared unfolder state.
pub mod base;

/// Smoothed EM engine.
pub mod executor;

/// Pre-iteration strategies, including multiscale smoothing.
pub mod preiterate;

/// Error propagation matrix.
pub mod propagation;

/// Input validation.
pub mod validator;

/// Reusable iteration buffers.
pub mod workspace;
