//! Reusable iteration buffers for the EM engine.
//!
//! ## Purpose
//!
//! This module provides the scratch storage reused across `unfold` calls so
//! that the iteration loop does not allocate. The central piece is
//! [`PingPong`], a pair of equally sized vectors whose roles ("previous" and
//! "next" approximation) are exchanged by a pointer-free index flip.
//!
//! ## Design notes
//!
//! * **Lazy expansion**: Buffers are resized on demand via `ensure_len`,
//!   never shrunk.
//! * **Role flip**: `swap` exchanges the roles without moving data, the same
//!   way the iteration swaps its previous and next estimates.
//!
//! ## Invariants
//!
//! * Both halves of a [`PingPong`] always have the same length.
//!
//! ## Non-goals
//!
//! * Thread-local caching; each engine owns its buffers.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// ============================================================================
// Scratch Vector
// ============================================================================

/// Resize `buf` to exactly `len` elements, zero-filling new slots.
#[inline]
pub fn ensure_len<T: Float>(buf: &mut Vec<T>, len: usize) {
    if buf.len() != len {
        buf.resize(len, T::zero());
    }
}

// ============================================================================
// Ping-Pong Pair
// ============================================================================

/// Two equally sized buffers holding the previous and next approximations.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    halves: [Vec<T>; 2],
    next_is_first: bool,
}

impl<T: Float> Default for PingPong<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Float> PingPong<T> {
    /// Create a pair of zero-filled buffers of length `len`.
    pub fn new(len: usize) -> Self {
        Self {
            halves: [vec![T::zero(); len], vec![T::zero(); len]],
            next_is_first: true,
        }
    }

    /// Resize both halves to `len`.
    pub fn ensure_len(&mut self, len: usize) {
        ensure_len(&mut self.halves[0], len);
        ensure_len(&mut self.halves[1], len);
    }

    /// Length of each half.
    #[inline]
    pub fn len(&self) -> usize {
        self.halves[0].len()
    }

    /// True if the buffers hold no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.halves[0].is_empty()
    }

    /// Exchange the roles of the previous and next buffers.
    #[inline]
    pub fn swap(&mut self) {
        self.next_is_first = !self.next_is_first;
    }

    /// Current "next" approximation.
    #[inline]
    pub fn next(&self) -> &[T] {
        &self.halves[self.next_index()]
    }

    /// Current "previous" approximation.
    #[inline]
    pub fn prev(&self) -> &[T] {
        &self.halves[1 - self.next_index()]
    }

    /// Mutable access to the "next" approximation.
    #[inline]
    pub fn next_mut(&mut self) -> &mut [T] {
        let i = self.next_index();
        &mut self.halves[i]
    }

    /// Borrow the previous buffer immutably and the next buffer mutably.
    #[inline]
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        let (first, second) = self.halves.split_at_mut(1);
        if self.next_is_first {
            (&second[0], &mut first[0])
        } else {
            (&first[0], &mut second[0])
        }
    }

    /// Overwrite the "next" buffer with `values`.
    pub fn load_next(&mut self, values: &[T]) {
        self.ensure_len(values.len());
        self.next_mut().copy_from_slice(values);
    }

    #[inline]
    fn next_index(&self) -> usize {
        if self.next_is_first { 0 } else { 1 }
    }
}
