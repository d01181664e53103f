//! Gauss-Legendre quadrature on `[-1, 1]`.
//!
//! Abscissae are found by Newton iteration on the Legendre polynomial
//! recurrence, starting from the Tricomi approximation of each root.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::f64::consts::PI;
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::UnfoldError;

/// Largest supported number of quadrature points.
pub const MAX_POINTS: usize = 256;

const NEWTON_ITERATIONS: usize = 100;

/// Gauss-Legendre rule with `n` points.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    abscissae: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build the `n`-point rule, `1 <= n <= MAX_POINTS`.
    pub fn new(n: usize) -> Result<Self, UnfoldError> {
        if n == 0 || n > MAX_POINTS {
            return Err(UnfoldError::InvalidParameter(format!(
                "number of integration points must be in [1, {MAX_POINTS}], got {n}"
            )));
        }

        let mut abscissae = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let nf = n as f64;
        let half = n.div_ceil(2);
        for i in 0..half {
            let mut x = Float::cos(PI * (i as f64 + 0.75) / (nf + 0.5));
            let mut deriv = 1.0;
            for _ in 0..NEWTON_ITERATIONS {
                let (p, dp) = legendre_with_derivative(n, x);
                deriv = dp;
                let dx = p / dp;
                x -= dx;
                if Float::abs(dx) <= 1.0e-15 {
                    let (_, dp) = legendre_with_derivative(n, x);
                    deriv = dp;
                    break;
                }
            }
            let w = 2.0 / ((1.0 - x * x) * deriv * deriv);
            abscissae[i] = -x;
            abscissae[n - 1 - i] = x;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        Ok(Self { abscissae, weights })
    }

    /// Number of points.
    pub fn n_points(&self) -> usize {
        self.abscissae.len()
    }

    /// Abscissae in ascending order.
    pub fn abscissae(&self) -> &[f64] {
        &self.abscissae
    }

    /// Weights matching [`Self::abscissae`]; they sum to 2.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Integrate `f` over `[a, b]`.
    pub fn integrate(&self, a: f64, b: f64, mut f: impl FnMut(f64) -> f64) -> f64 {
        let mid = (a + b) / 2.0;
        let half = (b - a) / 2.0;
        let s: f64 = self
            .abscissae
            .iter()
            .zip(&self.weights)
            .map(|(&x, &w)| w * f(mid + half * x))
            .sum();
        s * half
    }
}

/// `P_n(x)` and `P_n'(x)` via the three-term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}
