//! Covariance models for observed counts.
//!
//! ## Purpose
//!
//! Error propagation needs the covariance of the observed data. When the
//! caller does not supply one, it is modeled from the predicted observed
//! spectrum `yhat = R · unfolded` under one of two counting statistics.
//!
//! ## Key concepts
//!
//! * **Poisson**: independent bins, `Var(y_i) = yhat_i`.
//! * **Multinomial**: fixed total `N = Σ yhat`, `p_i = yhat_i / N`,
//!   `Var(y_i) = N p_i (1 - p_i)` and `Cov(y_i, y_j) = -N p_i p_j`.
//!
//! ## Invariants
//!
//! * The Poisson covariance is tagged diagonal.
//! * Rows of the multinomial covariance sum to zero.

// Internal dependencies
use crate::math::density::sum;
use crate::math::linalg::FloatLinalg;
use crate::math::matrix::Matrix;
use crate::primitives::errors::UnfoldError;

/// Counting statistics of the observed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CovarianceModel {
    /// Independent Poisson counts.
    #[default]
    Poisson,

    /// Multinomial counts with a fixed total.
    Multinomial,
}

impl CovarianceModel {
    /// Model selected by a multinomial flag.
    pub fn from_multinomial(multinomial: bool) -> Self {
        if multinomial {
            CovarianceModel::Multinomial
        } else {
            CovarianceModel::Poisson
        }
    }

    /// True for the multinomial model.
    pub fn is_multinomial(&self) -> bool {
        *self == CovarianceModel::Multinomial
    }

    /// Covariance of the observed counts given the predicted spectrum.
    pub fn observation_covariance<T: FloatLinalg>(
        &self,
        yhat: &[T],
    ) -> Result<Matrix<T>, UnfoldError> {
        match self {
            CovarianceModel::Poisson => Ok(Matrix::from_diagonal(yhat)),
            CovarianceModel::Multinomial => multinomial_covariance(yhat),
        }
    }
}

fn multinomial_covariance<T: FloatLinalg>(yhat: &[T]) -> Result<Matrix<T>, UnfoldError> {
    let n = yhat.len();
    let total = sum(yhat);
    if total <= T::zero() {
        return Err(UnfoldError::ZeroSum);
    }

    let mut cov = Matrix::zeros(n, n);
    for i in 0..n {
        let p_i = yhat[i] / total;
        let row = cov.row_mut(i);
        for (j, (c, &y_j)) in row.iter_mut().zip(yhat).enumerate() {
            *c = if i == j {
                total * p_i * (T::one() - p_i)
            } else {
                -p_i * y_j
            };
        }
    }
    Ok(cov)
}
