#![cfg(feature = "dev")]

use approx::assert_relative_eq;

use emunfold_rs::internals::algorithms::filter::DummyFilter;
use emunfold_rs::internals::algorithms::gaussian_response::{
    UniformBins, gaussian_response_matrix,
};
use emunfold_rs::internals::algorithms::lorpe::{LocalPolyFilter1D, symbeta_lorpe_filter_1d};
use emunfold_rs::internals::algorithms::response::{DenseResponse, LinearOperator};
use emunfold_rs::internals::algorithms::sparse::ResponseMatrix;
use emunfold_rs::internals::api::EmUnfoldBuilder;
use emunfold_rs::internals::engine::executor::{
    SmoothedEmSparseUnfoldND, SmoothedEmUnfold1D, SmoothedEmUnfoldND,
};
use emunfold_rs::internals::math::boundary::BoundaryMethod;
use emunfold_rs::internals::math::matrix::Matrix;
use emunfold_rs::internals::primitives::errors::UnfoldError;

/// Tridiagonal 5x5 smearing with unit efficiencies.
fn unit_efficiency_smearing() -> Matrix<f64> {
    Matrix::from_rows(&[
        vec![0.8, 0.2, 0.0, 0.0, 0.0],
        vec![0.2, 0.6, 0.2, 0.0, 0.0],
        vec![0.0, 0.2, 0.6, 0.2, 0.0],
        vec![0.0, 0.0, 0.2, 0.6, 0.2],
        vec![0.0, 0.0, 0.0, 0.2, 0.8],
    ])
    .unwrap()
}

fn identity_response(n: usize) -> DenseResponse<f64> {
    DenseResponse::new(Matrix::identity(n)).unwrap()
}

// ============================================================================
// Input Validation
// ============================================================================

#[test]
fn test_zero_efficiency_is_rejected() {
    let m = Matrix::from_rows(&[vec![0.5, 0.0, 0.2], vec![0.5, 0.0, 0.8]]).unwrap();
    let filter = DummyFilter::new(3);
    let err = SmoothedEmUnfold1D::new(DenseResponse::new(m).unwrap(), &filter).unwrap_err();
    assert_eq!(err, UnfoldError::NonPositiveEfficiency { index: 1 });
}

#[test]
fn test_negative_response_is_rejected() {
    let filter = DummyFilter::new(2);
    let mut sparse = ResponseMatrix::<f64>::new(vec![2], vec![2]).unwrap();
    sparse.set_cell(0, vec![0, 1], vec![0.9, 0.1]).unwrap();
    sparse.set_cell(1, vec![0, 1], vec![-0.1, 0.9]).unwrap();
    let err = SmoothedEmSparseUnfoldND::new(sparse, &filter).unwrap_err();
    assert!(matches!(err, UnfoldError::InvalidResponse(_)));
}

#[test]
fn test_bad_observed_data_leaves_output_untouched() {
    let filter = DummyFilter::new(4);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(4), &filter).unwrap();
    let mut unfolded = [-7.0; 4];

    let err = engine
        .unfold(&[0.0; 4], None, &mut unfolded, None)
        .unwrap_err();
    assert_eq!(err, UnfoldError::ZeroSum);
    assert_eq!(unfolded, [-7.0; 4]);

    let err = engine
        .unfold(&[1.0, -1.0, 2.0, 3.0], None, &mut unfolded, None)
        .unwrap_err();
    assert!(matches!(err, UnfoldError::NegativeCount { index: 1, .. }));
    assert_eq!(unfolded, [-7.0; 4]);

    let err = engine
        .unfold(&[1.0, 2.0, 3.0], None, &mut unfolded, None)
        .unwrap_err();
    assert!(matches!(err, UnfoldError::DimensionMismatch { .. }));

    let bad_cov = Matrix::<f64>::identity(3);
    let err = engine
        .unfold(&[1.0; 4], Some(&bad_cov), &mut unfolded, None)
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(unfolded, [-7.0; 4]);
}

#[test]
fn test_missing_filter_is_a_runtime_error() {
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .build(identity_response(3))
        .unwrap();
    let mut unfolded = [0.0; 3];
    let err = engine
        .unfold(&[1.0, 2.0, 3.0], None, &mut unfolded, None)
        .unwrap_err();
    assert_eq!(err, UnfoldError::FilterNotSet);
    assert!(err.is_runtime());
    assert_eq!(engine.smoothing_ndof().unwrap_err(), UnfoldError::FilterNotSet);
}

#[test]
fn test_filter_shape_must_match_unfolded_space() {
    let filter = DummyFilter::new(5);
    assert!(SmoothedEmUnfold1D::new(identity_response(4), &filter).is_err());
}

// ============================================================================
// Iteration Behavior
// ============================================================================

#[test]
fn test_zero_prediction_in_populated_bin_is_a_runtime_error() {
    let filter = DummyFilter::new(3);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(3), &filter).unwrap();
    engine.set_initial_approximation(&[0.0, 1.0, 1.0]).unwrap();

    let mut unfolded = [-1.0; 3];
    let err = engine
        .unfold(&[2.0, 1.0, 1.0], None, &mut unfolded, None)
        .unwrap_err();
    assert_eq!(
        err,
        UnfoldError::NonPositivePrediction {
            bin: 0,
            predicted: 0.0,
            observed: 2.0,
        }
    );
    assert!(err.is_runtime());
    assert_eq!(unfolded, [-1.0; 3]);
}

#[test]
fn test_constant_spectrum_is_a_fixed_point() {
    let filter = symbeta_lorpe_filter_1d::<f64>(
        4,
        3.0,
        0.0,
        10,
        0.0,
        10.0,
        BoundaryMethod::Truncate,
        None,
        false,
    )
    .unwrap();
    let mut engine = SmoothedEmUnfold1D::new(identity_response(10), &filter).unwrap();
    let out = engine.unfold_to_result(&[4.0; 10], None, false).unwrap();

    assert!(out.converged);
    assert_eq!(out.iterations, 1);
    assert!(out.covariance.is_none());
    for v in &out.unfolded {
        assert_relative_eq!(*v, 4.0, epsilon = 1e-10);
    }
    assert_relative_eq!(out.normfactor, 1.0, epsilon = 1e-10);
}

#[test]
fn test_unit_efficiency_preserves_total() {
    let filter = symbeta_lorpe_filter_1d::<f64>(
        2,
        2.0,
        1.0,
        5,
        0.0,
        5.0,
        BoundaryMethod::Reflect,
        None,
        false,
    )
    .unwrap();
    let response = DenseResponse::new(unit_efficiency_smearing()).unwrap();
    let mut engine = SmoothedEmUnfold1D::new(response, &filter).unwrap();
    engine.set_max_iterations(50);

    let observed = [6.0, 14.0, 20.0, 12.0, 8.0];
    let out = engine.unfold_to_result(&observed, None, false).unwrap();
    assert_relative_eq!(out.unfolded.iter().sum::<f64>(), 60.0, epsilon = 1e-9);
    assert!(out.unfolded.iter().all(|&v| v >= 0.0));
}

#[test]
fn test_zero_iterations_returns_initial_approximation() {
    let filter = DummyFilter::new(4);
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .max_iterations(0)
        .build(identity_response(4))
        .unwrap();

    let out = engine
        .unfold_to_result(&[1.0, 2.0, 3.0, 6.0], None, false)
        .unwrap();
    assert!(!out.converged);
    assert_eq!(out.iterations, 0);
    assert_eq!(engine.last_n_iterations(), 0);
    for v in &out.unfolded {
        assert_relative_eq!(*v, 3.0, epsilon = 1e-12);
    }

    engine.set_initial_approximation(&[1.0, 1.0, 2.0, 2.0]).unwrap();
    let out = engine
        .unfold_to_result(&[1.0, 2.0, 3.0, 6.0], None, false)
        .unwrap();
    assert_eq!(out.unfolded, vec![1.0, 1.0, 2.0, 2.0]);
    assert!(engine.set_initial_approximation(&[1.0, 2.0]).is_err());
}

#[test]
fn test_identity_problem_converges_immediately() {
    let filter = DummyFilter::new(4);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(4), &filter).unwrap();
    let out = engine.unfold_to_result(&[5.0; 4], None, true).unwrap();
    assert!(out.converged);
    assert_eq!(out.iterations, 1);
    assert_eq!(out.unfolded.len(), 4);
    for v in &out.unfolded {
        assert_relative_eq!(*v, 5.0, epsilon = 1e-12);
    }
}

#[test]
fn test_single_update() {
    let filter = DummyFilter::new(3);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(3), &filter).unwrap();
    let observed = [2.0, 4.0, 8.0];
    let mut next = [0.0; 3];
    engine
        .update(&observed, &[1.0, 1.0, 1.0], &mut next, false)
        .unwrap();
    for i in 0..3 {
        assert_relative_eq!(next[i], observed[i], epsilon = 1e-12);
    }
    engine
        .update(&observed, &[3.0, 1.0, 7.0], &mut next, true)
        .unwrap();
    for i in 0..3 {
        assert_relative_eq!(next[i], observed[i], epsilon = 1e-12);
    }
    assert!(engine.update(&observed, &[1.0; 2], &mut next, true).is_err());
}

#[test]
fn test_gaussian_smearing_end_to_end() {
    let n_unf = 40;
    let unfolded_bins = UniformBins::new(n_unf, 0.0, 10.0).unwrap();
    let observed_bins = UniformBins::new(60, -2.0, 12.0).unwrap();
    let matrix: Matrix<f64> =
        gaussian_response_matrix(unfolded_bins, observed_bins, |x| x, |_| 0.6, 8).unwrap();

    // Gaussian bump with 1000 events.
    let bin_width = 10.0 / n_unf as f64;
    let truth: Vec<f64> = (0..n_unf)
        .map(|i| {
            let x = (i as f64 + 0.5) * bin_width;
            let z = (x - 5.0) / 1.5;
            let norm = 1.5 * (2.0 * std::f64::consts::PI).sqrt();
            1000.0 * bin_width * (-0.5 * z * z).exp() / norm
        })
        .collect();
    let observed = matrix.times_vector(&truth).unwrap();

    let filter = symbeta_lorpe_filter_1d::<f64>(
        4,
        1.0,
        2.0,
        n_unf,
        0.0,
        10.0,
        BoundaryMethod::Truncate,
        None,
        false,
    )
    .unwrap();
    let response = DenseResponse::new(matrix.clone()).unwrap();
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .max_iterations(5_000)
        .convergence_epsilon(1e-7)
        .build(response)
        .unwrap();

    let out = engine.unfold_to_result(&observed, None, true).unwrap();
    assert!(out.iterations > 1);
    assert!(out.unfolded.iter().all(|&v| v >= 0.0));

    let eff = engine.base().efficiency().to_vec();
    let folded_total: f64 = out.unfolded.iter().zip(&eff).map(|(u, e)| u * e).sum();
    let observed_total: f64 = observed.iter().sum();
    assert_relative_eq!(folded_total, observed_total, max_relative = 1e-9);

    let peak = out
        .unfolded
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert!((18..=21).contains(&peak), "peak at bin {peak}");

    let cov = out.covariance.unwrap();
    assert_eq!(cov.n_rows(), n_unf);
    for i in 0..n_unf {
        assert!(cov[(i, i)] >= 0.0);
        for j in 0..i {
            assert_relative_eq!(cov[(i, j)], cov[(j, i)], epsilon = 1e-8, max_relative = 1e-8);
        }
    }
}

// ============================================================================
// Covariance
// ============================================================================

#[test]
fn test_poisson_covariance_of_identity_problem() {
    let filter = DummyFilter::new(4);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(4), &filter).unwrap();
    let observed = [2.0, 4.0, 6.0, 8.0];
    let out = engine.unfold_to_result(&observed, None, true).unwrap();
    assert!(out.converged);

    let cov = out.covariance.unwrap();
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { observed[i] } else { 0.0 };
            assert_relative_eq!(cov[(i, j)], expected, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_explicit_observation_covariance_is_propagated() {
    let filter = DummyFilter::new(3);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(3), &filter).unwrap();
    let sigma = Matrix::from_rows(&[
        vec![2.0, 0.5, 0.0],
        vec![0.5, 3.0, 0.1],
        vec![0.0, 0.1, 1.0],
    ])
    .unwrap();
    let out = engine
        .unfold_to_result(&[3.0, 3.0, 6.0], Some(&sigma), true)
        .unwrap();
    let cov = out.covariance.unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert_relative_eq!(cov[(i, j)], sigma[(i, j)], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_multinomial_covariance_rows_sum_to_zero() {
    let filter = DummyFilter::new(4);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(4), &filter).unwrap();
    engine.use_multinomial_covariance(true);
    assert!(engine.using_multinomial_covariance());

    let out = engine
        .unfold_to_result(&[3.0, 5.0, 7.0, 9.0], None, true)
        .unwrap();
    let cov = out.covariance.unwrap();
    for i in 0..4 {
        assert_relative_eq!(cov.row_sum(i), 0.0, epsilon = 1e-9);
        for j in 0..4 {
            assert_relative_eq!(cov[(i, j)], cov[(j, i)], epsilon = 1e-12);
        }
    }
    // N p (1 - p) with N = 24, p = 3 / 24.
    assert_relative_eq!(cov[(0, 0)], 3.0 * 21.0 / 24.0, epsilon = 1e-9);
}

#[test]
fn test_unsmoothed_last_iteration_with_identity_filter() {
    let filter = DummyFilter::new(5);
    let observed = [6.0, 14.0, 20.0, 12.0, 8.0];
    let response = || DenseResponse::new(unit_efficiency_smearing()).unwrap();

    let mut smoothed = SmoothedEmUnfold1D::new(response(), &filter).unwrap();
    let a = smoothed.unfold_to_result(&observed, None, true).unwrap();

    let mut raw = SmoothedEmUnfold1D::new(response(), &filter).unwrap();
    raw.smooth_last_iteration(false);
    assert!(!raw.smoothing_last_iteration());
    let b = raw.unfold_to_result(&observed, None, true).unwrap();

    assert!(a.converged && b.converged);
    assert_eq!(a.iterations, b.iterations);
    for i in 0..5 {
        assert_relative_eq!(a.unfolded[i], b.unfolded[i], max_relative = 1e-8);
    }
    // The solution folds back onto the data.
    let folded = unit_efficiency_smearing().times_vector(&b.unfolded).unwrap();
    for i in 0..5 {
        assert_relative_eq!(folded[i], observed[i], max_relative = 1e-6);
    }
    let (ca, cb) = (a.covariance.unwrap(), b.covariance.unwrap());
    for i in 0..5 {
        for j in 0..5 {
            assert_relative_eq!(ca[(i, j)], cb[(i, j)], epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

/// Unfold `observed` in convolution mode, with unit observation covariance.
fn convolve_unfold(
    filter: &LocalPolyFilter1D<f64>,
    smooth_last: bool,
    observed: &[f64],
) -> (Vec<f64>, Matrix<f64>) {
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(filter)
        .use_convolutions(true)
        .smooth_last_iteration(smooth_last)
        .convergence_epsilon(1e-13)
        .build(DenseResponse::new(unit_efficiency_smearing()).unwrap())
        .unwrap();
    let sigma = Matrix::identity(observed.len());
    let out = engine
        .unfold_to_result(observed, Some(&sigma), true)
        .unwrap();
    assert!(out.converged);
    (out.unfolded, out.covariance.unwrap())
}

#[test]
fn test_convolution_mode_covariance_matches_finite_differences() {
    let filter = symbeta_lorpe_filter_1d::<f64>(
        4,
        1.5,
        0.0,
        5,
        0.0,
        5.0,
        BoundaryMethod::Truncate,
        None,
        false,
    )
    .unwrap();
    let observed = [6.0, 14.0, 20.0, 12.0, 8.0];
    let h = 1e-3;

    for smooth_last in [true, false] {
        let (_, cov) = convolve_unfold(&filter, smooth_last, &observed);

        // jac[i][k] = d unfolded_i / d observed_k
        let mut jac = vec![vec![0.0; 5]; 5];
        for k in 0..5 {
            let mut up = observed;
            let mut down = observed;
            up[k] += h;
            down[k] -= h;
            let (u_up, _) = convolve_unfold(&filter, smooth_last, &up);
            let (u_down, _) = convolve_unfold(&filter, smooth_last, &down);
            for i in 0..5 {
                jac[i][k] = (u_up[i] - u_down[i]) / (2.0 * h);
            }
        }

        for i in 0..5 {
            for j in 0..5 {
                let expected: f64 = (0..5).map(|k| jac[i][k] * jac[j][k]).sum();
                assert_relative_eq!(cov[(i, j)], expected, epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }
}

// ============================================================================
// Sparse Responses
// ============================================================================

#[test]
fn test_sparse_and_dense_unfolds_agree() {
    let filter = DummyFilter::new(5);
    let observed = [6.0, 14.0, 20.0, 12.0, 8.0];

    let dense_response = DenseResponse::new(unit_efficiency_smearing()).unwrap();
    let mut dense = SmoothedEmUnfoldND::new(dense_response, &filter).unwrap();
    let a = dense.unfold_to_result(&observed, None, true).unwrap();

    let sparse_response =
        ResponseMatrix::from_dense(vec![5], vec![5], &unit_efficiency_smearing()).unwrap();
    let mut sparse = SmoothedEmSparseUnfoldND::new(sparse_response, &filter).unwrap();
    let b = sparse.unfold_to_result(&observed, None, true).unwrap();

    assert!(a.converged && b.converged);
    for i in 0..5 {
        assert_relative_eq!(a.unfolded[i], b.unfolded[i], max_relative = 1e-8);
    }
    let (ca, cb) = (a.covariance.unwrap(), b.covariance.unwrap());
    for i in 0..5 {
        for j in 0..5 {
            assert_relative_eq!(ca[(i, j)], cb[(i, j)], epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

// ============================================================================
// Configuration and Diagnostics
// ============================================================================

#[test]
fn test_configuration_accessors() {
    let filter = DummyFilter::new(3);
    let mut engine = SmoothedEmUnfold1D::new(identity_response(3), &filter).unwrap();
    assert_eq!(engine.max_iterations(), 100_000);
    assert_eq!(engine.convergence_epsilon(), 1e-10);
    assert!(engine.smoothing_last_iteration());
    assert!(!engine.using_multinomial_covariance());

    engine.set_convergence_epsilon(-1.0);
    assert_eq!(engine.convergence_epsilon(), 0.0);
    engine.use_convolutions(true);
    assert!(engine.config().use_convolutions);
    assert!(engine.base().using_convolutions());
    assert!(engine.set_stall_threshold(0).is_err());
    assert!(engine.set_stall_threshold(8).is_ok());
    assert_eq!(engine.config().stall_threshold, 8);
}

#[test]
fn test_degrees_of_freedom() {
    let filter = DummyFilter::new(5);
    let engine = SmoothedEmUnfold1D::new(identity_response(5), &filter).unwrap();
    for (entropic, trace) in [
        engine.smoothing_ndof().unwrap(),
        engine.response_ndof().unwrap(),
        engine.smoothed_response_ndof().unwrap(),
    ] {
        assert_relative_eq!(entropic, 5.0, epsilon = 1e-9);
        assert_relative_eq!(trace, 5.0, epsilon = 1e-9);
    }

    let wide = symbeta_lorpe_filter_1d::<f64>(
        4,
        3.0,
        0.0,
        5,
        0.0,
        5.0,
        BoundaryMethod::Truncate,
        None,
        false,
    )
    .unwrap();
    let smoothing = SmoothedEmUnfold1D::new(identity_response(5), &wide).unwrap();
    let (entropic, _) = smoothing.smoothing_ndof().unwrap();
    assert!(entropic < 5.0);
    assert_eq!(smoothing.base().response().unfolded_len(), 5);
}
