#![cfg(feature = "dev")]

use approx::assert_relative_eq;

use emunfold_rs::internals::algorithms::filter::{DummyFilter, FilterRef};
use emunfold_rs::internals::algorithms::response::DenseResponse;
use emunfold_rs::internals::api::EmUnfoldBuilder;
use emunfold_rs::internals::engine::executor::SmoothedEmUnfold1D;
use emunfold_rs::internals::engine::preiterate::{
    MultiscaleConfig, MultiscalePreIteration, log_equidistant_bandwidths,
};
use emunfold_rs::internals::math::boundary::BoundaryMethod;
use emunfold_rs::internals::math::matrix::Matrix;
use emunfold_rs::internals::primitives::errors::UnfoldError;

const OBSERVED: [f64; 5] = [6.0, 14.0, 20.0, 12.0, 8.0];

fn response() -> DenseResponse<f64> {
    let m = Matrix::from_rows(&[
        vec![0.8, 0.2, 0.0, 0.0, 0.0],
        vec![0.2, 0.6, 0.2, 0.0, 0.0],
        vec![0.0, 0.2, 0.6, 0.2, 0.0],
        vec![0.0, 0.0, 0.2, 0.6, 0.2],
        vec![0.0, 0.0, 0.0, 0.2, 0.8],
    ])
    .unwrap();
    DenseResponse::new(m).unwrap()
}

fn config(n_filters: usize, iters_per_filter: usize) -> MultiscaleConfig {
    MultiscaleConfig {
        symbeta_power: 4,
        max_degree: 1.0,
        x_min: 0.0,
        x_max: 5.0,
        boundary: BoundaryMethod::Truncate,
        min_bandwidth: 1.5,
        max_bandwidth: 4.0,
        n_filters,
        iters_per_filter,
    }
}

#[test]
fn test_pre_iterations_count_against_budget() {
    let filter = DummyFilter::new(5);
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .max_iterations(3)
        .convergence_epsilon(0.0)
        .build_multiscale(response(), config(5, 2))
        .unwrap();

    let out = engine.unfold_to_result(&OBSERVED, None, false).unwrap();
    assert!(!out.converged);
    assert_eq!(out.iterations, 3);
    assert_eq!(engine.last_n_iterations(), 3);
    // Only the stages reached within the budget were built.
    assert_eq!(engine.pre_iteration().provider().n_memoized(), 2);
}

#[test]
fn test_original_filter_is_restored() {
    let filter = DummyFilter::new(5);
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .build_multiscale(response(), config(3, 2))
        .unwrap();
    engine.unfold_to_result(&OBSERVED, None, false).unwrap();
    assert!(matches!(
        engine.base().filter_ref(),
        Some(FilterRef::Borrowed(_))
    ));
}

#[test]
fn test_filters_are_memoized_across_unfolds() {
    let filter = DummyFilter::new(5);
    let mut engine = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .build_multiscale(response(), config(4, 3))
        .unwrap();
    assert_eq!(engine.pre_iteration().bandwidths().len(), 4);

    engine.unfold_to_result(&OBSERVED, None, false).unwrap();
    assert_eq!(engine.pre_iteration().provider().n_memoized(), 4);

    engine.unfold_to_result(&[5.0, 10.0, 15.0, 10.0, 5.0], None, false).unwrap();
    assert_eq!(engine.pre_iteration().provider().n_memoized(), 4);

    let known = engine.pre_iteration().provider().known_bandwidth_values();
    let mut expected = log_equidistant_bandwidths(1.5, 4.0, 4);
    expected.reverse();
    assert_eq!(known.len(), 4);
    for (k, e) in known.iter().zip(&expected) {
        assert_relative_eq!(*k, *e, epsilon = 1e-12);
    }
}

#[test]
fn test_multiscale_reaches_the_single_scale_solution() {
    let filter = DummyFilter::new(5);

    let mut single = SmoothedEmUnfold1D::new(response(), &filter).unwrap();
    let a = single.unfold_to_result(&OBSERVED, None, true).unwrap();

    let mut multi = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .build_multiscale(response(), config(4, 3))
        .unwrap();
    let b = multi.unfold_to_result(&OBSERVED, None, true).unwrap();

    assert!(a.converged && b.converged);
    assert!(multi.last_n_iterations() > 0);
    for i in 0..5 {
        assert_relative_eq!(a.unfolded[i], b.unfolded[i], max_relative = 1e-6);
    }
    let (ca, cb) = (a.covariance.unwrap(), b.covariance.unwrap());
    for i in 0..5 {
        assert_relative_eq!(ca[(i, i)], cb[(i, i)], max_relative = 1e-4);
    }
}

#[test]
fn test_invalid_multiscale_configs() {
    let mut bad = config(3, 2);
    bad.min_bandwidth = 0.0;
    assert_eq!(
        MultiscalePreIteration::<f64>::new(bad).unwrap_err(),
        UnfoldError::InvalidBandwidth(0.0)
    );

    let mut bad = config(3, 2);
    bad.max_bandwidth = 1.0;
    assert!(MultiscalePreIteration::<f64>::new(bad).is_err());

    assert!(config(0, 2).validate().is_err());

    let mut bad = config(3, 2);
    bad.x_max = bad.x_min;
    assert!(bad.validate().is_err());

    let mut bad = config(3, 2);
    bad.max_degree = -1.0;
    let filter = DummyFilter::new(5);
    let res = EmUnfoldBuilder::<f64>::new()
        .filter(&filter)
        .build_multiscale(response(), bad);
    assert!(res.is_err());

    let single = MultiscalePreIteration::<f64>::new(MultiscaleConfig {
        min_bandwidth: 2.0,
        max_bandwidth: 8.0,
        ..config(1, 2)
    })
    .unwrap();
    assert_eq!(single.bandwidths(), &[4.0]);
}

#[test]
fn test_bandwidths_run_widest_first() {
    let bw = log_equidistant_bandwidths(1.0, 100.0, 3);
    assert_eq!(bw.len(), 3);
    assert_relative_eq!(bw[0], 100.0, epsilon = 1e-9);
    assert_relative_eq!(bw[1], 10.0, epsilon = 1e-9);
    assert_relative_eq!(bw[2], 1.0, epsilon = 1e-9);
    assert_relative_eq!(log_equidistant_bandwidths(4.0, 9.0, 1)[0], 6.0, epsilon = 1e-12);
    assert!(log_equidistant_bandwidths(1.0, 2.0, 0).is_empty());
}
