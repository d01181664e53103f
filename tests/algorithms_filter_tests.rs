#![cfg(feature = "dev")]

use std::sync::Arc;

use approx::assert_relative_eq;

use emunfold_rs::internals::algorithms::filter::{DummyFilter, FilterRef, UnfoldingFilter};
use emunfold_rs::internals::algorithms::lorpe::{LocalPolyFilter1D, symbeta_lorpe_filter_1d};
use emunfold_rs::internals::algorithms::sequential::{SequentialFilterND, kronecker};
use emunfold_rs::internals::math::boundary::BoundaryMethod;
use emunfold_rs::internals::math::matrix::Matrix;
use emunfold_rs::internals::primitives::errors::UnfoldError;

fn lorpe(
    bandwidth: f64,
    degree: f64,
    n: usize,
    boundary: BoundaryMethod,
) -> LocalPolyFilter1D<f64> {
    symbeta_lorpe_filter_1d(4, bandwidth, degree, n, 0.0, n as f64, boundary, None, false)
        .unwrap()
}

// ============================================================================
// Dummy Filter
// ============================================================================

#[test]
fn test_dummy_filter_is_identity() {
    let f = DummyFilter::new(3);
    let mut out = [0.0; 3];
    UnfoldingFilter::<f64>::filter(&f, &[1.0, 2.0, 3.0], &mut out).unwrap();
    assert_eq!(out, [1.0, 2.0, 3.0]);
    UnfoldingFilter::<f64>::convolve(&f, &[4.0, 5.0, 6.0], &mut out).unwrap();
    assert_eq!(out, [4.0, 5.0, 6.0]);
    assert_eq!(UnfoldingFilter::<f64>::filter_matrix(&f), Matrix::identity(3));

    let mut short = [0.0; 2];
    assert!(UnfoldingFilter::<f64>::filter(&f, &[1.0, 2.0, 3.0], &mut short).is_err());
}

// ============================================================================
// LOrPE Filters
// ============================================================================

#[test]
fn test_degree_zero_rows_are_normalized() {
    for boundary in [BoundaryMethod::Truncate, BoundaryMethod::Reflect] {
        let f = lorpe(4.0, 0.0, 25, boundary);
        assert_eq!(f.n_bins(), 25);
        assert!(f.is_normalized(1e-10), "{boundary:?}");
        assert!(f.weights().as_slice().iter().all(|&w| w >= 0.0));
    }
}

#[test]
fn test_degree_one_reproduces_lines_in_interior() {
    let n = 30;
    let f = lorpe(5.0, 1.0, n, BoundaryMethod::Truncate);
    let line: Vec<f64> = (0..n).map(|i| 2.0 + 0.5 * i as f64).collect();
    let mut out = vec![0.0; n];
    f.filter(&line, &mut out).unwrap();
    for i in 6..n - 6 {
        assert_relative_eq!(out[i], line[i], epsilon = 1e-9);
    }
}

#[test]
fn test_filter_and_convolve_match_matrix_products() {
    let f = lorpe(3.0, 1.5, 12, BoundaryMethod::Reflect);
    let m = f.filter_matrix();
    let x: Vec<f64> = (0..12).map(|i| ((i * 7) % 5) as f64 + 1.0).collect();

    let mut filtered = vec![0.0; 12];
    f.filter(&x, &mut filtered).unwrap();
    let expected = m.times_vector(&x).unwrap();
    for i in 0..12 {
        assert_relative_eq!(filtered[i], expected[i], epsilon = 1e-12);
    }

    let mut convolved = vec![0.0; 12];
    f.convolve(&x, &mut convolved).unwrap();
    let expected = m.T().times_vector(&x).unwrap();
    for i in 0..12 {
        assert_relative_eq!(convolved[i], expected[i], epsilon = 1e-12);
    }
}

#[test]
fn test_zero_bandwidth_gives_identity() {
    let f = lorpe(0.0, 2.0, 7, BoundaryMethod::Truncate);
    assert_eq!(f.filter_matrix(), Matrix::identity(7));
}

#[test]
fn test_lorpe_argument_checks() {
    let bad_bw = symbeta_lorpe_filter_1d::<f64>(
        4,
        -1.0,
        1.0,
        10,
        0.0,
        1.0,
        BoundaryMethod::Truncate,
        None,
        false,
    );
    assert_eq!(bad_bw.unwrap_err(), UnfoldError::InvalidBandwidth(-1.0));

    let bad_interval = symbeta_lorpe_filter_1d::<f64>(
        4,
        1.0,
        1.0,
        10,
        1.0,
        0.0,
        BoundaryMethod::Truncate,
        None,
        false,
    );
    assert!(bad_interval.is_err());

    let bad_bin = symbeta_lorpe_filter_1d::<f64>(
        4,
        1.0,
        1.0,
        10,
        0.0,
        1.0,
        BoundaryMethod::Truncate,
        Some(10),
        false,
    );
    assert!(bad_bin.is_err());
}

#[test]
fn test_excluded_points_get_no_weight() {
    let f = symbeta_lorpe_filter_1d::<f64>(
        2,
        4.0,
        0.0,
        15,
        0.0,
        15.0,
        BoundaryMethod::Truncate,
        Some(7),
        true,
    )
    .unwrap();
    for i in 0..15 {
        assert_eq!(f.row(i)[7], 0.0);
        assert_eq!(f.row(i)[i], 0.0);
    }
    assert!(f.is_normalized(1e-10));
}

#[test]
fn test_from_matrix_requires_square() {
    let m = Matrix::<f64>::zeros(2, 3);
    assert!(matches!(
        LocalPolyFilter1D::from_matrix(m),
        Err(UnfoldError::InvalidFilter(_))
    ));
}

// ============================================================================
// Sequential Filter
// ============================================================================

#[test]
fn test_sequential_filter_matches_kronecker_product() {
    let fx: Arc<dyn UnfoldingFilter<f64>> =
        Arc::new(lorpe(2.0, 0.0, 4, BoundaryMethod::Truncate));
    let fy: Arc<dyn UnfoldingFilter<f64>> =
        Arc::new(lorpe(3.0, 1.0, 5, BoundaryMethod::Reflect));
    let seq = SequentialFilterND::new(vec![fx.clone(), fy.clone()]).unwrap();
    assert_eq!(seq.dim(), 2);
    assert_eq!(seq.data_shape(), &[4, 5]);

    let m = seq.filter_matrix();
    assert_eq!(m, kronecker(&fx.filter_matrix(), &fy.filter_matrix()));

    let x: Vec<f64> = (0..20).map(|i| (i as f64).sin().abs() + 0.1).collect();
    let mut out = vec![0.0; 20];
    seq.filter(&x, &mut out).unwrap();
    let expected = m.times_vector(&x).unwrap();
    for i in 0..20 {
        assert_relative_eq!(out[i], expected[i], epsilon = 1e-12);
    }

    seq.convolve(&x, &mut out).unwrap();
    let expected = m.T().times_vector(&x).unwrap();
    for i in 0..20 {
        assert_relative_eq!(out[i], expected[i], epsilon = 1e-12);
    }

    assert!(SequentialFilterND::<f64>::new(Vec::new()).is_err());
}

#[test]
fn test_kronecker_small() {
    let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![0.0, 1.0]]).unwrap();
    let b = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    let k = kronecker(&a, &b);
    assert_eq!(k.n_rows(), 4);
    assert_relative_eq!(k[(0, 1)], 1.0);
    assert_relative_eq!(k[(0, 3)], 2.0);
    assert_relative_eq!(k[(3, 2)], 1.0);
    assert_relative_eq!(k[(2, 1)], 0.0);
}

// ============================================================================
// Filter Handle
// ============================================================================

#[test]
fn test_filter_ref_variants() {
    let dummy = DummyFilter::new(4);
    let borrowed: FilterRef<'_, f64> = FilterRef::Borrowed(&dummy);
    let shared: FilterRef<'_, f64> = FilterRef::Shared(Arc::new(DummyFilter::new(4)));
    assert_eq!(borrowed.get().data_len(), 4);
    assert_eq!(shared.clone().get().data_shape(), &[4]);
}
