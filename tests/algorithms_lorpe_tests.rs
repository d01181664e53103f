#![cfg(feature = "dev")]

use approx::assert_relative_eq;

use emunfold_rs::internals::algorithms::lorpe::{
    Exclusion, LocalPolyFilter1D, MAX_POLY_DEGREE, degree_taper, lorpe_filter_1d,
    symbeta_lorpe_filter_1d,
};
use emunfold_rs::internals::engine::validator::Validator;
use emunfold_rs::internals::math::boundary::BoundaryMethod;
use emunfold_rs::internals::math::kernel::SymbetaKernel;

// ============================================================================
// Degree Taper
// ============================================================================

#[test]
fn test_fractional_degree_adds_partial_term() {
    assert_eq!(degree_taper(0.0).unwrap(), vec![1.0]);
    assert_eq!(degree_taper(2.0).unwrap(), vec![1.0, 1.0, 1.0]);
    assert_eq!(degree_taper(1.25).unwrap(), vec![1.0, 1.0, 0.25]);
    assert!(degree_taper(-1.0).is_err());
    assert!(degree_taper(f64::NAN).is_err());
}

#[test]
fn test_huge_degree_is_rejected() {
    assert_eq!(degree_taper(MAX_POLY_DEGREE).unwrap().len(), 101);
    assert!(degree_taper(MAX_POLY_DEGREE + 0.5).is_err());
    assert!(degree_taper(1e300).is_err());
    assert!(Validator::validate_degree(1e300).is_err());
    assert!(Validator::validate_degree(2.5).is_ok());

    let res = symbeta_lorpe_filter_1d::<f64>(
        4,
        1.0,
        1e18,
        10,
        0.0,
        10.0,
        BoundaryMethod::Truncate,
        None,
        false,
    );
    assert!(res.is_err());
}

// ============================================================================
// Filter Construction
// ============================================================================

#[test]
fn test_explicit_taper_rows_sum_to_one() {
    let f: LocalPolyFilter1D<f64> = lorpe_filter_1d(
        SymbetaKernel::new(2),
        3.0,
        &[1.0],
        10,
        1.0,
        BoundaryMethod::Truncate,
        Exclusion::default(),
    )
    .unwrap();
    for i in 0..10 {
        assert_relative_eq!(f.weights().row_sum(i), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_empty_taper_is_rejected() {
    let res = lorpe_filter_1d::<f64>(
        SymbetaKernel::new(2),
        3.0,
        &[],
        10,
        1.0,
        BoundaryMethod::Truncate,
        Exclusion::default(),
    );
    assert!(res.is_err());
}
