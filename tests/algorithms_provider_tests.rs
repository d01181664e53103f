#![cfg(feature = "dev")]

use std::sync::Arc;

use emunfold_rs::internals::algorithms::filter::UnfoldingFilter;
use emunfold_rs::internals::algorithms::provider::{
    FilterProvider, MemoizingSymbetaFilterProvider, SimpleSymbetaFilterProvider,
    SymbetaFilterParams,
};
use emunfold_rs::internals::math::boundary::BoundaryMethod;
use emunfold_rs::internals::primitives::errors::UnfoldError;

fn params(bandwidth: f64) -> SymbetaFilterParams {
    SymbetaFilterParams::new(4, bandwidth, 1.0, 20, 0.5, BoundaryMethod::Truncate).unwrap()
}

#[test]
fn test_memoizing_provider_shares_filters() {
    let mut provider = MemoizingSymbetaFilterProvider::<f64>::new();
    assert!(provider.is_memoizing());

    let a = provider.provide_filter(&params(2.0)).unwrap();
    let b = provider.provide_filter(&params(2.0)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(provider.n_memoized(), 1);
    assert_eq!(a.data_len(), 20);

    let c = provider.provide_filter(&params(3.0)).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(provider.n_memoized(), 2);

    // Exclusions are part of the key.
    let excluded = params(2.0).with_excluded_bin(4);
    let d = provider.provide_filter(&excluded).unwrap();
    assert!(!Arc::ptr_eq(&a, &d));
    assert_eq!(provider.n_memoized(), 3);
}

#[test]
fn test_stopped_provider_serves_but_does_not_cache() {
    let mut provider = MemoizingSymbetaFilterProvider::<f64>::new();
    let cached = provider.provide_filter(&params(1.0)).unwrap();

    provider.stop_memoizing();
    assert!(!provider.is_memoizing());
    let fresh_a = provider.provide_filter(&params(5.0)).unwrap();
    let fresh_b = provider.provide_filter(&params(5.0)).unwrap();
    assert!(!Arc::ptr_eq(&fresh_a, &fresh_b));
    assert_eq!(provider.n_memoized(), 1);

    // Existing entries are still served.
    let again = provider.provide_filter(&params(1.0)).unwrap();
    assert!(Arc::ptr_eq(&cached, &again));

    provider.start_memoizing();
    provider.provide_filter(&params(5.0)).unwrap();
    assert_eq!(provider.n_memoized(), 2);
}

#[test]
fn test_known_bandwidths_sorted_and_unique() {
    let mut provider = MemoizingSymbetaFilterProvider::<f64>::new();
    for bw in [3.0, 1.0, 2.0, 3.0] {
        provider.provide_filter(&params(bw)).unwrap();
    }
    provider
        .provide_filter(&params(2.0).with_central_point_excluded(true))
        .unwrap();
    assert_eq!(provider.n_memoized(), 4);
    assert_eq!(provider.known_bandwidth_values(), vec![1.0, 2.0, 3.0]);
    assert_eq!(provider.first_memoized_info().unwrap().bandwidth, 1.0);

    provider.clear();
    assert_eq!(provider.n_memoized(), 0);
    assert!(provider.known_bandwidth_values().is_empty());
}

#[test]
fn test_provider_errors() {
    let provider = MemoizingSymbetaFilterProvider::<f64>::new();
    assert_eq!(
        provider.first_memoized_info().unwrap_err(),
        UnfoldError::EmptyCache
    );

    assert_eq!(
        SymbetaFilterParams::new(4, -1.0, 1.0, 10, 1.0, BoundaryMethod::Truncate).unwrap_err(),
        UnfoldError::InvalidBandwidth(-1.0)
    );

    let mut memo = MemoizingSymbetaFilterProvider::<f64>::new();
    let negative = params(1.0).with_bandwidth(-2.0);
    assert_eq!(
        memo.provide_filter(&negative).unwrap_err(),
        UnfoldError::InvalidBandwidth(-2.0)
    );
    assert_eq!(memo.n_memoized(), 0);
}

#[test]
fn test_simple_provider_matches_memoized_filter() {
    let mut simple = SimpleSymbetaFilterProvider;
    let mut memo = MemoizingSymbetaFilterProvider::<f64>::new();
    let a: Arc<_> = FilterProvider::<f64>::provide_filter(&mut simple, &params(2.5)).unwrap();
    let b = memo.provide_filter(&params(2.5)).unwrap();
    assert_eq!(a.filter_matrix(), b.filter_matrix());
    assert_eq!(params(2.5), params(2.5));
    assert!(params(1.0) < params(2.0));
}
