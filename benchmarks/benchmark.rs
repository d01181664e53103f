//! Unfolding benchmarks using Criterion.
//!
//! Benchmarks cover:
//! - Scalability (25 to 200 unfolded bins)
//! - LOrPE polynomial degrees
//! - Error propagation on and off
//! - Dense versus sparse responses
//! - Multiscale pre-iteration
//! - Filter construction with and without memoization
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use emunfold_rs::prelude::*;
use rand::prelude::*;
use rand_distr::Poisson;
use std::hint::black_box;

// ============================================================================
// Data Generation with Reproducible RNG
// ============================================================================

/// Gaussian smearing of `n_bins` unfolded bins on [0, 10) into twice as many
/// observed bins on [-2, 12).
fn smearing(n_bins: usize) -> Matrix<f64> {
    let unfolded = UniformBins::new(n_bins, 0.0, 10.0).unwrap();
    let observed = UniformBins::new(2 * n_bins, -2.0, 12.0).unwrap();
    gaussian_response_matrix(unfolded, observed, |x| x, |x| 0.3 + 0.05 * x, 6).unwrap()
}

/// Two overlapping peaks on a falling background, folded and Poisson-fluctuated.
fn generate_observed(response: &Matrix<f64>, n_events: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_bins = response.n_cols();
    let width = 10.0 / n_bins as f64;

    let shape: Vec<f64> = (0..n_bins)
        .map(|i| {
            let x = (i as f64 + 0.5) * width;
            let peak = |mu: f64, sigma: f64| (-0.5 * ((x - mu) / sigma).powi(2)).exp();
            0.3 * (-x / 4.0).exp() + peak(3.5, 0.6) + 0.6 * peak(6.0, 0.9)
        })
        .collect();
    let total: f64 = shape.iter().sum();
    let truth: Vec<f64> = shape.iter().map(|s| s * n_events / total).collect();

    response
        .times_vector(&truth)
        .unwrap()
        .into_iter()
        .map(|mean| {
            if mean > 0.0 {
                Poisson::new(mean).unwrap().sample(&mut rng)
            } else {
                0.0
            }
        })
        .collect()
}

fn lorpe(n_bins: usize, bandwidth: f64, degree: f64) -> LocalPolyFilter1D<f64> {
    symbeta_lorpe_filter_1d(
        4,
        bandwidth,
        degree,
        n_bins,
        0.0,
        10.0,
        BoundaryMethod::Truncate,
        None,
        false,
    )
    .unwrap()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");
    group.sample_size(20);

    for n_bins in [25, 50, 100, 200] {
        group.throughput(Throughput::Elements(n_bins as u64));

        let matrix = smearing(n_bins);
        let observed = generate_observed(&matrix, 10_000.0, 42);
        let filter = lorpe(n_bins, 0.8, 2.0);

        group.bench_with_input(BenchmarkId::new("dense", n_bins), &n_bins, |b, _| {
            b.iter(|| {
                EmUnfold::<f64>::new()
                    .filter(&filter)
                    .max_iterations(2_000)
                    .convergence_epsilon(1e-8)
                    .build(DenseResponse::new(matrix.clone()).unwrap())
                    .unwrap()
                    .unfold_to_result(black_box(&observed), None, false)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_degree(c: &mut Criterion) {
    let mut group = c.benchmark_group("degree");
    group.sample_size(30);

    let n_bins = 50;
    let matrix = smearing(n_bins);
    let observed = generate_observed(&matrix, 10_000.0, 7);

    for degree in [0.0, 1.0, 1.5, 2.0, 3.0] {
        let filter = lorpe(n_bins, 0.8, degree);
        group.bench_with_input(BenchmarkId::new("lorpe", degree), &degree, |b, _| {
            b.iter(|| {
                EmUnfold::<f64>::new()
                    .filter(&filter)
                    .max_iterations(2_000)
                    .build(DenseResponse::new(matrix.clone()).unwrap())
                    .unwrap()
                    .unfold_to_result(black_box(&observed), None, false)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_covariance(c: &mut Criterion) {
    let mut group = c.benchmark_group("covariance");
    group.sample_size(20);

    let n_bins = 50;
    let matrix = smearing(n_bins);
    let observed = generate_observed(&matrix, 10_000.0, 11);
    let filter = lorpe(n_bins, 0.8, 2.0);

    for (name, multinomial) in [("poisson", false), ("multinomial", true)] {
        group.bench_function(name, |b| {
            let mut unfolder = EmUnfold::<f64>::new()
                .filter(&filter)
                .max_iterations(2_000)
                .multinomial_covariance(multinomial)
                .build(DenseResponse::new(matrix.clone()).unwrap())
                .unwrap();
            b.iter(|| {
                unfolder
                    .unfold_to_result(black_box(&observed), None, true)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_storage");
    group.sample_size(30);

    let n_bins = 100;
    let matrix = smearing(n_bins);
    let observed = generate_observed(&matrix, 50_000.0, 3);
    let filter = lorpe(n_bins, 0.8, 2.0);

    group.bench_function("dense", |b| {
        let mut unfolder = SmoothedEmUnfoldND::new(
            DenseResponse::new(matrix.clone()).unwrap(),
            &filter,
        )
        .unwrap();
        unfolder.set_max_iterations(2_000);
        b.iter(|| {
            unfolder
                .unfold_to_result(black_box(&observed), None, false)
                .unwrap()
        })
    });

    group.bench_function("sparse", |b| {
        let response =
            ResponseMatrix::from_dense(vec![n_bins], vec![2 * n_bins], &matrix).unwrap();
        let mut unfolder = SmoothedEmSparseUnfoldND::new(response, &filter).unwrap();
        unfolder.set_max_iterations(2_000);
        b.iter(|| {
            unfolder
                .unfold_to_result(black_box(&observed), None, false)
                .unwrap()
        })
    });
    group.finish();
}

fn bench_multiscale(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiscale");
    group.sample_size(20);

    let n_bins = 100;
    let matrix = smearing(n_bins);
    let observed = generate_observed(&matrix, 50_000.0, 5);
    let filter = lorpe(n_bins, 0.5, 2.0);

    group.bench_function("single_scale", |b| {
        let mut unfolder = EmUnfold::<f64>::new()
            .filter(&filter)
            .convergence_epsilon(1e-9)
            .build(DenseResponse::new(matrix.clone()).unwrap())
            .unwrap();
        b.iter(|| {
            unfolder
                .unfold_to_result(black_box(&observed), None, false)
                .unwrap()
        })
    });

    group.bench_function("multiscale", |b| {
        let config = MultiscaleConfig {
            symbeta_power: 4,
            max_degree: 2.0,
            x_min: 0.0,
            x_max: 10.0,
            boundary: BoundaryMethod::Truncate,
            min_bandwidth: 0.5,
            max_bandwidth: 4.0,
            n_filters: 6,
            iters_per_filter: 10,
        };
        let mut unfolder = EmUnfold::<f64>::new()
            .filter(&filter)
            .convergence_epsilon(1e-9)
            .build_multiscale(DenseResponse::new(matrix.clone()).unwrap(), config)
            .unwrap();
        b.iter(|| {
            unfolder
                .unfold_to_result(black_box(&observed), None, false)
                .unwrap()
        })
    });
    group.finish();
}

fn bench_filter_provider(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_provider");
    group.sample_size(50);

    let bandwidths = [0.5, 0.8, 1.2, 2.0];
    let params: Vec<SymbetaFilterParams> = bandwidths
        .iter()
        .map(|&bw| {
            SymbetaFilterParams::new(4, bw, 2.0, 100, 0.1, BoundaryMethod::Reflect).unwrap()
        })
        .collect();

    group.bench_function("memoized", |b| {
        let mut provider = MemoizingSymbetaFilterProvider::<f64>::new();
        b.iter(|| {
            for p in &params {
                black_box(provider.provide_filter(p).unwrap());
            }
        })
    });

    group.bench_function("rebuilt", |b| {
        let mut provider = MemoizingSymbetaFilterProvider::<f64>::new();
        provider.stop_memoizing();
        b.iter(|| {
            for p in &params {
                black_box(provider.provide_filter(p).unwrap());
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_scalability,
    bench_degree,
    bench_covariance,
    bench_sparse,
    bench_multiscale,
    bench_filter_provider,
);
criterion_main!(benches);
