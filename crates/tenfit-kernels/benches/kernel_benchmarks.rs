//! Performance benchmarks for tenfit-kernels
//!
//! Run with: cargo bench -p tenfit-kernels
//!
//! Benchmarks cover:
//! - Khatri-Rao product (serial & parallel)
//! - Gramians and their Hadamard products
//! - MTTKRP

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scirs2_core::ndarray_ext::Array2;
use tenfit_core::DenseND;
use tenfit_kernels::*;

fn bench_khatri_rao(c: &mut Criterion) {
    let mut group = c.benchmark_group("khatri_rao");

    for &size in [10, 50, 100, 200].iter() {
        let rank = 16;
        let a = Array2::<f64>::from_shape_fn((size, rank), |(i, j)| (i + j) as f64);
        let b = Array2::<f64>::from_shape_fn((size, rank), |(i, j)| (i * j + 1) as f64);

        group.throughput(Throughput::Elements((size * size * rank) as u64));

        group.bench_with_input(
            BenchmarkId::new("serial", format!("{}x{}", size, rank)),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(khatri_rao(&a.view(), &b.view())));
            },
        );

        #[cfg(feature = "parallel")]
        group.bench_with_input(
            BenchmarkId::new("parallel", format!("{}x{}", size, rank)),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(khatri_rao_parallel(&a.view(), &b.view())));
            },
        );
    }
    group.finish();
}

fn bench_gramians(c: &mut Criterion) {
    let mut group = c.benchmark_group("gramians");

    for &rank in [4, 16, 64].iter() {
        let factors: Vec<Array2<f64>> = (0..3)
            .map(|k| Array2::from_shape_fn((200, rank), |(i, j)| ((i + j + k) as f64).sin()))
            .collect();
        let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

        group.bench_with_input(BenchmarkId::new("hadamard_except", rank), &rank, |bencher, _| {
            bencher.iter(|| {
                let grams = gramians(&views);
                black_box(hadamard_of_gramians(&grams, &[0]))
            });
        });
    }
    group.finish();
}

fn bench_mttkrp(c: &mut Criterion) {
    let mut group = c.benchmark_group("mttkrp");

    for &size in [10, 20, 40].iter() {
        let rank = 8;
        let tensor = DenseND::<f64>::from_elem(&[size, size, size], 0.5);
        let factors: Vec<Array2<f64>> = (0..3)
            .map(|_| Array2::from_shape_fn((size, rank), |(i, j)| (i + j) as f64 * 0.01))
            .collect();
        let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

        group.throughput(Throughput::Elements((size * size * size * rank) as u64));
        group.bench_with_input(BenchmarkId::new("mode1", size), &size, |bencher, _| {
            bencher.iter(|| black_box(mttkrp(&tensor.view(), &views, 1)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_khatri_rao, bench_gramians, bench_mttkrp);
criterion_main!(benches);
