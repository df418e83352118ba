//! Traversal throughput of NdIter
//!
//! Run with: cargo bench --bench nditer_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use strided_nditer::{ArrayView, CastingRule, Element, IterFlags, NdIter};

fn random_data(len: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.gen::<f64>()).collect()
}

fn sum_values<S: Element, T: Element + Into<f64>>(it: &mut NdIter<'_, S, T>) -> f64 {
    let mut acc = 0.0;
    while !it.is_finished().unwrap() {
        acc += it.value().unwrap().into();
        it.advance().unwrap();
    }
    acc
}

/// Contiguous row-major traversal, with and without coalescing
fn bench_contiguous(c: &mut Criterion) {
    let mut group = c.benchmark_group("contiguous");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for n in [64usize, 256, 1024] {
        let data = random_data(n * n);
        let view = ArrayView::row_major(&data, &[n, n]).unwrap();
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_with_input(BenchmarkId::new("multi_index", n), &n, |bench, _| {
            bench.iter(|| {
                let mut it: NdIter<'_, f64> =
                    NdIter::new(&view, IterFlags::empty(), CastingRule::Safe).unwrap();
                black_box(sum_values(&mut it))
            })
        });

        group.bench_with_input(BenchmarkId::new("coalesced", n), &n, |bench, _| {
            bench.iter(|| {
                let mut it: NdIter<'_, f64> =
                    NdIter::new(&view, IterFlags::empty(), CastingRule::Safe).unwrap();
                it.remove_multi_index().unwrap();
                black_box(sum_values(&mut it))
            })
        });
    }
    group.finish();
}

/// Transposed 3D view: memory order differs from logical order
fn bench_permuted(c: &mut Criterion) {
    let mut group = c.benchmark_group("permuted");
    group.sample_size(20);

    for n in [16usize, 64] {
        let data = random_data(n * n * n);
        let base = ArrayView::row_major(&data, &[n, n, n]).unwrap();
        let view = base.permute(&[2, 0, 1]).unwrap();
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_with_input(BenchmarkId::new("memory_order", n), &n, |bench, _| {
            bench.iter(|| {
                let mut it: NdIter<'_, f64> =
                    NdIter::new(&view, IterFlags::empty(), CastingRule::Safe).unwrap();
                black_box(sum_values(&mut it))
            })
        });
    }
    group.finish();
}

/// Buffered f32 -> f64 reads
fn bench_buffered_cast(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_cast");
    group.sample_size(20);

    for n in [256usize, 1024] {
        let data: Vec<f32> = random_data(n * n).into_iter().map(|x| x as f32).collect();
        let view = ArrayView::row_major(&data, &[n, n]).unwrap();
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_with_input(BenchmarkId::new("f32_to_f64", n), &n, |bench, _| {
            bench.iter(|| {
                let mut it =
                    NdIter::<f32, f64>::new(&view, IterFlags::BUFFERED, CastingRule::Safe).unwrap();
                black_box(sum_values(&mut it))
            })
        });

        let strided = ArrayView::new(&data, &[n, n / 2], &[n as isize, 2], 0).unwrap();
        group.bench_with_input(BenchmarkId::new("f32_to_f64_strided", n), &n, |bench, _| {
            bench.iter(|| {
                let mut it =
                    NdIter::<f32, f64>::new(&strided, IterFlags::BUFFERED, CastingRule::Safe)
                        .unwrap();
                black_box(sum_values(&mut it))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_contiguous, bench_permuted, bench_buffered_cast);
criterion_main!(benches);
