//! Benchmarks for interest tracking.
//!
//! Every stream open and close goes through the tracker and recomputes the
//! union, so these measure the cost paid on the subscription hot path:
//! - Union normalization over many interests
//! - Append/remove churn with a steady population of registrations
//! - Churn from concurrent threads contending on the tracker

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use registry_interest::core::InterestTracker;
use registry_interest::model::Interest;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn applications(count: usize) -> Vec<Interest> {
    (0..count)
        .map(|i| Interest::application(format!("app-{i}")))
        .collect()
}

/// Benchmark union computation for growing interest sets
fn benchmark_union_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("union_all");

    for size in [1, 16, 128, 1024] {
        let interests = applications(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &interests, |b, interests| {
            b.iter(|| black_box(Interest::union_all(interests.iter().cloned())));
        });
    }

    group.finish();
}

/// Benchmark a single append/remove pair against a populated tracker
fn benchmark_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    for population in [0, 64, 512] {
        let tracker = InterestTracker::new();
        for interest in applications(population) {
            tracker.append_interest(interest);
        }
        let churned = Interest::application("churned");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_live", population)),
            &population,
            |b, _| {
                b.iter(|| {
                    tracker.append_interest(churned.clone());
                    black_box(tracker.remove_interest(&churned));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark churn with several threads sharing one tracker
fn benchmark_concurrent_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_churn");

    for num_threads in [1, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let tracker = Arc::new(InterestTracker::new());
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for t in 0..num_threads {
                        let tracker = Arc::clone(&tracker);
                        let barrier = Arc::clone(&barrier);
                        let interest = Interest::application(format!("thread-{t}"));

                        handles.push(thread::spawn(move || {
                            barrier.wait();

                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                tracker.append_interest(interest.clone());
                                tracker.remove_interest(&interest);
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_union_all,
    benchmark_churn,
    benchmark_concurrent_churn
);
criterion_main!(benches);
