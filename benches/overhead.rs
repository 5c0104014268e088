use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use latenza::{Engine, Tier};

const SPAN_ITERATIONS: usize = 100_000;

fn bench_span_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("span_overhead");

    let engine = Engine::new();

    for tier in Tier::ALL {
        let mut rec = engine.recorder();
        group.bench_function(BenchmarkId::new("start_stop", tier.to_string()), |b| {
            b.iter(|| {
                for _ in 0..SPAN_ITERATIONS {
                    rec.start(tier, "bench_span");
                    black_box(());
                    rec.stop(tier, "bench_span");
                }
            })
        });
    }

    // Baseline: the same span bracketed with Instant, the obvious stdlib
    // alternative.
    group.bench_function(BenchmarkId::new("instant_pair", "baseline"), |b| {
        b.iter(|| {
            for _ in 0..SPAN_ITERATIONS {
                let start = Instant::now();
                black_box(());
                black_box(start.elapsed());
            }
        })
    });

    group.finish();
}

fn bench_pulse_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("pulse_overhead");

    let engine = Engine::new();
    let mut rec = engine.recorder();

    group.bench_function("pulse", |b| {
        b.iter(|| {
            for _ in 0..SPAN_ITERATIONS {
                rec.pulse("bench_pulse");
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_span_overhead, bench_pulse_overhead);
criterion_main!(benches);
