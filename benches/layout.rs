//! Performance benchmarks for the layout pipeline.
//!
//! Run with: `cargo bench --bench layout`
//!
//! ## Workloads
//!
//! | Benchmark | What it measures |
//! |-----------|------------------|
//! | `build` | Edges → timeline model |
//! | `ordering` | Barycenter sweeps only |
//! | `fit/space` | Full pipeline, space objective |
//! | `fit/wiggles` | Full pipeline, wiggle objective |

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use storyline_kernel::{
    ordering, InteractionEdge, LayoutPolicyV1, Minimize, NetworkBuilder, StorylineEngine,
    TimeGranularity, TimelineModel,
};

/// A ring of `size` entities around the ego over `years` years.
///
/// Each year the ego talks to a sliding window of neighbours, which also
/// talk to each other, so lines come and go and idle gaps appear.
fn make_edges(size: usize, years: i32) -> Vec<InteractionEdge> {
    let mut edges = Vec::new();
    for year in 0..years {
        let date = NaiveDate::from_ymd_opt(2000 + year, 1, 1).unwrap();
        for k in 0..4 {
            let i = (year as usize * 3 + k) % size;
            let j = (i + 5) % size;
            let weight = (k as u32 % 3) + 1;
            if k % 2 == 0 {
                edges.push(InteractionEdge::new(format!("n{i}"), "ego", date, weight));
            } else {
                edges.push(InteractionEdge::new("ego", format!("n{i}"), date, weight));
            }
            edges.push(InteractionEdge::new(format!("n{i}"), format!("n{j}"), date, 1));
        }
    }
    edges
}

fn make_model(size: usize, years: i32) -> TimelineModel {
    NetworkBuilder::new("ego")
        .granularity(TimeGranularity::Year)
        .build(&make_edges(size, years))
        .unwrap()
}

/// Benchmark model construction.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for years in [5, 20, 50] {
        let edges = make_edges(24, years);
        let builder = NetworkBuilder::new("ego").granularity(TimeGranularity::Year);

        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::new("years", years), &edges, |b, edges| {
            b.iter(|| builder.build(black_box(edges)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark the ordering stage alone.
fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering");

    for years in [5, 20, 50] {
        let model = make_model(24, years);
        group.bench_with_input(BenchmarkId::new("years", years), &model, |b, model| {
            b.iter(|| ordering(black_box(model), 10))
        });
    }

    group.finish();
}

/// Benchmark the full pipeline under both objectives.
fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");

    for minimize in [Minimize::Space, Minimize::Wiggles] {
        let engine = StorylineEngine::new(LayoutPolicyV1::minimizing(minimize));
        let label = match minimize {
            Minimize::Space => "space",
            Minimize::Wiggles => "wiggles",
        };

        for years in [5, 20, 50] {
            let model = make_model(24, years);
            group.throughput(Throughput::Elements(model.num_timestamps() as u64));
            group.bench_with_input(BenchmarkId::new(label, years), &model, |b, model| {
                b.iter(|| {
                    let layout = engine.fit(black_box(model)).unwrap();
                    assert!(layout.verify_fingerprint());
                    layout
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_ordering, bench_fit);
criterion_main!(benches);
