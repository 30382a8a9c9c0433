//! Benchmarks for detent catalog building.
//!
//! Run with: `cargo bench --package sheet-core --bench catalog_bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sheet_core::{DetentCatalog, RawDetent};
use std::hint::black_box;

// ============================================================================
// Input Generation
// ============================================================================

/// Mixed input with semantic, fraction, and points entries plus duplicates.
fn mixed_input(len: usize) -> Vec<RawDetent> {
    (0..len)
        .map(|i| match i % 5 {
            0 => RawDetent::semantic(["fit", "medium", "large"][i % 3]),
            1 => RawDetent::fraction((i % 100) as f64 / 100.0),
            2 => RawDetent::points(((i % 700) + 1) as f64),
            3 => RawDetent::points(200.0).with_identifier(format!("custom-{}", i % 17)),
            _ => RawDetent::fraction(1.5),
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_build");
    for len in [4usize, 16, 128] {
        let input = mixed_input(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter(|| DetentCatalog::build(black_box(input)));
        });
    }
    group.finish();
}

fn bench_rebuild_normalized(c: &mut Criterion) {
    let normalized = DetentCatalog::build(&mixed_input(128)).catalog.to_raw();
    c.bench_function("catalog_rebuild_normalized", |b| {
        b.iter(|| DetentCatalog::build(black_box(&normalized)));
    });
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_build, bench_rebuild_normalized);

criterion_main!(benches);
