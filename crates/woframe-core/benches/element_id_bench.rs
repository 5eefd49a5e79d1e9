//! Benchmarks for the element ID cursor, key paths and string patterns.
//!
//! Run with: cargo bench -p woframe-core --bench element_id_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use woframe_core::{ElementId, Record, Value, pattern, value_for_key_path};

/// Walk a tree of `width` children per level, `depth` levels deep, the way
/// a compound element drives the cursor.
fn walk(id: &mut ElementId, width: u64, depth: u32) -> usize {
    if depth == 0 {
        return id.depth();
    }
    let mut visited = 0;
    id.append_zero();
    for _ in 0..width {
        visited += walk(id, width, depth - 1);
        id.increment_last();
    }
    id.delete_last();
    visited
}

fn bench_tree_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_id/walk");
    for (width, depth) in [(10, 2), (10, 3), (4, 6)] {
        let leaves = u64::pow(width, depth);
        group.throughput(Throughput::Elements(leaves));
        group.bench_with_input(
            BenchmarkId::new("compound", format!("{width}^{depth}")),
            &(width, depth),
            |b, &(width, depth)| {
                b.iter(|| {
                    let mut id = ElementId::new();
                    black_box(walk(&mut id, width, depth))
                });
            },
        );
    }
    group.finish();
}

fn bench_prefix(c: &mut Criterion) {
    let id = ElementId::parse("0.3.1.12.4");
    c.bench_function("element_id/is_prefix_of", |b| {
        b.iter(|| black_box(id.is_prefix_of(black_box("0.3.1.12.4.7.2"))));
    });
}

fn bench_key_paths(c: &mut Criterion) {
    let address = Arc::new(Record::new("address").with("city", "Lisbon"));
    let customer = Arc::new(Record::new("customer").with("address", Value::object(address)));
    let order = Record::new("order").with("customer", Value::object(customer)).with("count", 3);

    let mut group = c.benchmark_group("kvc");
    group.bench_function("key_path/3", |b| {
        b.iter(|| black_box(value_for_key_path(&order, black_box("customer.address.city"))));
    });
    group.bench_function("pattern", |b| {
        b.iter(|| black_box(pattern::format(black_box("%(count)s items for %(customer.address.city)s"), &order)));
    });
    group.finish();
}

criterion_group!(benches, bench_tree_walk, bench_prefix, bench_key_paths);
criterion_main!(benches);
