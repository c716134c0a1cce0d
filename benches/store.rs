//! Benchmarks for spark-store
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use spark_store::{Target, Value, batch, cell, create_mutable, effect};

// =============================================================================
// CELL BENCHMARKS
// =============================================================================

fn bench_cell_read(c: &mut Criterion) {
    let count = cell(42i32);
    c.bench_function("cell_read", |b| b.iter(|| black_box(count.read())));
}

fn bench_cell_write_with_effect(c: &mut Criterion) {
    let count = cell(0i32);
    let _e = effect({
        let count = count.clone();
        move || {
            black_box(count.read());
        }
    });
    let mut n = 0;
    c.bench_function("cell_write_with_effect", |b| {
        b.iter(|| {
            n += 1;
            count.write(black_box(n))
        })
    });
}

// =============================================================================
// STORE BENCHMARKS
// =============================================================================

fn bench_store_create(c: &mut Criterion) {
    c.bench_function("store_create", |b| {
        b.iter(|| {
            let target = Target::from_entries([("a", 1), ("b", 2), ("c", 3)]);
            black_box(create_mutable(&target))
        })
    });
}

fn bench_store_untracked_get(c: &mut Criterion) {
    let state = create_mutable(Target::from_entries([("a", 1)])).unwrap();
    c.bench_function("store_untracked_get", |b| {
        b.iter(|| black_box(state.get("a")))
    });
}

fn bench_store_tracked_set(c: &mut Criterion) {
    let state = create_mutable(Target::from_entries([("a", 0)])).unwrap();
    let _e = effect({
        let state = state.clone();
        move || {
            black_box(state.get("a"));
        }
    });
    let mut n = 0.0;
    c.bench_function("store_tracked_set", |b| {
        b.iter(|| {
            n += 1.0;
            state.set("a", black_box(n))
        })
    });
}

fn bench_store_same_value_set(c: &mut Criterion) {
    let state = create_mutable(Target::from_entries([("a", 1)])).unwrap();
    c.bench_function("store_same_value_set", |b| {
        b.iter(|| state.set("a", black_box(1)))
    });
}

fn bench_array_push_pop(c: &mut Criterion) {
    let list = create_mutable(Target::from_values([1, 2, 3])).unwrap();
    let _e = effect({
        let list = list.clone();
        move || {
            black_box(list.len());
        }
    });
    c.bench_function("array_push_pop", |b| {
        b.iter(|| {
            list.push([black_box(4)]);
            black_box(list.pop())
        })
    });
}

fn bench_batched_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_writes");
    for size in [10usize, 100, 1000] {
        let state = create_mutable(Value::Null).unwrap();
        let _e = effect({
            let state = state.clone();
            move || {
                black_box(state.own_keys());
            }
        });
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut round = 0.0;
            b.iter(|| {
                round += 1.0;
                batch(|| {
                    for i in 0..size {
                        state.set(format!("k{i}"), round);
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(cell_benches, bench_cell_read, bench_cell_write_with_effect);

criterion_group!(
    store_benches,
    bench_store_create,
    bench_store_untracked_get,
    bench_store_tracked_set,
    bench_store_same_value_set,
    bench_array_push_pop,
    bench_batched_writes,
);

criterion_main!(cell_benches, store_benches);
