//! Data store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flagstore_bench::{flag_collection, flag_payload, populated_store};
use flagstore_core::{DataKind, PersistentDataStore, StoreConfig};
use flagstore_storage::InMemoryPool;

/// Benchmark point lookups.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let kind = DataKind::json("features");

    for size in [128, 1024, 8192].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = populated_store(&kind, 100, size);
            b.iter(|| {
                let item = store.get(&kind, black_box("flag-42")).unwrap();
                black_box(item);
            });
        });
    }

    group.bench_function("not_found", |b| {
        let store = populated_store(&kind, 100, 128);
        b.iter(|| black_box(store.get(&kind, black_box("missing")).unwrap()));
    });

    group.finish();
}

/// Benchmark full collection scans.
fn bench_get_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_all");
    let kind = DataKind::json("features");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = populated_store(&kind, count, 256);
            b.iter(|| black_box(store.get_all(&kind).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark version-ordered writes.
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    let kind = DataKind::json("features");

    group.bench_function("applied", |b| {
        let store = populated_store(&kind, 100, 256);
        let mut version = 1u64;
        b.iter(|| {
            version += 1;
            let item = flag_payload("flag-7", version, 256);
            black_box(store.upsert(&kind, "flag-7", &item).unwrap());
        });
    });

    group.bench_function("stale", |b| {
        let store = populated_store(&kind, 100, 256);
        let item = flag_payload("flag-7", 1, 256);
        b.iter(|| black_box(store.upsert(&kind, "flag-7", black_box(&item)).unwrap()));
    });

    group.finish();
}

/// Benchmark bulk initialization.
fn bench_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("init");
    group.sample_size(20);
    let kind = DataKind::json("features");

    for count in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = PersistentDataStore::with_pool(&StoreConfig::new(), InMemoryPool::standalone());
            let collection = flag_collection(&kind, count, 256);
            b.iter(|| black_box(store.init(std::slice::from_ref(&collection)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get, bench_get_all, bench_upsert, bench_init);
criterion_main!(benches);
