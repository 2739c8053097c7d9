//! Connection-level benchmarks for the in-memory backend.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flagstore_storage::{Connection, ConnectionPool, InMemoryPool, Transaction};

/// Benchmark acquiring and releasing a connection.
fn bench_acquire(c: &mut Criterion) {
    let pool = InMemoryPool::standalone();
    c.bench_function("acquire_release", |b| {
        b.iter(|| {
            let conn = pool.acquire().unwrap();
            black_box(&conn);
        });
    });
}

/// Benchmark hash reads.
fn bench_hget(c: &mut Criterion) {
    let pool = InMemoryPool::standalone();
    for i in 0..1000 {
        pool.server().hset("bench:features", format!("flag-{}", i), vec![0xAB; 256]);
    }
    let mut conn = pool.acquire().unwrap();

    c.bench_function("hget", |b| {
        b.iter(|| black_box(conn.hget("bench:features", black_box("flag-500")).unwrap()));
    });
}

/// Benchmark a watched single-field commit.
fn bench_watch_exec(c: &mut Criterion) {
    let pool = InMemoryPool::standalone();
    let mut conn = pool.acquire().unwrap();
    let value = vec![0xCD; 256];

    c.bench_function("watch_exec", |b| {
        b.iter(|| {
            conn.watch("bench:features").unwrap();
            let mut tx = Transaction::new();
            tx.hset("bench:features", "flag-1", value.clone());
            black_box(conn.exec(tx).unwrap());
        });
    });
}

criterion_group!(benches, bench_acquire, bench_hget, bench_watch_exec);
criterion_main!(benches);
