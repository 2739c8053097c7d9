//! Stress tests for flagstore.
//!
//! Several writer threads, each with its own pool, upsert overlapping
//! versions of the same keys against one shared server. This is the
//! multi-instance contention the upsert loop exists for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flagstore_core::UpsertOutcome;

use crate::fixtures::{features, flag};
use crate::integration::SharedBackend;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Upserts that wrote their item.
    pub applied_ops: usize,
    /// Upserts that found an equal or newer version.
    pub stale_ops: usize,
    /// Operations that returned an error.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(applied: usize, stale: usize, failed: usize, duration: Duration) -> Self {
        let total = applied + stale + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            applied_ops: applied,
            stale_ops: stale,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Applied: {}", self.applied_ops);
        println!("Stale: {}", self.stale_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writers, each with its own pool.
    pub writers: usize,
    /// Upserts issued by each writer.
    pub upserts_per_writer: usize,
    /// Number of distinct keys written.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            upserts_per_writer: 250,
            key_count: 4,
        }
    }
}

/// Runs concurrent upserts and returns the result plus the highest version
/// each writer attempted per key.
///
/// Writer `w` issues versions `w + 1, w + 1 + writers, ...` so every writer's
/// versions interleave with the others'. After the run, each key must hold
/// exactly the maximum version anyone attempted for it.
pub fn stress_concurrent_upserts(
    backend: &SharedBackend,
    prefix: &str,
    config: &StressConfig,
) -> (StressTestResult, HashMap<String, u64>) {
    let applied = Arc::new(AtomicUsize::new(0));
    let stale = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let key_count = config.key_count.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.writers)
        .map(|w| {
            let store = backend.store(prefix);
            let applied = Arc::clone(&applied);
            let stale = Arc::clone(&stale);
            let failed = Arc::clone(&failed);
            let writers = config.writers;
            let upserts = config.upserts_per_writer;

            thread::spawn(move || {
                let kind = features();
                let mut attempted: HashMap<String, u64> = HashMap::new();
                for i in 0..upserts {
                    let key = format!("flag-{}", (i + w) % key_count);
                    // Walk versions down as well as up so stale writes happen.
                    let step = if i % 5 == 4 { i.saturating_sub(3) } else { i };
                    let version = (w + 1 + step * writers) as u64;

                    match store.upsert(&kind, &key, &flag(&key, version)) {
                        Ok(UpsertOutcome::Applied) => {
                            applied.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(UpsertOutcome::Stale { .. }) => {
                            stale.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }
                    let max = attempted.entry(key).or_insert(0);
                    *max = (*max).max(version);
                }
                attempted
            })
        })
        .collect();

    let mut expected: HashMap<String, u64> = HashMap::new();
    for handle in handles {
        let attempted = handle.join().expect("writer thread panicked");
        for (key, version) in attempted {
            let max = expected.entry(key).or_insert(0);
            *max = (*max).max(version);
        }
    }

    let result = StressTestResult::new(
        applied.load(Ordering::Relaxed),
        stale.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    (result, expected)
}

/// Runs concurrent point lookups while one writer keeps upserting.
///
/// Every reader checks that the version it observes for the key never goes
/// backwards. Returns the read result.
pub fn stress_reads_during_writes(backend: &SharedBackend, prefix: &str, config: &StressConfig) -> StressTestResult {
    let writer_store = backend.store(prefix);
    let readers = config.writers.max(1);
    let reads = config.upserts_per_writer;
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let reader_handles: Vec<_> = (0..readers)
        .map(|_| {
            let store = backend.store(prefix);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                let kind = features();
                let mut last_seen = 0u64;
                for _ in 0..reads {
                    match store.get(&kind, "hot") {
                        Ok(item) => {
                            assert!(
                                item.version >= last_seen,
                                "version went backwards: {} after {}",
                                item.version,
                                last_seen
                            );
                            last_seen = item.version;
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    let kind = features();
    for version in 1..=reads as u64 {
        let _ = writer_store.upsert(&kind, "hot", &flag("hot", version));
    }

    for handle in reader_handles {
        handle.join().expect("reader thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        0,
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
