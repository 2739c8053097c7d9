//! Store statistics.
//!
//! Counters for diagnostics and for tests that need to observe how the
//! upsert loop behaved (for example, that a conflict caused a re-read).

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for a [`PersistentDataStore`](crate::PersistentDataStore).
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Point lookups.
    gets: AtomicU64,
    /// Full collection scans.
    scans: AtomicU64,
    /// Completed bulk initializations.
    initializations: AtomicU64,
    /// Upserts that wrote their item.
    upserts_applied: AtomicU64,
    /// Upserts that found an equal or newer version and wrote nothing.
    upserts_stale: AtomicU64,
    /// Commits discarded because another writer changed the collection.
    upsert_conflicts: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_initialization(&self) {
        self.initializations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upsert_applied(&self) {
        self.upserts_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upsert_stale(&self) {
        self.upserts_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upsert_conflict(&self) {
        self.upsert_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            initializations: self.initializations.load(Ordering::Relaxed),
            upserts_applied: self.upserts_applied.load(Ordering::Relaxed),
            upserts_stale: self.upserts_stale.load(Ordering::Relaxed),
            upsert_conflicts: self.upsert_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Point lookups.
    pub gets: u64,
    /// Full collection scans.
    pub scans: u64,
    /// Completed bulk initializations.
    pub initializations: u64,
    /// Upserts that wrote their item.
    pub upserts_applied: u64,
    /// Upserts that wrote nothing because the stored version was not older.
    pub upserts_stale: u64,
    /// Watch conflicts that forced an upsert to start over.
    pub upsert_conflicts: u64,
}
