//! Multi-instance test harness.
//!
//! Several application instances sharing one database are simulated by
//! several pools attached to one [`InMemoryServer`]. The harness also plays
//! the external big-segment synchronizer, which writes keys this crate only
//! ever reads.

use std::sync::Arc;

use flagstore_core::{BigSegmentStore, Keyspace, PersistentDataStore, StoreConfig};
use flagstore_storage::{InMemoryPool, InMemoryServer, InMemoryStats};

/// A data store backed by its own pool on a shared server.
pub type TestStore = PersistentDataStore<InMemoryPool>;

/// A big-segment store backed by its own pool on a shared server.
pub type TestBigSegmentStore = BigSegmentStore<InMemoryPool>;

/// One in-memory server shared by every store created from it.
#[derive(Debug, Clone)]
pub struct SharedBackend {
    server: Arc<InMemoryServer>,
}

impl Default for SharedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedBackend {
    /// Creates a backend with an empty server.
    pub fn new() -> Self {
        Self {
            server: Arc::new(InMemoryServer::new()),
        }
    }

    /// Returns the underlying server.
    pub fn server(&self) -> &Arc<InMemoryServer> {
        &self.server
    }

    /// Returns a fresh pool, as a separate process would have.
    pub fn pool(&self) -> InMemoryPool {
        InMemoryPool::new(Arc::clone(&self.server))
    }

    /// Creates a data store for `prefix` with default settings.
    pub fn store(&self, prefix: &str) -> TestStore {
        self.store_with_config(&StoreConfig::new().with_prefix(prefix))
    }

    /// Creates a data store from an explicit configuration.
    pub fn store_with_config(&self, config: &StoreConfig) -> TestStore {
        PersistentDataStore::with_pool(config, self.pool())
    }

    /// Creates a big-segment store for `prefix`.
    pub fn big_segment_store(&self, prefix: &str) -> TestBigSegmentStore {
        BigSegmentStore::with_pool(&StoreConfig::new().with_prefix(prefix), self.pool())
    }

    /// Writes a synchronization timestamp the way the synchronizer does.
    pub fn set_sync_time(&self, prefix: &str, millis: u64) {
        self.server
            .set(Keyspace::new(prefix).sync_time_key(), millis.to_string());
    }

    /// Adds segment references to a context's include set.
    pub fn include(&self, prefix: &str, context_hash_key: &str, refs: &[&str]) {
        let key = Keyspace::new(prefix).include_key(context_hash_key);
        for r in refs {
            self.server.sadd(key.clone(), *r);
        }
    }

    /// Adds segment references to a context's exclude set.
    pub fn exclude(&self, prefix: &str, context_hash_key: &str, refs: &[&str]) {
        let key = Keyspace::new(prefix).exclude_key(context_hash_key);
        for r in refs {
            self.server.sadd(key.clone(), *r);
        }
    }

    /// Removes every key under `prefix`.
    pub fn wipe(&self, prefix: &str) -> usize {
        self.server.clear_prefix(prefix)
    }

    /// Returns the server's connection and transaction counters.
    pub fn stats(&self) -> InMemoryStats {
        self.server.stats()
    }

    /// Asserts that no connection is checked out and none was ever released
    /// with a watch still registered.
    pub fn assert_no_leaks(&self) {
        let stats = self.stats();
        assert_eq!(stats.connections_in_use, 0, "connections still checked out");
        assert_eq!(stats.leaked_watches, 0, "connections released while watching");
    }
}
