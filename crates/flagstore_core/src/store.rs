//! Versioned record store.

use std::thread;

use flagstore_storage::{CommitOutcome, Connection, ConnectionPool, StorageError, Transaction};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::init::{read_init_state, InitState};
use crate::keyspace::Keyspace;
use crate::kind::DataKind;
use crate::retry::RetryPolicy;
use crate::stats::StoreStats;
use crate::types::{Collection, ItemDescriptor, KeyedItem, SerializedItem, UpsertOutcome};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Flag and segment storage with version-ordered writes.
///
/// Each data kind lives in one hash at `<prefix>:<kind>`, keyed by item key,
/// holding the caller's serialized payload verbatim. Versions are not stored
/// separately: they are recovered from payloads with the kind's deserializer.
///
/// ## Concurrency
///
/// Several processes may share one database. [`upsert`](Self::upsert) keeps
/// a key's version from ever going backwards without a native
/// compare-and-swap, using watch + conditional commit and a read-compare-retry
/// loop. No in-process locks are taken.
///
/// Every operation checks a connection out for its duration and releases it
/// on every exit path, including errors and retries.
pub struct PersistentDataStore<P: ConnectionPool> {
    keyspace: Keyspace,
    pool: P,
    retry: RetryPolicy,
    stats: StoreStats,
    concurrent_modification_hook: Option<Hook>,
}

impl<P: ConnectionPool> std::fmt::Debug for PersistentDataStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentDataStore")
            .field("prefix", &self.keyspace.prefix())
            .field("retry", &self.retry)
            .finish()
    }
}

impl<P: ConnectionPool> PersistentDataStore<P> {
    /// Creates a store over an existing pool.
    ///
    /// The configuration's URL and pool sizing are ignored; the pool is
    /// used as given.
    pub fn with_pool(config: &StoreConfig, pool: P) -> Self {
        Self {
            keyspace: Keyspace::new(config.prefix.clone()),
            pool,
            retry: config.upsert_retry.clone(),
            stats: StoreStats::new(),
            concurrent_modification_hook: None,
        }
    }

    /// Installs a callback run inside every upsert attempt, after the
    /// collection is watched and before the current item is read.
    ///
    /// Tests use it to simulate another instance writing at the worst moment.
    pub fn set_concurrent_modification_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.concurrent_modification_hook = Some(Box::new(hook));
    }

    /// Returns the keyspace this store writes to.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Replaces the full contents of every given collection and marks the
    /// prefix initialized, in one atomic transaction.
    ///
    /// Each named collection is deleted and rewritten; kinds that are not
    /// named are left alone. The initialization marker is the last command
    /// of the batch, so readers never see "initialized" together with
    /// partially written data. Returns the number of items written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] if the transaction cannot be
    /// submitted. Nothing is applied in that case.
    pub fn init(&self, collections: &[Collection]) -> CoreResult<usize> {
        let mut tx = Transaction::new();
        let mut total = 0usize;

        for collection in collections {
            let base_key = self.keyspace.collection_key(collection.kind.name());
            tx.del(base_key.clone());
            total += collection.items.len();
            for keyed in &collection.items {
                tx.hset(base_key.clone(), keyed.key.clone(), keyed.item.payload.clone());
            }
        }
        tx.set(self.keyspace.initialized_key(), Vec::new());

        let mut conn = self.pool.acquire()?;
        match conn.exec(tx)? {
            CommitOutcome::Committed => {
                self.stats.record_initialization();
                info!("Initialized with {} items", total);
                Ok(total)
            }
            // Nothing is watched here, so a discard means the server refused the batch.
            CommitOutcome::Aborted => Err(StorageError::unexpected_reply(
                "initialization transaction was discarded",
            )
            .into()),
        }
    }

    /// Looks up one item.
    ///
    /// A missing item returns [`ItemDescriptor::not_found`], not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] on transport failure and
    /// [`CoreError::MalformedData`] if the stored payload cannot be deserialized.
    pub fn get(&self, kind: &DataKind, key: &str) -> CoreResult<ItemDescriptor> {
        let mut conn = self.pool.acquire()?;
        let base_key = self.keyspace.collection_key(kind.name());
        self.stats.record_get();
        read_item(conn.as_mut(), kind, &base_key, key)
    }

    /// Returns every item of a kind, sorted by key.
    ///
    /// A kind that was never written yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] on transport failure and
    /// [`CoreError::MalformedData`] if any stored payload cannot be deserialized.
    pub fn get_all(&self, kind: &DataKind) -> CoreResult<Vec<KeyedItem>> {
        let mut conn = self.pool.acquire()?;
        let fields = conn.hgetall(&self.keyspace.collection_key(kind.name()))?;
        self.stats.record_scan();

        let mut items = fields
            .into_iter()
            .map(|(key, payload)| {
                let meta = kind
                    .deserialize(&payload)
                    .map_err(|message| CoreError::malformed_data(location(kind, &key), message))?;
                Ok(KeyedItem::new(
                    key,
                    SerializedItem {
                        version: meta.version,
                        deleted: meta.deleted,
                        payload,
                    },
                ))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    /// Writes `item` under `key` only if its version is higher than the
    /// stored one.
    ///
    /// Tombstones (`deleted = true`) go through the same comparison as any
    /// other write.
    ///
    /// Each attempt watches the kind's hash, reads and deserializes the
    /// current item, and either stands down (stored version `>=` new
    /// version) or commits the write conditionally on the hash being
    /// unchanged. If another writer committed in between, the commit is
    /// discarded and the attempt starts over with a fresh read, so a stale
    /// write is never blindly re-applied.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] on transport failure,
    /// [`CoreError::MalformedData`] if the stored payload cannot be
    /// deserialized, and [`CoreError::TooMuchContention`] if a bounded retry
    /// policy runs out.
    pub fn upsert(&self, kind: &DataKind, key: &str, item: &SerializedItem) -> CoreResult<UpsertOutcome> {
        let base_key = self.keyspace.collection_key(kind.name());
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            if !self.retry.allows_attempt(attempt) {
                let attempts = attempt - 1;
                warn!(kind = kind.name(), key, attempts, "Giving up upsert after repeated concurrent modification");
                return Err(CoreError::too_much_contention(kind.name(), key, attempts));
            }
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            let mut conn = self.pool.acquire()?;
            match self.try_upsert(conn.as_mut(), kind, &base_key, key, item) {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {
                    self.stats.record_upsert_conflict();
                    debug!("Concurrent modification detected, retrying");
                }
                Err(err) => {
                    // The watch must not outlive this call on a pooled connection.
                    let _ = conn.unwatch();
                    return Err(err);
                }
            }
        }
    }

    /// One watch / read / compare / commit round.
    ///
    /// Returns `Ok(None)` when the commit was discarded by a concurrent change.
    fn try_upsert(
        &self,
        conn: &mut dyn Connection,
        kind: &DataKind,
        base_key: &str,
        key: &str,
        item: &SerializedItem,
    ) -> CoreResult<Option<UpsertOutcome>> {
        conn.watch(base_key)?;

        if let Some(hook) = &self.concurrent_modification_hook {
            hook();
        }

        let current = read_item(conn, kind, base_key, key)?;
        if current.version >= item.version {
            conn.unwatch()?;
            self.stats.record_upsert_stale();
            debug!(
                "Attempted to {} key: {} version: {} in \"{}\" with a version that is the same or older: {}",
                if item.deleted { "delete" } else { "update" },
                key,
                current.version,
                kind.name(),
                item.version
            );
            return Ok(Some(UpsertOutcome::Stale {
                current_version: current.version,
            }));
        }

        let mut tx = Transaction::new();
        tx.hset(base_key, key, item.payload.clone());
        match conn.exec(tx)? {
            CommitOutcome::Committed => {
                self.stats.record_upsert_applied();
                Ok(Some(UpsertOutcome::Applied))
            }
            CommitOutcome::Aborted => Ok(None),
        }
    }

    /// Returns the initialization state of this store's prefix.
    ///
    /// A transport failure reads as [`InitState::Uninitialized`]: the
    /// conservative answer for a readiness probe.
    pub fn init_state(&self) -> InitState {
        self.pool
            .acquire()
            .map_err(CoreError::from)
            .and_then(|mut conn| read_init_state(conn.as_mut(), &self.keyspace))
            .unwrap_or(InitState::Uninitialized)
    }

    /// Returns true if a bulk initialization has ever completed for this
    /// prefix. Never fails; see [`init_state`](Self::init_state).
    pub fn is_initialized(&self) -> bool {
        self.init_state().is_initialized()
    }

    /// Returns true if a trivial read against the store succeeds.
    pub fn is_available(&self) -> bool {
        match self.pool.acquire() {
            Ok(mut conn) => conn.exists(&self.keyspace.initialized_key()).is_ok(),
            Err(_) => false,
        }
    }

    /// Releases every pooled connection. Idempotent.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(feature = "redis")]
impl PersistentDataStore<flagstore_storage::RedisPool> {
    /// Opens a store with its own Redis pool built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL cannot be parsed.
    pub fn open(config: &StoreConfig) -> CoreResult<Self> {
        let pool = crate::config::open_redis_pool(config)?;
        Ok(Self::with_pool(config, pool))
    }
}

/// The plain lookup path shared by `get` and `upsert`.
fn read_item(
    conn: &mut dyn Connection,
    kind: &DataKind,
    base_key: &str,
    key: &str,
) -> CoreResult<ItemDescriptor> {
    match conn.hget(base_key, key)? {
        None => {
            debug!("Key: {} not found in \"{}\"", key, kind.name());
            Ok(ItemDescriptor::not_found())
        }
        Some(payload) => {
            let meta = kind
                .deserialize(&payload)
                .map_err(|message| CoreError::malformed_data(location(kind, key), message))?;
            Ok(ItemDescriptor::found(meta, payload))
        }
    }
}

fn location(kind: &DataKind, key: &str) -> String {
    format!("{}/{}", kind.name(), key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagstore_storage::InMemoryPool;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn features() -> DataKind {
        DataKind::json("features")
    }

    fn flag(version: u64) -> SerializedItem {
        SerializedItem::new(version, format!(r#"{{"key":"flagA","version":{}}}"#, version))
    }

    fn store() -> PersistentDataStore<Arc<InMemoryPool>> {
        let pool = Arc::new(InMemoryPool::standalone());
        PersistentDataStore::with_pool(&StoreConfig::new().with_prefix("test"), pool)
    }

    fn pool_of(store: &PersistentDataStore<Arc<InMemoryPool>>) -> &Arc<InMemoryPool> {
        &store.pool
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let store = store();
        let item = store.get(&features(), "nope").unwrap();
        assert!(item.is_not_found());
        assert_eq!(item.version, 0);
    }

    #[test]
    fn init_writes_collections_and_marker() {
        let store = store();
        assert!(!store.is_initialized());

        let count = store
            .init(&[Collection::new(
                features(),
                vec![KeyedItem::new("flagA", flag(1)), KeyedItem::new("flagB", flag(4))],
            )])
            .unwrap();
        assert_eq!(count, 2);
        assert!(store.is_initialized());

        let all = store.get_all(&features()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, "flagA");
        assert_eq!(all[1].item.version, 4);
    }

    #[test]
    fn init_with_no_collections_still_sets_marker() {
        let store = store();
        assert_eq!(store.init(&[]).unwrap(), 0);
        assert_eq!(store.init_state(), InitState::Initialized);
    }

    #[test]
    fn upsert_newer_then_older() {
        let store = store();
        let kind = features();

        assert_eq!(store.upsert(&kind, "flagA", &flag(1)).unwrap(), UpsertOutcome::Applied);
        assert_eq!(store.upsert(&kind, "flagA", &flag(3)).unwrap(), UpsertOutcome::Applied);
        assert_eq!(
            store.upsert(&kind, "flagA", &flag(2)).unwrap(),
            UpsertOutcome::Stale { current_version: 3 }
        );
        assert_eq!(
            store.upsert(&kind, "flagA", &flag(3)).unwrap(),
            UpsertOutcome::Stale { current_version: 3 }
        );
        assert_eq!(store.get(&kind, "flagA").unwrap().version, 3);

        let snap = store.stats().snapshot();
        assert_eq!(snap.upserts_applied, 2);
        assert_eq!(snap.upserts_stale, 2);
        assert_eq!(pool_of(&store).server().stats().leaked_watches, 0);
    }

    #[test]
    fn tombstone_uses_same_version_rule() {
        let store = store();
        let kind = features();
        store.upsert(&kind, "flagA", &flag(5)).unwrap();

        let tombstone = SerializedItem::tombstone(6, r#"{"key":"flagA","version":6,"deleted":true}"#);
        assert!(store.upsert(&kind, "flagA", &tombstone).unwrap().is_applied());

        let stored = store.get(&kind, "flagA").unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.version, 6);

        // An older update cannot resurrect the deleted item.
        assert!(!store.upsert(&kind, "flagA", &flag(5)).unwrap().is_applied());
        assert!(store.get(&kind, "flagA").unwrap().deleted);
    }

    #[test]
    fn conflict_forces_reread() {
        let mut store = store();
        let kind = features();
        let server = Arc::clone(pool_of(&store).server());
        let calls = Arc::new(AtomicU32::new(0));

        let hook_calls = Arc::clone(&calls);
        store.set_concurrent_modification_hook(move || {
            if hook_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                server.hset("test:features", "flagA", r#"{"version":2}"#);
            }
        });

        let outcome = store.upsert(&kind, "flagA", &flag(5)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stats().snapshot().upsert_conflicts, 1);
        assert_eq!(store.get(&kind, "flagA").unwrap().version, 5);
    }

    #[test]
    fn newer_concurrent_write_makes_upsert_stale() {
        let mut store = store();
        let server = Arc::clone(pool_of(&store).server());
        store.set_concurrent_modification_hook(move || {
            server.hset("test:features", "flagA", r#"{"version":10}"#);
        });

        let outcome = store.upsert(&features(), "flagA", &flag(5)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Stale { current_version: 10 });
        assert_eq!(store.stats().snapshot().upsert_conflicts, 0);
    }

    #[test]
    fn bounded_policy_gives_up() {
        let pool = Arc::new(InMemoryPool::standalone());
        let server = Arc::clone(pool.server());
        let config = StoreConfig::new().with_upsert_retry(RetryPolicy::bounded(3));
        let mut store = PersistentDataStore::with_pool(&config, pool);

        // Another writer touches an unrelated field on every attempt.
        store.set_concurrent_modification_hook(move || {
            server.hset("launchdarkly:features", "other", r#"{"version":1}"#);
        });

        let err = store.upsert(&features(), "flagA", &flag(1)).unwrap_err();
        assert!(matches!(err, CoreError::TooMuchContention { attempts: 3, .. }));
        assert_eq!(store.stats().snapshot().upsert_conflicts, 3);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let store = store();
        pool_of(&store).server().hset("test:features", "bad", "not json");

        let err = store.get(&features(), "bad").unwrap_err();
        assert!(matches!(err, CoreError::MalformedData { .. }));
        assert!(matches!(
            store.get_all(&features()),
            Err(CoreError::MalformedData { .. })
        ));
    }

    #[test]
    fn transport_failure_is_distinct_from_not_found() {
        let store = store();
        pool_of(&store).server().set_available(false);

        let err = store.get(&features(), "flagA").unwrap_err();
        assert!(err.is_store_unavailable());
        assert!(store.upsert(&features(), "flagA", &flag(1)).unwrap_err().is_store_unavailable());
        assert!(!store.is_initialized());
        assert!(!store.is_available());
    }

    #[test]
    fn close_is_idempotent() {
        let store = store();
        assert!(store.is_available());
        store.close();
        store.close();
        assert!(!store.is_available());
        assert!(matches!(
            store.get(&features(), "flagA"),
            Err(CoreError::StoreUnavailable(StorageError::Closed))
        ));
    }
}
