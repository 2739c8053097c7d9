//! Benchmark utilities.

use std::sync::Arc;

use flagstore_core::{
    Collection, DataKind, KeyedItem, PersistentDataStore, SerializedItem, StoreConfig,
};
use flagstore_storage::InMemoryPool;

/// Builds a JSON flag payload of roughly `size` bytes.
pub fn flag_payload(key: &str, version: u64, size: usize) -> SerializedItem {
    let header = format!(r#"{{"key":"{}","version":{},"padding":""#, key, version);
    let padding = size.saturating_sub(header.len() + 2);
    let mut json = header;
    json.extend(std::iter::repeat('x').take(padding));
    json.push_str(r#""}"#);
    SerializedItem::new(version, json)
}

/// Builds a flag collection of `count` items.
pub fn flag_collection(kind: &DataKind, count: usize, payload_size: usize) -> Collection {
    Collection::new(
        kind.clone(),
        (0..count)
            .map(|i| {
                let key = format!("flag-{}", i);
                let item = flag_payload(&key, 1, payload_size);
                KeyedItem::new(key, item)
            })
            .collect(),
    )
}

/// Creates an in-memory store preloaded with `count` flags.
pub fn populated_store(
    kind: &DataKind,
    count: usize,
    payload_size: usize,
) -> PersistentDataStore<Arc<InMemoryPool>> {
    let store = PersistentDataStore::with_pool(
        &StoreConfig::new().with_prefix("bench"),
        Arc::new(InMemoryPool::standalone()),
    );
    store
        .init(&[flag_collection(kind, count, payload_size)])
        .expect("init in-memory store");
    store
}
