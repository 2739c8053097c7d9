//! Test fixtures.
//!
//! Data kinds and JSON item builders shaped like the payloads a flag
//! evaluation engine would store, plus logging setup for tests.

use flagstore_core::{Collection, DataKind, KeyedItem, SerializedItem};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// The flag kind, stored under `<prefix>:features`.
pub fn features() -> DataKind {
    DataKind::json("features")
}

/// The segment kind, stored under `<prefix>:segments`.
pub fn segments() -> DataKind {
    DataKind::json("segments")
}

/// Builds a live flag payload.
pub fn flag(key: &str, version: u64) -> SerializedItem {
    let payload = json!({ "key": key, "version": version, "on": true });
    SerializedItem::new(version, payload.to_string())
}

/// Builds a live segment payload.
pub fn segment(key: &str, version: u64) -> SerializedItem {
    let payload = json!({ "key": key, "version": version, "included": [], "excluded": [] });
    SerializedItem::new(version, payload.to_string())
}

/// Builds a deletion tombstone.
pub fn tombstone(key: &str, version: u64) -> SerializedItem {
    let payload = json!({ "key": key, "version": version, "deleted": true });
    SerializedItem::tombstone(version, payload.to_string())
}

/// Builds a collection of flags with the given keys and versions.
pub fn flag_collection(entries: &[(&str, u64)]) -> Collection {
    Collection::new(
        features(),
        entries
            .iter()
            .map(|(key, version)| KeyedItem::new(*key, flag(key, *version)))
            .collect(),
    )
}

/// Builds a collection of segments with the given keys and versions.
pub fn segment_collection(entries: &[(&str, u64)]) -> Collection {
    Collection::new(
        segments(),
        entries
            .iter()
            .map(|(key, version)| KeyedItem::new(*key, segment(key, *version)))
            .collect(),
    )
}

/// Installs a test log subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_carry_their_version() {
        let item = flag("flagA", 7);
        let meta = features().deserialize(&item.payload).unwrap();
        assert_eq!(meta.version, 7);
        assert!(!meta.deleted);

        let gone = tombstone("flagA", 8);
        let meta = features().deserialize(&gone.payload).unwrap();
        assert_eq!(meta.version, 8);
        assert!(meta.deleted);
    }

    #[test]
    fn collections_keep_entry_order() {
        let c = flag_collection(&[("b", 1), ("a", 2)]);
        assert_eq!(c.kind, features());
        assert_eq!(c.items[0].key, "b");
        assert_eq!(c.items[1].item.version, 2);
        assert_eq!(segment_collection(&[]).items.len(), 0);
    }

    #[test]
    fn init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
