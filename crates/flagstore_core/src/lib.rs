//! # flagstore Core
//!
//! Persistence layer for a feature-flag engine on top of a key-value server.
//!
//! This crate provides:
//! - [`PersistentDataStore`]: versioned flag and segment storage with atomic
//!   bulk initialization and version-ordered upserts
//! - [`BigSegmentStore`]: sync metadata and per-context membership reads
//! - [`Keyspace`]: the physical key layout shared with other implementations
//! - [`resolve`]: big-segment membership resolution
//!
//! Payloads are opaque. Versions are recovered with a deserializer supplied
//! per [`DataKind`], so the store never depends on a payload format.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use flagstore_core::{Collection, DataKind, KeyedItem, PersistentDataStore, SerializedItem, StoreConfig};
//! use flagstore_storage::InMemoryPool;
//!
//! let features = DataKind::json("features");
//! let store = PersistentDataStore::with_pool(&StoreConfig::new(), Arc::new(InMemoryPool::standalone()));
//!
//! store
//!     .init(&[Collection::new(
//!         features.clone(),
//!         vec![KeyedItem::new("flagA", SerializedItem::new(1, r#"{"version":1}"#))],
//!     )])
//!     .unwrap();
//!
//! let newer = SerializedItem::new(2, r#"{"version":2}"#);
//! assert!(store.upsert(&features, "flagA", &newer).unwrap().is_applied());
//!
//! let older = SerializedItem::new(1, r#"{"version":1}"#);
//! assert!(!store.upsert(&features, "flagA", &older).unwrap().is_applied());
//! assert_eq!(store.get(&features, "flagA").unwrap().version, 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod big_segments;
mod config;
mod error;
mod init;
mod keyspace;
mod kind;
mod membership;
mod retry;
mod stats;
mod store;
mod types;

pub use big_segments::BigSegmentStore;
pub use config::{redact_url, PoolConfig, StoreConfig, DEFAULT_URL};
pub use error::{CoreError, CoreResult};
pub use init::InitState;
pub use keyspace::{Keyspace, DEFAULT_PREFIX};
pub use kind::{DataKind, ItemDeserializer};
pub use membership::{resolve, Membership, MembershipState};
pub use retry::RetryPolicy;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::PersistentDataStore;
pub use types::{
    BigSegmentMetadata, Collection, ItemDescriptor, ItemMeta, KeyedItem, SerializedItem,
    UpsertOutcome,
};
