//! Core type definitions for flagstore.

use crate::kind::DataKind;

/// Version and tombstone flag recovered from a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemMeta {
    /// Caller-assigned version.
    pub version: u64,
    /// True if the payload is a deletion tombstone.
    pub deleted: bool,
}

impl ItemMeta {
    /// Creates item metadata.
    #[must_use]
    pub const fn new(version: u64, deleted: bool) -> Self {
        Self { version, deleted }
    }
}

/// A versioned item as written by the host.
///
/// Deletion is a tombstone: an item with `deleted = true` whose payload is the
/// caller's serialized tombstone. It is stored and versioned like any other
/// item, so a late update can never resurrect something deleted at a higher
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedItem {
    /// Caller-assigned, monotonically increasing version.
    pub version: u64,
    /// True if this item is a deletion tombstone.
    pub deleted: bool,
    /// Caller-serialized form, stored verbatim.
    pub payload: Vec<u8>,
}

impl SerializedItem {
    /// Creates a live item.
    #[must_use]
    pub fn new(version: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            deleted: false,
            payload: payload.into(),
        }
    }

    /// Creates a deletion tombstone.
    #[must_use]
    pub fn tombstone(version: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            deleted: true,
            payload: payload.into(),
        }
    }
}

/// Result of a point lookup.
///
/// A missing key is the [`not_found`](ItemDescriptor::not_found) sentinel:
/// version 0, no payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemDescriptor {
    /// Version recovered from the payload, 0 if not found.
    pub version: u64,
    /// True if the stored item is a tombstone.
    pub deleted: bool,
    /// Stored payload, `None` if not found.
    pub payload: Option<Vec<u8>>,
}

impl ItemDescriptor {
    /// The "not found" sentinel.
    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            version: 0,
            deleted: false,
            payload: None,
        }
    }

    /// Creates a descriptor for a stored payload.
    #[must_use]
    pub fn found(meta: ItemMeta, payload: Vec<u8>) -> Self {
        Self {
            version: meta.version,
            deleted: meta.deleted,
            payload: Some(payload),
        }
    }

    /// Returns true if this is the not-found sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.payload.is_none()
    }

    /// Converts into the stored item, if there is one.
    #[must_use]
    pub fn into_item(self) -> Option<SerializedItem> {
        let version = self.version;
        let deleted = self.deleted;
        self.payload.map(|payload| SerializedItem {
            version,
            deleted,
            payload,
        })
    }
}

/// An item together with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedItem {
    /// Item key, unique within its kind.
    pub key: String,
    /// The item itself.
    pub item: SerializedItem,
}

impl KeyedItem {
    /// Creates a keyed item.
    #[must_use]
    pub fn new(key: impl Into<String>, item: SerializedItem) -> Self {
        Self {
            key: key.into(),
            item,
        }
    }
}

/// Every item of one kind, as supplied to a bulk initialization.
#[derive(Debug, Clone)]
pub struct Collection {
    /// The kind these items belong to.
    pub kind: DataKind,
    /// The items. Order is irrelevant; keys should be unique.
    pub items: Vec<KeyedItem>,
}

impl Collection {
    /// Creates a collection.
    #[must_use]
    pub fn new(kind: DataKind, items: Vec<KeyedItem>) -> Self {
        Self { kind, items }
    }
}

/// Outcome of an upsert that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The new item was written.
    Applied,
    /// The stored item already had an equal or higher version; nothing was written.
    Stale {
        /// Version of the item that is still stored.
        current_version: u64,
    },
}

impl UpsertOutcome {
    /// Returns true if the item was written.
    #[must_use]
    pub fn is_applied(self) -> bool {
        self == UpsertOutcome::Applied
    }
}

/// Synchronization metadata for big-segment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigSegmentMetadata {
    /// Unix time in milliseconds of the last complete synchronization.
    pub last_up_to_date: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_sentinel() {
        let d = ItemDescriptor::not_found();
        assert!(d.is_not_found());
        assert_eq!(d.version, 0);
        assert!(!d.deleted);
        assert_eq!(d.into_item(), None);
    }

    #[test]
    fn found_descriptor_round_trips_to_item() {
        let d = ItemDescriptor::found(ItemMeta::new(7, true), b"gone".to_vec());
        assert!(!d.is_not_found());
        assert_eq!(d.into_item(), Some(SerializedItem::tombstone(7, "gone")));
    }

    #[test]
    fn upsert_outcome_is_applied() {
        assert!(UpsertOutcome::Applied.is_applied());
        assert!(!UpsertOutcome::Stale { current_version: 3 }.is_applied());
    }
}
