//! Data kinds and the injected version-recovery strategy.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::types::ItemMeta;

/// Recovers the version and tombstone flag from a caller-serialized payload.
///
/// The store keeps payloads verbatim, with no version field of its own, so
/// the only way to compare versions is to ask the payload's owner. Every
/// [`DataKind`] carries one of these.
///
/// Any `Fn(&[u8]) -> Result<ItemMeta, String>` closure implements the trait.
///
/// # Example
///
/// ```rust
/// use flagstore_core::{DataKind, ItemMeta};
///
/// // Payloads of the form "<version>:<body>"
/// let kind = DataKind::new("notes", |bytes: &[u8]| {
///     let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
///     let (version, _) = text.split_once(':').ok_or("missing version")?;
///     let version = version.parse::<u64>().map_err(|e| e.to_string())?;
///     Ok(ItemMeta::new(version, false))
/// });
/// assert_eq!(kind.deserialize(b"4:hello").unwrap().version, 4);
/// ```
pub trait ItemDeserializer: Send + Sync {
    /// Parses enough of `payload` to recover its version and deleted flag.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the payload is unreadable.
    fn deserialize(&self, payload: &[u8]) -> Result<ItemMeta, String>;
}

impl<F> ItemDeserializer for F
where
    F: Fn(&[u8]) -> Result<ItemMeta, String> + Send + Sync,
{
    fn deserialize(&self, payload: &[u8]) -> Result<ItemMeta, String> {
        self(payload)
    }
}

/// A named category of items sharing one physical container
/// (for example `features` or `segments`).
///
/// Cloning is cheap; the name and deserializer are shared.
#[derive(Clone)]
pub struct DataKind {
    name: Arc<str>,
    deserializer: Arc<dyn ItemDeserializer>,
}

impl DataKind {
    /// Creates a kind whose versions are recovered by a closure.
    ///
    /// The name becomes part of a physical key and is not escaped; it must
    /// not contain characters that the backing store treats specially.
    pub fn new<F>(name: impl AsRef<str>, deserialize: F) -> Self
    where
        F: Fn(&[u8]) -> Result<ItemMeta, String> + Send + Sync + 'static,
    {
        Self::with_deserializer(name, Arc::new(deserialize))
    }

    /// Creates a kind with a shared deserializer object.
    pub fn with_deserializer(name: impl AsRef<str>, deserializer: Arc<dyn ItemDeserializer>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            deserializer,
        }
    }

    /// Creates a kind whose payloads are JSON objects carrying `version`
    /// and an optional `deleted` field, alongside any other fields.
    pub fn json(name: impl AsRef<str>) -> Self {
        Self::new(name, deserialize_json_meta)
    }

    /// Returns the kind's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recovers version and deleted flag from a payload of this kind.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's description of the problem.
    pub fn deserialize(&self, payload: &[u8]) -> Result<ItemMeta, String> {
        self.deserializer.deserialize(payload)
    }
}

impl fmt::Debug for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKind").field("name", &self.name).finish()
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for DataKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DataKind {}

#[derive(Deserialize)]
struct JsonMeta {
    version: u64,
    #[serde(default)]
    deleted: bool,
}

fn deserialize_json_meta(payload: &[u8]) -> Result<ItemMeta, String> {
    let meta: JsonMeta = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    Ok(ItemMeta::new(meta.version, meta.deleted))
}
