//! Physical key layout.
//!
//! The layout is shared with every other implementation that reads or writes
//! the same database, so it must stay bit-exact:
//!
//! ```text
//! <prefix>:<kindName>                       hash: item key -> payload
//! <prefix>:$inited                          string: existence-only sentinel
//! <prefix>:big_segments_synchronized_on     string: decimal unix millis
//! <prefix>:big_segment_include:<hashKey>    set of segment references
//! <prefix>:big_segment_exclude:<hashKey>    set of segment references
//! ```
//!
//! Kind names and hash keys are not escaped.

/// Prefix used when none (or an empty one) is configured.
pub const DEFAULT_PREFIX: &str = "launchdarkly";

const INITED_SUFFIX: &str = "$inited";
const SYNC_TIME_SUFFIX: &str = "big_segments_synchronized_on";
const INCLUDE_SEGMENT: &str = "big_segment_include";
const EXCLUDE_SEGMENT: &str = "big_segment_exclude";

/// Builds physical keys for one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    /// Creates a keyspace, substituting [`DEFAULT_PREFIX`] for an empty prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: if prefix.is_empty() {
                DEFAULT_PREFIX.to_string()
            } else {
                prefix
            },
        }
    }

    /// Returns the effective prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>:<kindName>`
    pub fn collection_key(&self, kind_name: &str) -> String {
        format!("{}:{}", self.prefix, kind_name)
    }

    /// `<prefix>:$inited`
    pub fn initialized_key(&self) -> String {
        format!("{}:{}", self.prefix, INITED_SUFFIX)
    }

    /// `<prefix>:big_segments_synchronized_on`
    pub fn sync_time_key(&self) -> String {
        format!("{}:{}", self.prefix, SYNC_TIME_SUFFIX)
    }

    /// `<prefix>:big_segment_include:<hashKey>`
    pub fn include_key(&self, context_hash_key: &str) -> String {
        format!("{}:{}:{}", self.prefix, INCLUDE_SEGMENT, context_hash_key)
    }

    /// `<prefix>:big_segment_exclude:<hashKey>`
    pub fn exclude_key(&self, context_hash_key: &str) -> String {
        format!("{}:{}:{}", self.prefix, EXCLUDE_SEGMENT, context_hash_key)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
