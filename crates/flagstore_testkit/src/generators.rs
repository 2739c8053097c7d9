//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, prefixes, and upsert
//! sequences that respect the key layout's constraints.

use proptest::prelude::*;

/// Strategy for item versions. Includes 0, which is never newer than
/// anything (not even a missing item).
pub fn version_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        1 => Just(0u64),
        8 => 1u64..1_000,
        1 => Just(u64::MAX),
    ]
}

/// Strategy for item keys.
pub fn item_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_.-]{0,23}").expect("Invalid regex")
}

/// Strategy for key prefixes. Never empty, so the default is not substituted.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for segment references.
pub fn segment_ref_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("seg:[a-z]{1,3}(\\.g[0-9])?").expect("Invalid regex")
}

/// A sequence of `(item, version)` upserts over a small key set, so that keys
/// collide often.
pub fn upsert_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["flagA", "flagB", "flagC"]).prop_map(str::to_string),
            version_strategy(),
        ),
        0..max_len,
    )
}
