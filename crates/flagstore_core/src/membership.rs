//! Big-segment membership resolution.

use std::collections::HashMap;

/// Whether a context is in a given segment, according to big-segment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    /// The context is explicitly included.
    Included,
    /// The context is explicitly excluded.
    Excluded,
    /// The data says nothing about this segment; the caller falls back to
    /// the segment's regular rules.
    Unknown,
}

impl MembershipState {
    /// Maps to the `Option<bool>` convention: `Some(true)` included,
    /// `Some(false)` excluded, `None` unknown.
    pub fn as_option(self) -> Option<bool> {
        match self {
            MembershipState::Included => Some(true),
            MembershipState::Excluded => Some(false),
            MembershipState::Unknown => None,
        }
    }
}

/// Immutable membership of one context across all big segments.
///
/// Built with [`resolve`]. An empty membership is valid and reports
/// [`MembershipState::Unknown`] for every reference: "no data yet" is a
/// normal transient state, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Segment reference -> included (true) or excluded (false).
    refs: HashMap<String, bool>,
}

impl Membership {
    /// A membership with no data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up one segment reference.
    pub fn check(&self, segment_ref: &str) -> MembershipState {
        match self.refs.get(segment_ref) {
            Some(true) => MembershipState::Included,
            Some(false) => MembershipState::Excluded,
            None => MembershipState::Unknown,
        }
    }

    /// Returns true if the reference is explicitly included.
    pub fn is_included(&self, segment_ref: &str) -> bool {
        self.check(segment_ref) == MembershipState::Included
    }

    /// Returns true if the reference is explicitly excluded.
    pub fn is_excluded(&self, segment_ref: &str) -> bool {
        self.check(segment_ref) == MembershipState::Excluded
    }

    /// Returns the number of references with a known state.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if no reference has a known state.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Builds a [`Membership`] from the included and excluded reference sets.
///
/// The synchronizer writes the two sets disjoint. If a reference appears in
/// both anyway, **inclusion wins**, matching the synchronizer's convention.
///
/// ```rust
/// use flagstore_core::{resolve, MembershipState};
///
/// let m = resolve(["seg:1", "seg:2"], ["seg:1", "seg:3"]);
/// assert_eq!(m.check("seg:1"), MembershipState::Included);
/// assert_eq!(m.check("seg:3"), MembershipState::Excluded);
/// assert_eq!(m.check("seg:4"), MembershipState::Unknown);
/// ```
pub fn resolve<I, E, S, T>(included: I, excluded: E) -> Membership
where
    I: IntoIterator<Item = S>,
    E: IntoIterator<Item = T>,
    S: Into<String>,
    T: Into<String>,
{
    let mut refs = HashMap::new();
    // Exclusions first so that inclusions overwrite them.
    for r in excluded {
        refs.insert(r.into(), false);
    }
    for r in included {
        refs.insert(r.into(), true);
    }
    Membership { refs }
}
