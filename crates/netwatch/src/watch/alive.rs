//! Set of interfaces currently known to have carrier.

use std::collections::BTreeSet;

/// Interface indices whose lower layer was last reported up.
///
/// Each index appears at most once. Both mutations are idempotent, which
/// is what turns a stream of repeated kernel notifications into one event
/// per genuine up-transition.
#[derive(Debug, Clone, Default)]
pub struct AliveSet {
    indices: BTreeSet<u32>,
}

impl AliveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `index` if absent.
    ///
    /// Returns `true` only when the index was inserted, i.e. this is a new
    /// up-transition.
    pub fn mark_alive_if_absent(&mut self, index: u32) -> bool {
        self.indices.insert(index)
    }

    /// Remove `index` if present.
    pub fn mark_dead_if_present(&mut self, index: u32) {
        self.indices.remove(&index);
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over alive indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }
}
