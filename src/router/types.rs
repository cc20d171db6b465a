// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use roaring::RoaringBitmap;

/// Opaque identifier of an interned [TagValue](crate::TagValue),
/// only meaningful within the [TagRegistry](super::TagRegistry) which assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Position of this id in the interning order, starting from zero.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Set of [RuleIds](RuleId) describing a road or a road point.
///
/// Backed by a compressed bitmap, so it grows together with the number of interned
/// tags without the need to re-size or re-index existing sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeSet(RoaringBitmap);

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an id to the set, returning `true` if it was not present.
    pub fn insert(&mut self, id: RuleId) -> bool {
        self.0.insert(id.0)
    }

    pub fn contains(&self, id: RuleId) -> bool {
        self.0.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.0.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks if every id of `self` is also in `other`.
    pub fn is_subset(&self, other: &TypeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn intersects(&self, other: &TypeSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Returns the lowest id present in both sets.
    pub fn first_common(&self, other: &TypeSet) -> Option<RuleId> {
        (&self.0 & &other.0).min().map(RuleId)
    }

    pub fn iter(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.0.iter().map(RuleId)
    }
}

impl FromIterator<RuleId> for TypeSet {
    fn from_iter<I: IntoIterator<Item = RuleId>>(iter: I) -> Self {
        Self(iter.into_iter().map(|id| id.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> TypeSet {
        ids.iter().map(|&i| RuleId::new(i)).collect()
    }

    #[test]
    fn subset() {
        let ab = set(&[1, 2]);
        assert!(!ab.is_subset(&set(&[1])));
        assert!(ab.is_subset(&set(&[1, 2, 3])));
        assert!(TypeSet::new().is_subset(&set(&[])));
    }

    #[test]
    fn intersects() {
        assert!(set(&[1, 70_000]).intersects(&set(&[70_000])));
        assert!(!set(&[1, 2]).intersects(&set(&[3])));
        assert!(!TypeSet::new().intersects(&set(&[3])));
    }

    #[test]
    fn first_common() {
        let a = set(&[3, 5, 9]);
        assert_eq!(a.first_common(&set(&[9, 5])), Some(RuleId::new(5)));
        assert_eq!(a.first_common(&set(&[4])), None);
    }
}
