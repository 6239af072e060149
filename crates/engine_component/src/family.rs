//! Families: interned matching predicates over component kinds.
//!
//! A [`Family`] selects entities by three component-kind sets:
//!
//! ```text
//! matches(bits) = (bits & all) == all
//!             AND (one == 0 OR (bits & one) != 0)
//!             AND (bits & exclude) == 0
//! ```
//!
//! Families are content-addressed by their [`FamilyKey`]. [`Families`] hands
//! out exactly one `Arc<Family>` per key, so every caller asking for the same
//! criteria observes the same instance and the same family index.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::bits::ComponentBits;
use crate::component::ComponentType;

/// The three masks identifying a family. Equal keys denote the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FamilyKey {
    /// Kinds an entity must carry all of.
    pub all: ComponentBits,
    /// Kinds an entity must carry at least one of (ignored when empty).
    pub one: ComponentBits,
    /// Kinds an entity must carry none of.
    pub exclude: ComponentBits,
}

/// An immutable, interned entity predicate.
#[derive(Debug)]
pub struct Family {
    index: usize,
    key: FamilyKey,
}

impl Family {
    /// Start describing a family.
    #[must_use]
    pub fn builder() -> FamilyBuilder {
        FamilyBuilder::default()
    }

    /// The family's unique index, dense across the owning [`Families`].
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The masks this family was built from.
    #[must_use]
    pub fn key(&self) -> &FamilyKey {
        &self.key
    }

    /// Kinds an entity must carry all of.
    #[must_use]
    pub fn all_bits(&self) -> &ComponentBits {
        &self.key.all
    }

    /// Kinds an entity must carry at least one of.
    #[must_use]
    pub fn one_bits(&self) -> &ComponentBits {
        &self.key.one
    }

    /// Kinds an entity must carry none of.
    #[must_use]
    pub fn exclude_bits(&self) -> &ComponentBits {
        &self.key.exclude
    }

    /// Returns `true` if an entity carrying `bits` belongs to this family.
    #[must_use]
    pub fn matches(&self, bits: &ComponentBits) -> bool {
        bits.contains_all(&self.key.all)
            && (self.key.one.is_empty() || bits.intersects(&self.key.one))
            && !bits.intersects(&self.key.exclude)
    }
}

impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Family {}

impl std::hash::Hash for Family {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// Accumulates family criteria before interning.
///
/// Calls are additive: `.all([a]).all([b])` requires both `a` and `b`.
#[derive(Debug, Clone, Default)]
pub struct FamilyBuilder {
    key: FamilyKey,
}

impl FamilyBuilder {
    /// Require every given kind.
    #[must_use]
    pub fn all(mut self, kinds: impl IntoIterator<Item = ComponentType>) -> Self {
        kinds.into_iter().for_each(|k| {
            self.key.all.insert(k);
        });
        self
    }

    /// Require at least one of the given kinds.
    #[must_use]
    pub fn one(mut self, kinds: impl IntoIterator<Item = ComponentType>) -> Self {
        kinds.into_iter().for_each(|k| {
            self.key.one.insert(k);
        });
        self
    }

    /// Reject entities carrying any of the given kinds.
    #[must_use]
    pub fn exclude(mut self, kinds: impl IntoIterator<Item = ComponentType>) -> Self {
        kinds.into_iter().for_each(|k| {
            self.key.exclude.insert(k);
        });
        self
    }

    /// The key this builder currently describes.
    #[must_use]
    pub fn key(&self) -> FamilyKey {
        self.key
    }

    /// Intern the described family.
    #[must_use]
    pub fn build(self, families: &Families) -> Arc<Family> {
        families.intern(self.key)
    }
}

/// The family interner.
///
/// Indices are assigned in first-request order and never reused.
#[derive(Debug, Default)]
pub struct Families {
    by_key: DashMap<FamilyKey, Arc<Family>>,
    next_index: AtomicUsize,
}

impl Families {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the unique family for `key`, creating it on first request.
    #[must_use]
    pub fn intern(&self, key: FamilyKey) -> Arc<Family> {
        match self.by_key.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let index = self.next_index.fetch_add(1, Ordering::AcqRel);
                let family = Arc::new(Family { index, key });
                entry.insert(Arc::clone(&family));
                family
            }
        }
    }

    /// Look up an already-interned family.
    #[must_use]
    pub fn get(&self, key: &FamilyKey) -> Option<Arc<Family>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Number of interned families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns `true` if no family has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct(index: usize) -> ComponentType {
        ComponentType::from_index(index)
    }

    fn bits(indices: &[usize]) -> ComponentBits {
        indices.iter().map(|&i| ct(i)).collect()
    }

    #[test]
    fn test_same_criteria_same_instance() {
        let families = Families::new();
        let a = Family::builder()
            .all([ct(1), ct(2)])
            .one([ct(3), ct(4)])
            .exclude([ct(5)])
            .build(&families);
        let b = Family::builder()
            .exclude([ct(5)])
            .one([ct(4), ct(3)])
            .all([ct(2), ct(1)])
            .build(&families);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.index(), b.index());
        assert_eq!(families.len(), 1);
    }

    #[test]
    fn test_distinct_criteria_distinct_indices() {
        let families = Families::new();
        let a = Family::builder().all([ct(1)]).build(&families);
        let b = Family::builder().one([ct(1)]).build(&families);
        let c = Family::builder().exclude([ct(1)]).build(&families);
        assert_ne!(a.index(), b.index());
        assert_ne!(b.index(), c.index());
        assert_eq!(families.len(), 3);
    }

    #[test]
    fn test_all_criteria() {
        let families = Families::new();
        let family = Family::builder().all([ct(0), ct(1)]).build(&families);
        assert!(family.matches(&bits(&[0, 1])));
        assert!(family.matches(&bits(&[0, 1, 7])));
        assert!(!family.matches(&bits(&[0])));
    }

    #[test]
    fn test_one_criteria() {
        let families = Families::new();
        let family = Family::builder().one([ct(2), ct(3)]).build(&families);
        assert!(family.matches(&bits(&[3])));
        assert!(family.matches(&bits(&[2, 3])));
        assert!(!family.matches(&bits(&[1])));
        assert!(!family.matches(&ComponentBits::new()));
    }

    #[test]
    fn test_exclude_criteria() {
        let families = Families::new();
        let family = Family::builder().all([ct(0)]).exclude([ct(9)]).build(&families);
        assert!(family.matches(&bits(&[0])));
        assert!(!family.matches(&bits(&[0, 9])));
    }

    #[test]
    fn test_empty_family_matches_everything() {
        let families = Families::new();
        let family = Family::builder().build(&families);
        assert!(family.matches(&ComponentBits::new()));
        assert!(family.matches(&bits(&[4, 100, 250])));
    }

    #[test]
    fn test_get_only_returns_interned() {
        let families = Families::new();
        let builder = Family::builder().all([ct(7)]);
        assert!(families.get(&builder.key()).is_none());
        let family = builder.clone().build(&families);
        let found = families.get(&builder.key()).unwrap();
        assert!(Arc::ptr_eq(&family, &found));
    }
}
