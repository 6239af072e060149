//! Bitsets over component kinds and family indices.
//!
//! [`ComponentBits`] has a fixed width of [`MAX_COMPONENT_TYPES`] bits so that
//! every family test is a constant number of word-level operations,
//! independent of how many component kinds are registered. [`FamilyBits`]
//! grows on demand because family indices are unbounded.

use crate::component::ComponentType;

/// Build-time capacity of the component-kind registry.
///
/// Registering more distinct component kinds than this is a configuration
/// error (see [`ComponentError::CapacityExceeded`](crate::ComponentError)).
pub const MAX_COMPONENT_TYPES: usize = 256;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = MAX_COMPONENT_TYPES / WORD_BITS;

/// A fixed-width set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentBits {
    words: [u64; WORDS],
}

impl ComponentBits {
    /// Create an empty bitset.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Set the bit for `component_type`. Returns `true` if it was not set before.
    pub fn insert(&mut self, component_type: ComponentType) -> bool {
        let (word, mask) = Self::locate(component_type);
        let was_set = self.words[word] & mask != 0;
        self.words[word] |= mask;
        !was_set
    }

    /// Clear the bit for `component_type`. Returns `true` if it was set before.
    pub fn remove(&mut self, component_type: ComponentType) -> bool {
        let (word, mask) = Self::locate(component_type);
        let was_set = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        was_set
    }

    /// Returns `true` if the bit for `component_type` is set.
    #[must_use]
    pub fn contains(&self, component_type: ComponentType) -> bool {
        let (word, mask) = Self::locate(component_type);
        self.words[word] & mask != 0
    }

    /// Returns `true` if every bit set in `other` is also set in `self`.
    #[must_use]
    pub fn contains_all(&self, other: &ComponentBits) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[must_use]
    pub fn intersects(&self, other: &ComponentBits) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(mine, theirs)| mine & theirs != 0)
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the set component kinds in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(ComponentType::from_index(word_idx * WORD_BITS + bit))
            })
        })
    }

    fn locate(component_type: ComponentType) -> (usize, u64) {
        let index = component_type.index();
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }
}

impl FromIterator<ComponentType> for ComponentBits {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        let mut bits = Self::new();
        for component_type in iter {
            bits.insert(component_type);
        }
        bits
    }
}

/// A growable bitset keyed by family index.
///
/// Each entity keeps one of these to remember which families it currently
/// belongs to, so membership transitions are detected without scanning the
/// matching sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyBits {
    words: Vec<u64>,
}

impl FamilyBits {
    /// Create an empty bitset.
    #[must_use]
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Set bit `index`.
    pub fn insert(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    /// Clear bit `index`.
    pub fn remove(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1u64 << (index % WORD_BITS));
        }
    }

    /// Returns `true` if bit `index` is set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1u64 << (index % WORD_BITS)) != 0)
    }

    /// Clear every bit, keeping the allocation.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterate over the set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(word_idx * WORD_BITS + bit)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct(index: usize) -> ComponentType {
        ComponentType::from_index(index)
    }

    #[test]
    fn test_insert_and_remove_report_transitions() {
        let mut bits = ComponentBits::new();
        assert!(bits.insert(ct(3)));
        assert!(!bits.insert(ct(3)));
        assert!(bits.contains(ct(3)));
        assert!(bits.remove(ct(3)));
        assert!(!bits.remove(ct(3)));
        assert!(bits.is_empty());
    }

    #[test]
    fn test_bits_across_word_boundaries() {
        let bits: ComponentBits = [ct(0), ct(63), ct(64), ct(255)].into_iter().collect();
        assert_eq!(bits.len(), 4);
        assert!(bits.contains(ct(64)));
        assert!(!bits.contains(ct(65)));
        let collected: Vec<usize> = bits.iter().map(|c| c.index()).collect();
        assert_eq!(collected, vec![0, 63, 64, 255]);
    }

    #[test]
    fn test_contains_all_and_intersects() {
        let entity: ComponentBits = [ct(1), ct(2), ct(70)].into_iter().collect();
        let required: ComponentBits = [ct(1), ct(70)].into_iter().collect();
        let other: ComponentBits = [ct(5), ct(200)].into_iter().collect();

        assert!(entity.contains_all(&required));
        assert!(!required.contains_all(&entity));
        assert!(entity.contains_all(&ComponentBits::new()));
        assert!(entity.intersects(&required));
        assert!(!entity.intersects(&other));
    }

    #[test]
    fn test_equal_sets_hash_equal_regardless_of_insertion_order() {
        let a: ComponentBits = [ct(9), ct(1)].into_iter().collect();
        let b: ComponentBits = [ct(1), ct(9)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_family_bits_grow_on_demand() {
        let mut bits = FamilyBits::new();
        assert!(!bits.contains(500));
        bits.insert(500);
        bits.insert(2);
        assert!(bits.contains(500));
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![2, 500]);
        bits.remove(500);
        bits.remove(10_000);
        assert!(!bits.contains(500));
        bits.clear();
        assert!(bits.is_empty());
    }
}
