//! Live matching sets.
//!
//! A [`MatchingSet`] is the engine-maintained list of entities that currently
//! satisfy one [`Family`]. Handles are cheap to clone and every clone observes
//! the same underlying list; only the engine mutates it.
//!
//! Order is insertion order. Removal preserves the relative order of the
//! remaining entities (no swap-with-last), and the engine never mutates a set
//! while a system update or listener callback is running: structural changes
//! issued from callbacks are deferred (see [`Engine`](crate::Engine)). An
//! index-based walk over `0..len()` taken at the start of a pass therefore sees
//! every entity present at that moment exactly once.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use engine_component::Family;

use crate::entity::EntityId;

#[derive(Debug, Default)]
struct Members {
    entities: Vec<EntityId>,
    version: u64,
}

/// Shared handle to the live set of entities matching a family.
#[derive(Debug, Clone)]
pub struct MatchingSet {
    family: Arc<Family>,
    members: Rc<RefCell<Members>>,
}

impl MatchingSet {
    pub(crate) fn new(family: Arc<Family>) -> Self {
        Self {
            family,
            members: Rc::new(RefCell::new(Members::default())),
        }
    }

    /// The family this set tracks.
    #[must_use]
    pub fn family(&self) -> &Arc<Family> {
        &self.family
    }

    /// Number of matching entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.borrow().entities.len()
    }

    /// Returns `true` if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.borrow().entities.is_empty()
    }

    /// The entity at position `index`, in insertion order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<EntityId> {
        self.members.borrow().entities.get(index).copied()
    }

    /// Returns `true` if `entity` is currently in the set.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.borrow().entities.contains(&entity)
    }

    /// Copy the current members.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.members.borrow().entities.clone()
    }

    /// A counter bumped on every insertion or removal.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.members.borrow().version
    }

    /// Returns `true` if both handles refer to the same live set.
    #[must_use]
    pub fn ptr_eq(a: &MatchingSet, b: &MatchingSet) -> bool {
        Rc::ptr_eq(&a.members, &b.members)
    }

    pub(crate) fn push(&self, entity: EntityId) {
        let mut members = self.members.borrow_mut();
        members.entities.push(entity);
        members.version += 1;
    }

    pub(crate) fn remove(&self, entity: EntityId) -> bool {
        let mut members = self.members.borrow_mut();
        let Some(pos) = members.entities.iter().position(|&e| e == entity) else {
            return false;
        };
        members.entities.remove(pos);
        members.version += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Families;

    use super::*;

    fn make_set() -> MatchingSet {
        let families = Families::new();
        MatchingSet::new(Family::builder().build(&families))
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let set = make_set();
        for id in [3, 1, 2] {
            set.push(EntityId::from_raw(id));
        }
        let ids: Vec<u64> = set.snapshot().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let set = make_set();
        for id in 1..=5 {
            set.push(EntityId::from_raw(id));
        }
        assert!(set.remove(EntityId::from_raw(2)));
        assert!(!set.remove(EntityId::from_raw(2)));
        let ids: Vec<u64> = set.snapshot().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_clones_share_members() {
        let set = make_set();
        let other = set.clone();
        set.push(EntityId::from_raw(9));
        assert!(other.contains(EntityId::from_raw(9)));
        assert!(MatchingSet::ptr_eq(&set, &other));
        assert!(!MatchingSet::ptr_eq(&set, &make_set()));
    }

    #[test]
    fn test_version_tracks_mutations() {
        let set = make_set();
        let v0 = set.version();
        set.push(EntityId::from_raw(1));
        assert!(set.version() > v0);
        let v1 = set.version();
        set.remove(EntityId::from_raw(42));
        assert_eq!(set.version(), v1);
    }
}
