//! The [`System`] capability trait and the engine's system table.
//!
//! A system is a prioritised unit of per-frame work. The engine owns attached
//! systems and keeps, beside each one, its current priority, enabled flag and
//! insertion sequence. Update order is ascending priority, ties broken by
//! insertion order. Priority changes only mark the order dirty; it is
//! recomputed at the start of the next update pass.

use std::any::{Any, TypeId};

use crate::engine::Engine;
use crate::error::EngineError;

/// A unit of per-frame logic.
///
/// Lifecycle: `Detached → Attached` on [`Engine::add_system`]
/// (`added_to_engine` fires), `Attached → Detached` on
/// [`Engine::remove_system`] (`removed_from_engine` fires). While attached and
/// enabled, `update` runs once per frame. At most one system of each concrete
/// type can be attached to an engine.
pub trait System: Any {
    /// Priority used when the system is first attached. Lower runs earlier.
    /// Later changes go through [`Engine::set_system_priority`].
    fn priority(&self) -> i32 {
        0
    }

    /// Called once when the system is attached.
    fn added_to_engine(&mut self, _engine: &mut Engine) {}

    /// Called once when the system is detached.
    fn removed_from_engine(&mut self, _engine: &mut Engine) {}

    /// Run one frame of work.
    ///
    /// # Errors
    ///
    /// An error aborts the remainder of the frame and is returned from
    /// [`Engine::update`].
    fn update(&mut self, engine: &mut Engine, dt: f32) -> Result<(), EngineError>;
}

pub(crate) struct SystemEntry {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) priority: i32,
    pub(crate) enabled: bool,
    seq: u64,
    /// `None` while the system is running or being attached.
    pub(crate) system: Option<Box<dyn System>>,
}

impl SystemEntry {
    pub(crate) fn new(type_id: TypeId, name: &'static str, priority: i32) -> Self {
        Self {
            type_id,
            name,
            priority,
            enabled: true,
            seq: 0,
            system: None,
        }
    }

    pub(crate) fn downcast_ref<S: System>(&self) -> Option<&S> {
        let system: &dyn Any = self.system.as_deref()?;
        system.downcast_ref::<S>()
    }

    pub(crate) fn downcast_mut<S: System>(&mut self) -> Option<&mut S> {
        let system: &mut dyn Any = self.system.as_deref_mut()?;
        system.downcast_mut::<S>()
    }
}

/// Attached systems, kept in update order once sorted.
#[derive(Default)]
pub(crate) struct SystemTable {
    entries: Vec<SystemEntry>,
    next_seq: u64,
    dirty: bool,
}

impl SystemTable {
    pub(crate) fn insert(&mut self, mut entry: SystemEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(entry);
        self.dirty = true;
    }

    pub(crate) fn remove(&mut self, type_id: TypeId) -> Option<SystemEntry> {
        let pos = self.position(type_id)?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn contains(&self, type_id: TypeId) -> bool {
        self.position(type_id).is_some()
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<&SystemEntry> {
        self.entries.iter().find(|e| e.type_id == type_id)
    }

    pub(crate) fn get_mut(&mut self, type_id: TypeId) -> Option<&mut SystemEntry> {
        self.entries.iter_mut().find(|e| e.type_id == type_id)
    }

    pub(crate) fn set_priority(&mut self, type_id: TypeId, priority: i32) -> bool {
        let Some(entry) = self.get_mut(type_id) else {
            return false;
        };
        if entry.priority != priority {
            entry.priority = priority;
            self.dirty = true;
        }
        true
    }

    /// Re-sort if anything changed since the last sort. Returns `true` if it
    /// sorted.
    pub(crate) fn sort_if_dirty(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.entries.sort_by_key(|e| (e.priority, e.seq));
        self.dirty = false;
        true
    }

    /// Type ids in current table order.
    pub(crate) fn order(&self) -> Vec<TypeId> {
        self.entries.iter().map(|e| e.type_id).collect()
    }

    /// Names in update order, whether or not the table is sorted yet.
    pub(crate) fn names(&self) -> Vec<&'static str> {
        let mut entries: Vec<&SystemEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| (e.priority, e.seq));
        entries.into_iter().map(|e| e.name).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, type_id: TypeId) -> Option<usize> {
        self.entries.iter().position(|e| e.type_id == type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    fn entry<T: 'static>(priority: i32) -> SystemEntry {
        SystemEntry::new(TypeId::of::<T>(), std::any::type_name::<T>(), priority)
    }

    #[test]
    fn test_sort_by_priority_then_insertion() {
        let mut table = SystemTable::default();
        table.insert(entry::<A>(5));
        table.insert(entry::<B>(1));
        table.insert(entry::<C>(5));
        assert!(table.sort_if_dirty());
        assert_eq!(
            table.order(),
            vec![TypeId::of::<B>(), TypeId::of::<A>(), TypeId::of::<C>()]
        );
        assert!(!table.sort_if_dirty());
    }

    #[test]
    fn test_priority_change_marks_dirty_and_keeps_tie_order() {
        let mut table = SystemTable::default();
        table.insert(entry::<A>(0));
        table.insert(entry::<B>(0));
        table.insert(entry::<C>(0));
        table.sort_if_dirty();

        assert!(table.set_priority(TypeId::of::<A>(), 3));
        assert!(table.sort_if_dirty());
        assert_eq!(
            table.order(),
            vec![TypeId::of::<B>(), TypeId::of::<C>(), TypeId::of::<A>()]
        );

        // Back to the shared priority: insertion order wins again.
        table.set_priority(TypeId::of::<A>(), 0);
        table.sort_if_dirty();
        assert_eq!(table.order()[0], TypeId::of::<A>());
    }

    #[test]
    fn test_unchanged_priority_does_not_dirty() {
        let mut table = SystemTable::default();
        table.insert(entry::<A>(2));
        table.sort_if_dirty();
        assert!(table.set_priority(TypeId::of::<A>(), 2));
        assert!(!table.sort_if_dirty());
        assert!(!table.set_priority(TypeId::of::<B>(), 2));
    }

    #[test]
    fn test_remove() {
        let mut table = SystemTable::default();
        table.insert(entry::<A>(0));
        assert!(table.contains(TypeId::of::<A>()));
        assert!(table.remove(TypeId::of::<A>()).is_some());
        assert!(table.remove(TypeId::of::<A>()).is_none());
        assert_eq!(table.len(), 0);
    }
}
