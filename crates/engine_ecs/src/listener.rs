//! Family-scoped entity listeners.

use std::fmt;
use std::sync::Arc;

use engine_component::Family;

use crate::engine::Engine;
use crate::entity::EntityId;

/// Receives notifications when entities enter or leave a family.
///
/// Notifications fire when an entity is added to or removed from the engine,
/// and when a component change moves it across the family boundary.
/// Structural calls made on `engine` from inside a notification are deferred
/// until the notification round finishes.
pub trait EntityListener: 'static {
    /// `entity` now matches the listener's family.
    fn entity_added(&mut self, engine: &mut Engine, entity: EntityId);

    /// `entity` no longer matches the listener's family. For removals from the
    /// engine, its components are still readable during this call.
    fn entity_removed(&mut self, engine: &mut Engine, entity: EntityId);
}

/// Handle returned by [`Engine::add_entity_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) family: Arc<Family>,
    pub(crate) priority: i32,
    /// `None` while the listener is being notified.
    pub(crate) listener: Option<Box<dyn EntityListener>>,
}

/// Listeners ordered by ascending priority, ties in registration order.
#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: Vec<ListenerEntry>,
    next_id: u64,
}

impl ListenerTable {
    pub(crate) fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub(crate) fn insert(&mut self, entry: ListenerEntry) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.priority > entry.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<ListenerEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ListenerEntry> {
        self.entries.iter()
    }

    pub(crate) fn take(&mut self, id: ListenerId) -> Option<Box<dyn EntityListener>> {
        self.entries.iter_mut().find(|e| e.id == id)?.listener.take()
    }

    pub(crate) fn restore(&mut self, id: ListenerId, listener: Box<dyn EntityListener>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.listener = Some(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Families;

    use super::*;

    struct Noop;
    impl EntityListener for Noop {
        fn entity_added(&mut self, _engine: &mut Engine, _entity: EntityId) {}
        fn entity_removed(&mut self, _engine: &mut Engine, _entity: EntityId) {}
    }

    fn entry(table: &mut ListenerTable, family: &Arc<Family>, priority: i32) -> ListenerId {
        let id = table.next_id();
        table.insert(ListenerEntry {
            id,
            family: Arc::clone(family),
            priority,
            listener: Some(Box::new(Noop)),
        });
        id
    }

    #[test]
    fn test_listeners_sorted_by_priority_then_registration() {
        let families = Families::new();
        let family = Family::builder().build(&families);
        let mut table = ListenerTable::default();
        let late = entry(&mut table, &family, 5);
        let early = entry(&mut table, &family, -1);
        let tie = entry(&mut table, &family, 5);

        let order: Vec<ListenerId> = table.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![early, late, tie]);
    }

    #[test]
    fn test_take_and_restore() {
        let families = Families::new();
        let family = Family::builder().build(&families);
        let mut table = ListenerTable::default();
        let id = entry(&mut table, &family, 0);

        let listener = table.take(id).unwrap();
        assert!(table.take(id).is_none());
        table.restore(id, listener);
        assert!(table.take(id).is_some());
    }

    #[test]
    fn test_remove() {
        let families = Families::new();
        let family = Family::builder().build(&families);
        let mut table = ListenerTable::default();
        let id = entry(&mut table, &family, 0);
        assert!(table.contains(id));
        assert!(table.remove(id).is_some());
        assert!(table.remove(id).is_none());
        assert_eq!(table.len(), 0);
    }
}
