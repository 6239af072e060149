//! Deferred structural operations.
//!
//! While an update pass, a listener notification or a system attach/detach
//! hook is running, structural calls on the engine are recorded here instead
//! of being applied. The engine drains the queue in issue order after each
//! system's `update` returns and after each top-level operation completes.

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::Arc;

use engine_component::{ComponentType, Family};

use crate::entity::{Entity, EntityId};
use crate::listener::{ListenerEntry, ListenerId};
use crate::system::{System, SystemEntry};

pub(crate) enum PendingOperation {
    AddEntity(Entity),
    RemoveEntity(EntityId),
    /// `None` removes every entity.
    RemoveAllEntities(Option<Arc<Family>>),
    AddComponent {
        entity: EntityId,
        component_type: ComponentType,
        component: Box<dyn Any>,
    },
    RemoveComponent {
        entity: EntityId,
        component_type: ComponentType,
    },
    AddSystem(SystemEntry, Box<dyn System>),
    RemoveSystem(TypeId),
    AddListener(ListenerEntry),
    RemoveListener(ListenerId),
}

impl PendingOperation {
    fn kind(&self) -> &'static str {
        match self {
            PendingOperation::AddEntity(_) => "add_entity",
            PendingOperation::RemoveEntity(_) => "remove_entity",
            PendingOperation::RemoveAllEntities(_) => "remove_all_entities",
            PendingOperation::AddComponent { .. } => "add_component",
            PendingOperation::RemoveComponent { .. } => "remove_component",
            PendingOperation::AddSystem(..) => "add_system",
            PendingOperation::RemoveSystem(_) => "remove_system",
            PendingOperation::AddListener(_) => "add_listener",
            PendingOperation::RemoveListener(_) => "remove_listener",
        }
    }
}

#[derive(Default)]
pub(crate) struct PendingQueue {
    ops: VecDeque<PendingOperation>,
}

impl PendingQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, op: PendingOperation) {
        tracing::trace!(op = op.kind(), queued = self.ops.len() + 1, "deferred structural operation");
        self.ops.push_back(op);
    }

    pub(crate) fn pop(&mut self) -> Option<PendingOperation> {
        self.ops.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether a system of `type_id` will be attached once the queue drains,
    /// given whether it is attached now.
    pub(crate) fn system_attached_after(&self, type_id: TypeId, attached_now: bool) -> bool {
        self.ops.iter().fold(attached_now, |attached, op| match op {
            PendingOperation::AddSystem(entry, _) if entry.type_id == type_id => true,
            PendingOperation::RemoveSystem(t) if *t == type_id => false,
            _ => attached,
        })
    }

    /// Whether listener `id` will be registered once the queue drains.
    pub(crate) fn listener_registered_after(&self, id: ListenerId, registered_now: bool) -> bool {
        self.ops.iter().fold(registered_now, |registered, op| match op {
            PendingOperation::AddListener(entry) if entry.id == id => true,
            PendingOperation::RemoveListener(l) if *l == id => false,
            _ => registered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    fn add_system_op() -> PendingOperation {
        struct Sys;
        impl System for Sys {
            fn update(
                &mut self,
                _engine: &mut crate::Engine,
                _dt: f32,
            ) -> Result<(), crate::EngineError> {
                Ok(())
            }
        }
        PendingOperation::AddSystem(
            SystemEntry::new(TypeId::of::<Dummy>(), "dummy", 0),
            Box::new(Sys),
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PendingQueue::with_capacity(4);
        queue.push(PendingOperation::RemoveEntity(EntityId::from_raw(1)));
        queue.push(PendingOperation::RemoveEntity(EntityId::from_raw(2)));
        assert_eq!(queue.len(), 2);
        assert!(matches!(queue.pop(), Some(PendingOperation::RemoveEntity(e)) if e.id() == 1));
        assert!(matches!(queue.pop(), Some(PendingOperation::RemoveEntity(e)) if e.id() == 2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_system_state_follows_last_queued_operation() {
        let mut queue = PendingQueue::default();
        let id = TypeId::of::<Dummy>();
        assert!(!queue.system_attached_after(id, false));

        queue.push(add_system_op());
        assert!(queue.system_attached_after(id, false));

        queue.push(PendingOperation::RemoveSystem(id));
        assert!(!queue.system_attached_after(id, false));
        assert!(!queue.system_attached_after(id, true));
    }

    #[test]
    fn test_listener_state_follows_queue() {
        let mut queue = PendingQueue::default();
        let id = ListenerId(3);
        assert!(queue.listener_registered_after(id, true));
        queue.push(PendingOperation::RemoveListener(id));
        assert!(!queue.listener_registered_after(id, true));
    }
}
