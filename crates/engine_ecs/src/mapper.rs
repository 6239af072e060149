//! Typed component handles.

use std::fmt;
use std::marker::PhantomData;

use engine_component::{Component, ComponentError, ComponentType, Registry};

use crate::engine::Engine;
use crate::entity::EntityId;

/// Typed component access with the kind index resolved once.
///
/// Systems that touch the same component kind for every entity of a pass can
/// hold a mapper instead of looking the kind up per call.
pub struct ComponentMapper<T> {
    component_type: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentMapper<T> {
    /// Resolve (registering on first use) the kind of `T` in `registry`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::CapacityExceeded`] if the kind table is full.
    pub fn new(registry: &Registry) -> Result<Self, ComponentError> {
        Ok(Self {
            component_type: registry.component_type::<T>()?,
            _marker: PhantomData,
        })
    }

    /// The cached kind index.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The `T` of `entity`, `None` if the entity is unknown or lacks one.
    #[must_use]
    pub fn get<'a>(&self, engine: &'a Engine, entity: EntityId) -> Option<&'a T> {
        engine.entity(entity)?.get::<T>(self.component_type)
    }

    /// Mutable variant of [`get`](Self::get).
    #[must_use]
    pub fn get_mut<'a>(&self, engine: &'a mut Engine, entity: EntityId) -> Option<&'a mut T> {
        engine.entity_mut(entity)?.get_mut::<T>(self.component_type)
    }

    #[must_use]
    pub fn has(&self, engine: &Engine, entity: EntityId) -> bool {
        engine
            .entity(entity)
            .is_some_and(|e| e.has(self.component_type))
    }
}

impl<T> Clone for ComponentMapper<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentMapper<T> {}

impl<T> fmt::Debug for ComponentMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMapper")
            .field("type", &std::any::type_name::<T>())
            .field("component_type", &self.component_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug)]
    struct Armor;
    impl Component for Armor {}

    #[test]
    fn test_mapper_reads_and_writes() {
        let registry = Arc::new(Registry::new());
        let mut engine = Engine::with_registry(Arc::clone(&registry), EngineConfig::default());
        let health = ComponentMapper::<Health>::new(&registry).unwrap();
        let armor = ComponentMapper::<Armor>::new(&registry).unwrap();

        let e = engine.create_entity();
        engine.add_component(e, Health(10)).unwrap();

        assert_eq!(health.get(&engine, e), Some(&Health(10)));
        assert!(health.has(&engine, e));
        assert!(!armor.has(&engine, e));

        health.get_mut(&mut engine, e).unwrap().0 -= 3;
        assert_eq!(engine.get_component::<Health>(e), Some(&Health(7)));
    }

    #[test]
    fn test_mapper_on_missing_entity() {
        let registry = Arc::new(Registry::new());
        let engine = Engine::with_registry(Arc::clone(&registry), EngineConfig::default());
        let health = ComponentMapper::<Health>::new(&registry).unwrap();
        assert!(health.get(&engine, EntityId::from_raw(99)).is_none());
    }

    #[test]
    fn test_mapper_matches_registry_index() {
        let registry = Registry::new();
        let mapper = ComponentMapper::<Health>::new(&registry).unwrap();
        let copy = mapper;
        assert_eq!(copy.component_type(), registry.component_type::<Health>().unwrap());
    }
}
