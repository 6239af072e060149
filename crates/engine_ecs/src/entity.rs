//! Entity identifiers and the per-entity component record.
//!
//! An [`EntityId`] is a lightweight `u64` handle. The [`Entity`] record behind
//! it stores the component bitset, the family-membership cache, and at most
//! one component instance per kind.
//!
//! Entities can be assembled detached with [`Entity::new`] and
//! [`Entity::add`], then handed to [`Engine::add_entity`](crate::Engine::add_entity).
//! Once the engine owns an entity it is only ever mutated through the engine.

use std::any::Any;
use std::fmt;

use engine_component::{
    Component, ComponentBits, ComponentError, ComponentType, ComponentTypes, FamilyBits,
};

/// A unique entity identifier.
///
/// Identifiers are handed out by the engine starting at 1 and are never reused
/// within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// The null / unassigned identifier carried by detached entities.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an identifier from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is an assigned (non-zero) identifier.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// An entity's component record.
#[derive(Default)]
pub struct Entity {
    id: EntityId,
    flags: u32,
    component_bits: ComponentBits,
    family_bits: FamilyBits,
    components: Vec<Option<Box<dyn Any>>>,
    scheduled_for_removal: bool,
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Entity {
    /// Create a detached entity with no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine-assigned identifier, or [`EntityId::INVALID`] while detached.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// User-defined flag bits. Not interpreted by the engine.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Replace the flag bits.
    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    /// The set of component kinds currently attached.
    #[must_use]
    pub fn component_bits(&self) -> &ComponentBits {
        &self.component_bits
    }

    /// Indices of the families this entity currently belongs to.
    #[must_use]
    pub fn family_bits(&self) -> &FamilyBits {
        &self.family_bits
    }

    /// Returns `true` if a component of kind `component_type` is attached.
    #[must_use]
    pub fn has(&self, component_type: ComponentType) -> bool {
        self.component_bits.contains(component_type)
    }

    /// Borrow the component of kind `component_type` as a `T`.
    ///
    /// Returns `None` if absent or if `T` is not the kind's type.
    #[must_use]
    pub fn get<T: Component>(&self, component_type: ComponentType) -> Option<&T> {
        self.components
            .get(component_type.index())?
            .as_ref()?
            .downcast_ref::<T>()
    }

    /// Number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_bits.len()
    }

    /// Returns `true` if the engine has queued this entity for removal.
    #[must_use]
    pub fn is_scheduled_for_removal(&self) -> bool {
        self.scheduled_for_removal
    }

    /// Attach `component` to a detached entity, replacing any previous
    /// instance of the same kind.
    ///
    /// # Errors
    ///
    /// Fails if `T` is a new kind and the registry is full.
    pub fn add<T: Component>(
        &mut self,
        types: &ComponentTypes,
        component: T,
    ) -> Result<&mut Self, ComponentError> {
        let component_type = types.index_of::<T>()?;
        self.insert(component_type, Box::new(component));
        Ok(self)
    }

    /// Detach and return the `T` component of a detached entity.
    pub fn remove<T: Component>(&mut self, types: &ComponentTypes) -> Option<T> {
        let component_type = types.get::<T>()?;
        self.take(component_type)?
            .downcast::<T>()
            .ok()
            .map(|boxed| *boxed)
    }

    pub(crate) fn get_mut<T: Component>(&mut self, component_type: ComponentType) -> Option<&mut T> {
        self.components
            .get_mut(component_type.index())?
            .as_mut()?
            .downcast_mut::<T>()
    }

    /// Store a component. Returns `true` if the kind was not attached before.
    pub(crate) fn insert(&mut self, component_type: ComponentType, component: Box<dyn Any>) -> bool {
        let index = component_type.index();
        if index >= self.components.len() {
            self.components.resize_with(index + 1, || None);
        }
        self.components[index] = Some(component);
        self.component_bits.insert(component_type)
    }

    pub(crate) fn take(&mut self, component_type: ComponentType) -> Option<Box<dyn Any>> {
        self.component_bits.remove(component_type);
        self.components.get_mut(component_type.index())?.take()
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub(crate) fn family_bits_mut(&mut self) -> &mut FamilyBits {
        &mut self.family_bits
    }

    pub(crate) fn schedule_for_removal(&mut self) {
        self.scheduled_for_removal = true;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("components", &self.component_bits.iter().collect::<Vec<_>>())
            .field("scheduled_for_removal", &self.scheduled_for_removal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Armor(u32);
    impl Component for Armor {}

    #[test]
    fn test_entity_id_validity() {
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId::from_raw(7).is_valid());
        assert_eq!(EntityId::from_raw(7).to_string(), "Entity(7)");
    }

    #[test]
    fn test_detached_entity_add_and_get() {
        let types = ComponentTypes::new();
        let mut entity = Entity::new();
        entity.add(&types, Health(10)).unwrap().add(&types, Armor(3)).unwrap();

        let health = types.get::<Health>().unwrap();
        assert!(entity.has(health));
        assert_eq!(entity.get::<Health>(health), Some(&Health(10)));
        assert_eq!(entity.component_count(), 2);
        assert!(!entity.id().is_valid());
    }

    #[test]
    fn test_add_replaces_same_kind() {
        let types = ComponentTypes::new();
        let mut entity = Entity::new();
        entity.add(&types, Health(1)).unwrap();
        entity.add(&types, Health(2)).unwrap();
        let health = types.get::<Health>().unwrap();
        assert_eq!(entity.get::<Health>(health), Some(&Health(2)));
        assert_eq!(entity.component_count(), 1);
    }

    #[test]
    fn test_detached_entity_remove() {
        let types = ComponentTypes::new();
        let mut entity = Entity::new();
        entity.add(&types, Armor(5)).unwrap();
        assert_eq!(entity.remove::<Armor>(&types), Some(Armor(5)));
        assert_eq!(entity.remove::<Armor>(&types), None);
        assert_eq!(entity.remove::<Health>(&types), None);
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn test_get_with_wrong_type_is_none() {
        let types = ComponentTypes::new();
        let mut entity = Entity::new();
        entity.add(&types, Health(1)).unwrap();
        let health = types.get::<Health>().unwrap();
        assert!(entity.get::<Armor>(health).is_none());
    }
}
