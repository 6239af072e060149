//! The shared registry of component kinds and families.
//!
//! One [`Registry`] is the single source of truth for kind indices and family
//! identity. Its lifecycle is monotonic: entries are added on first use and
//! never removed, so no teardown is needed. Engines hold it by `Arc`; use
//! [`Registry::shared`] for the process-wide instance or [`Registry::new`] for
//! an isolated one.

use std::sync::{Arc, OnceLock};

use crate::component::{Component, ComponentSet, ComponentType, ComponentTypes};
use crate::error::ComponentError;
use crate::family::{Families, Family, FamilyBuilder, FamilyKey};

static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();

/// Component-kind table plus family interner.
#[derive(Debug, Default)]
pub struct Registry {
    components: ComponentTypes,
    families: Families,
}

impl Registry {
    /// Create an isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn shared() -> Arc<Registry> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Registry::new())))
    }

    /// The component-kind table.
    #[must_use]
    pub fn components(&self) -> &ComponentTypes {
        &self.components
    }

    /// The family interner.
    #[must_use]
    pub fn families(&self) -> &Families {
        &self.families
    }

    /// Shorthand for [`ComponentTypes::index_of`].
    ///
    /// # Errors
    ///
    /// See [`ComponentTypes::index_of`].
    pub fn component_type<T: Component>(&self) -> Result<ComponentType, ComponentError> {
        self.components.index_of::<T>()
    }

    /// Intern the family described by three typed component sets.
    ///
    /// ```rust
    /// use engine_component::{Component, Registry};
    ///
    /// struct Position;
    /// struct Velocity;
    /// struct Frozen;
    /// impl Component for Position {}
    /// impl Component for Velocity {}
    /// impl Component for Frozen {}
    ///
    /// let registry = Registry::new();
    /// let movers = registry.family::<(Position, Velocity), (), (Frozen,)>().unwrap();
    /// let again = registry.family::<(Velocity, Position), (), (Frozen,)>().unwrap();
    /// assert!(std::sync::Arc::ptr_eq(&movers, &again));
    /// ```
    ///
    /// # Errors
    ///
    /// Propagates [`ComponentError::CapacityExceeded`] if a named kind cannot
    /// be registered.
    pub fn family<All: ComponentSet, One: ComponentSet, Exclude: ComponentSet>(
        &self,
    ) -> Result<Arc<Family>, ComponentError> {
        let key = FamilyKey {
            all: All::component_bits(&self.components)?,
            one: One::component_bits(&self.components)?,
            exclude: Exclude::component_bits(&self.components)?,
        };
        Ok(self.families.intern(key))
    }

    /// Intern the family described by `builder`.
    #[must_use]
    pub fn build_family(&self, builder: FamilyBuilder) -> Arc<Family> {
        builder.build(&self.families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}
    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn test_shared_registry_is_a_singleton() {
        let a = Registry::shared();
        let b = Registry::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_typed_family_matches_builder_family() {
        let registry = Registry::new();
        let typed = registry.family::<(Position, Velocity), (), ()>().unwrap();
        let position = registry.component_type::<Position>().unwrap();
        let velocity = registry.component_type::<Velocity>().unwrap();
        let built = registry.build_family(Family::builder().all([velocity, position]));
        assert!(Arc::ptr_eq(&typed, &built));
    }

    #[test]
    fn test_isolated_registries_do_not_share_families() {
        let a = Registry::new();
        let b = Registry::new();
        let fa = a.family::<(Position,), (), ()>().unwrap();
        let fb = b.family::<(Position,), (), ()>().unwrap();
        assert!(!Arc::ptr_eq(&fa, &fb));
    }
}
