//! Core [`Component`] trait and the component-kind registry.
//!
//! Every component kind is assigned a dense [`ComponentType`] index the first
//! time it is seen. Indices are never reused or removed, so the table only
//! grows, and it is bounded by [`MAX_COMPONENT_TYPES`].

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::bits::{ComponentBits, MAX_COMPONENT_TYPES};
use crate::error::ComponentError;

/// The dense index of a registered component kind, in `[0, MAX_COMPONENT_TYPES)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(u16);

impl ComponentType {
    /// Build a component type from a raw index.
    ///
    /// Indices are normally handed out by [`ComponentTypes::index_of`]; this
    /// exists for bitset plumbing and tests.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }

    /// Returns the dense index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentType({})", self.0)
    }
}

/// The core component trait.
///
/// A component is a plain data record attached to at most one instance per
/// entity.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Any {
    /// A human-readable name for this component kind, used in logs and errors.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// Maps component kinds to dense [`ComponentType`] indices.
///
/// Lookups and registrations are safe from any thread. Registration is
/// idempotent: the same Rust type always maps to the same index.
#[derive(Debug, Default)]
pub struct ComponentTypes {
    by_type: DashMap<TypeId, ComponentType>,
    names: DashMap<ComponentType, &'static str>,
    next_index: AtomicUsize,
}

impl ComponentTypes {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for `T`, registering it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::CapacityExceeded`] when `T` is new and
    /// [`MAX_COMPONENT_TYPES`] kinds are already registered.
    pub fn index_of<T: Component>(&self) -> Result<ComponentType, ComponentError> {
        match self.by_type.entry(TypeId::of::<T>()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let index = self
                    .next_index
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < MAX_COMPONENT_TYPES).then_some(n + 1)
                    })
                    .map_err(|_| ComponentError::CapacityExceeded {
                        name: T::type_name(),
                        capacity: MAX_COMPONENT_TYPES,
                    })?;
                let component_type = ComponentType::from_index(index);
                self.names.insert(component_type, T::type_name());
                entry.insert(component_type);
                Ok(component_type)
            }
        }
    }

    /// Returns the index for `T` without registering it.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentType> {
        self.by_type.get(&TypeId::of::<T>()).map(|r| *r)
    }

    /// Returns the registered name of a component kind.
    #[must_use]
    pub fn name_of(&self, component_type: ComponentType) -> Option<&'static str> {
        self.names.get(&component_type).map(|r| *r)
    }

    /// Number of registered component kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Returns `true` if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// A statically-typed set of component kinds, implemented for tuples.
///
/// Used to name family criteria by type: `(Position, Velocity)` or `()`.
pub trait ComponentSet {
    /// Resolve (registering as needed) every kind in the set into a bitset.
    ///
    /// # Errors
    ///
    /// Propagates [`ComponentError::CapacityExceeded`] from registration.
    fn component_bits(types: &ComponentTypes) -> Result<ComponentBits, ComponentError>;
}

impl ComponentSet for () {
    fn component_bits(_types: &ComponentTypes) -> Result<ComponentBits, ComponentError> {
        Ok(ComponentBits::new())
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn component_bits(types: &ComponentTypes) -> Result<ComponentBits, ComponentError> {
                let mut bits = ComponentBits::new();
                $( bits.insert(types.index_of::<$name>()?); )+
                Ok(bits)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
