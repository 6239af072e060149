//! # engine_component
//!
//! The "C" in ECS: what a component kind is, how kinds are indexed, and how
//! entities are selected by the kinds they carry.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`ComponentTypes`], the dense kind-index registry.
//! - [`ComponentBits`]: fixed-width bitsets over component kinds.
//! - [`Family`]: an interned `all` / `one` / `exclude` matching predicate.
//! - [`Registry`]: the shared bundle of both tables.

pub mod bits;
pub mod component;
pub mod error;
pub mod family;
pub mod registry;

pub use bits::{ComponentBits, FamilyBits, MAX_COMPONENT_TYPES};
pub use component::{Component, ComponentSet, ComponentType, ComponentTypes};
pub use error::ComponentError;
pub use family::{Families, Family, FamilyBuilder, FamilyKey};
pub use registry::Registry;
