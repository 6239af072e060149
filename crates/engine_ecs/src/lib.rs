//! # engine_ecs
//!
//! The entity engine: owns entities, keeps one live [`MatchingSet`] per
//! [`Family`] it has been asked about, and runs attached [`System`]s in
//! priority order once per [`Engine::update`].
//!
//! ```ignore
//! let mut engine = Engine::new();
//! let movers = engine.family::<(Position, Velocity), (), ()>()?;
//! engine.add_system(IteratingSystem::new(movers, Movement))?;
//!
//! let e = engine.create_entity();
//! engine.add_component(e, Position::default())?;
//! engine.add_component(e, Velocity::default())?;
//! engine.update(1.0 / 60.0)?;
//! ```
//!
//! Structural changes issued from inside a system, listener or hook are
//! deferred; see [`engine`] for the exact flush points.

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod listener;
pub mod mapper;
pub mod matching;
mod pending;
pub mod system;
pub mod systems;


pub use config::EngineConfig;
pub use engine::Engine;
pub use entity::{Entity, EntityId};
pub use error::EngineError;
pub use listener::{EntityListener, ListenerId};
pub use mapper::ComponentMapper;
pub use matching::MatchingSet;
pub use system::System;
pub use systems::{
    EntityProcessor, IntervalIteratingSystem, IntervalSystem, IntervalTask, IteratingSystem,
    SortedIteratingSystem, SortedProcessor,
};

pub use engine_component::{
    Component, ComponentBits, ComponentError, ComponentSet, ComponentType, Family, FamilyBuilder,
    Registry,
};
