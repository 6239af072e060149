//! Family-driven systems: an [`EntityProcessor`] run over one matching set.

use std::sync::Arc;

use engine_component::Family;

use crate::engine::Engine;
use crate::entity::EntityId;
use crate::error::EngineError;
use crate::matching::MatchingSet;
use crate::system::System;

/// Per-entity logic run by [`IteratingSystem`] and friends.
pub trait EntityProcessor: 'static {
    /// Called once per matching entity per pass.
    ///
    /// # Errors
    ///
    /// An error stops the pass and the frame.
    fn process_entity(
        &mut self,
        engine: &mut Engine,
        entity: EntityId,
        dt: f32,
    ) -> Result<(), EngineError>;

    /// Called before the first entity of a pass.
    fn begin_pass(&mut self, _engine: &mut Engine, _dt: f32) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called after the last entity of a pass.
    fn end_pass(&mut self, _engine: &mut Engine, _dt: f32) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Walk `set` once, visiting every entity present when the walk starts.
///
/// Structural changes made by the processor are deferred by the engine, so
/// the set cannot shift under the index. With `skip_scheduled`, entities
/// already queued for removal are passed over.
pub(crate) fn process_pass<P: EntityProcessor>(
    set: &MatchingSet,
    processor: &mut P,
    engine: &mut Engine,
    dt: f32,
    skip_scheduled: bool,
) -> Result<(), EngineError> {
    processor.begin_pass(engine, dt)?;
    let len = set.len();
    for index in 0..len {
        let Some(entity) = set.get(index) else {
            break;
        };
        if skip_scheduled
            && engine
                .entity(entity)
                .is_some_and(|e| e.is_scheduled_for_removal())
        {
            continue;
        }
        processor.process_entity(engine, entity, dt)?;
    }
    processor.end_pass(engine, dt)
}

/// A system that runs an [`EntityProcessor`] over every entity of one family,
/// in matching-set order, once per frame.
///
/// The matching set is captured when the system is attached and released when
/// it is detached.
pub struct IteratingSystem<P> {
    family: Arc<Family>,
    priority: i32,
    entities: Option<MatchingSet>,
    processor: P,
}

impl<P: EntityProcessor> IteratingSystem<P> {
    /// A detached system over `family` at priority 0.
    pub fn new(family: Arc<Family>, processor: P) -> Self {
        Self {
            family,
            priority: 0,
            entities: None,
            processor,
        }
    }

    /// Set the update priority; lower runs first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn family(&self) -> &Arc<Family> {
        &self.family
    }

    /// The captured matching set, `None` while detached.
    pub fn entities(&self) -> Option<&MatchingSet> {
        self.entities.as_ref()
    }

    /// The per-entity logic, for reading state it accumulated.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Mutable access to the per-entity logic.
    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }
}

impl<P: EntityProcessor> System for IteratingSystem<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn added_to_engine(&mut self, engine: &mut Engine) {
        self.entities = Some(engine.entities_for(&self.family));
    }

    fn removed_from_engine(&mut self, _engine: &mut Engine) {
        self.entities = None;
    }

    fn update(&mut self, engine: &mut Engine, dt: f32) -> Result<(), EngineError> {
        let Some(set) = self.entities.clone() else {
            return Ok(());
        };
        process_pass(&set, &mut self.processor, engine, dt, false)
    }
}
