//! Iterating system with a caller-defined visiting order.

use std::cmp::Ordering;
use std::sync::Arc;

use engine_component::Family;

use crate::engine::Engine;
use crate::entity::EntityId;
use crate::error::EngineError;
use crate::matching::MatchingSet;
use crate::system::System;
use crate::systems::EntityProcessor;

/// An [`EntityProcessor`] that also defines the visiting order.
pub trait SortedProcessor: EntityProcessor {
    /// Order `a` relative to `b`. Components are readable through `engine`.
    fn compare(&self, engine: &Engine, a: EntityId, b: EntityId) -> Ordering;
}

/// Like [`IteratingSystem`](super::IteratingSystem), but visits entities in
/// the order given by [`SortedProcessor::compare`].
///
/// The sorted order is cached and rebuilt only when the matching set gained or
/// lost members, or after [`force_sort`](Self::force_sort). Call `force_sort`
/// when component data the comparison depends on has changed.
pub struct SortedIteratingSystem<P> {
    family: Arc<Family>,
    priority: i32,
    entities: Option<MatchingSet>,
    sorted: Vec<EntityId>,
    sorted_version: Option<u64>,
    force_sort: bool,
    processor: P,
}

impl<P: SortedProcessor> SortedIteratingSystem<P> {
    /// A detached system over `family` at priority 0.
    pub fn new(family: Arc<Family>, processor: P) -> Self {
        Self {
            family,
            priority: 0,
            entities: None,
            sorted: Vec::new(),
            sorted_version: None,
            force_sort: false,
            processor,
        }
    }

    /// Set the update priority; lower runs first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Re-sort before the next pass even if membership is unchanged.
    pub fn force_sort(&mut self) {
        self.force_sort = true;
    }

    /// The visiting order as of the last pass.
    pub fn sorted_entities(&self) -> &[EntityId] {
        &self.sorted
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    fn sort_if_needed(&mut self, set: &MatchingSet, engine: &Engine) {
        let version = set.version();
        if !self.force_sort && self.sorted_version == Some(version) {
            return;
        }
        self.sorted = set.snapshot();
        let processor = &self.processor;
        self.sorted.sort_by(|&a, &b| processor.compare(engine, a, b));
        self.sorted_version = Some(version);
        self.force_sort = false;
    }
}

impl<P: SortedProcessor> System for SortedIteratingSystem<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn added_to_engine(&mut self, engine: &mut Engine) {
        self.entities = Some(engine.entities_for(&self.family));
        self.sorted_version = None;
    }

    fn removed_from_engine(&mut self, _engine: &mut Engine) {
        self.entities = None;
        self.sorted.clear();
        self.sorted_version = None;
    }

    fn update(&mut self, engine: &mut Engine, dt: f32) -> Result<(), EngineError> {
        let Some(set) = self.entities.clone() else {
            return Ok(());
        };
        self.sort_if_needed(&set, engine);

        self.processor.begin_pass(engine, dt)?;
        for index in 0..self.sorted.len() {
            let entity = self.sorted[index];
            self.processor.process_entity(engine, entity, dt)?;
        }
        self.processor.end_pass(engine, dt)
    }
}
