//! Demo systems: movement, lifetime expiry, respawning and stats.

use std::f32::consts::TAU;
use std::sync::Arc;

use engine_ecs::{
    Engine, EngineError, EntityId, EntityListener, EntityProcessor, Family, IntervalSystem,
    IntervalTask, IteratingSystem,
};
use glam::Vec2;
use tracing::{debug, info};

use crate::components::{Lifetime, Position, Velocity};

/// Update priorities, lowest first.
pub mod priority {
    pub const MOVEMENT: i32 = 0;
    pub const EXPIRY: i32 = 10;
    pub const RESPAWN: i32 = 20;
    pub const STATS: i32 = 100;
}

/// Integrates velocity into position.
#[derive(Debug, Default)]
pub struct Movement;

impl EntityProcessor for Movement {
    fn process_entity(
        &mut self,
        engine: &mut Engine,
        entity: EntityId,
        dt: f32,
    ) -> Result<(), EngineError> {
        let Some(&Velocity(velocity)) = engine.get_component::<Velocity>(entity) else {
            return Ok(());
        };
        if let Some(Position(position)) = engine.get_component_mut::<Position>(entity) {
            *position += velocity * dt;
        }
        Ok(())
    }
}

/// Counts lifetimes down and removes entities whose time is up.
#[derive(Debug, Default)]
pub struct Expiry {
    expired: u64,
}

impl Expiry {
    /// Entities removed so far.
    pub fn expired(&self) -> u64 {
        self.expired
    }
}

impl EntityProcessor for Expiry {
    fn process_entity(
        &mut self,
        engine: &mut Engine,
        entity: EntityId,
        dt: f32,
    ) -> Result<(), EngineError> {
        let Some(lifetime) = engine.get_component_mut::<Lifetime>(entity) else {
            return Ok(());
        };
        lifetime.remaining -= dt;
        if lifetime.remaining <= 0.0 {
            engine.remove_entity(entity)?;
            self.expired += 1;
        }
        Ok(())
    }
}

/// Keeps the population at `target` by spawning particles.
#[derive(Debug)]
pub struct Respawner {
    target: usize,
    spawned: u64,
}

impl Respawner {
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self { target, spawned: 0 }
    }

    /// Particles spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

impl IntervalTask for Respawner {
    fn update_interval(&mut self, engine: &mut Engine, _interval: f32) -> Result<(), EngineError> {
        // Spawns from earlier ticks of this frame are still queued.
        let population = engine.entity_count() + engine.pending_entity_count();
        let missing = self.target.saturating_sub(population);
        for _ in 0..missing {
            spawn_particle(engine, self.spawned)?;
            self.spawned += 1;
        }
        if missing > 0 {
            debug!(spawned = missing, "population topped up");
        }
        Ok(())
    }
}

/// Periodically logs the population.
#[derive(Debug)]
pub struct StatsReporter {
    movers: Arc<Family>,
}

impl StatsReporter {
    pub fn new(movers: Arc<Family>) -> Self {
        Self { movers }
    }
}

impl IntervalTask for StatsReporter {
    fn update_interval(&mut self, engine: &mut Engine, _interval: f32) -> Result<(), EngineError> {
        let moving = engine.entities_for(&self.movers).len();
        info!(
            frame = engine.frame(),
            entities = engine.entity_count(),
            moving,
            "population"
        );
        Ok(())
    }
}

/// Logs entities as they enter and leave the engine.
#[derive(Debug, Default)]
pub struct LifecycleLog {
    pub added: u64,
    pub removed: u64,
}

impl EntityListener for LifecycleLog {
    fn entity_added(&mut self, _engine: &mut Engine, entity: EntityId) {
        self.added += 1;
        debug!(%entity, "spawned");
    }

    fn entity_removed(&mut self, _engine: &mut Engine, entity: EntityId) {
        self.removed += 1;
        debug!(%entity, "despawned");
    }
}

/// Spawn the `n`th particle: evenly spread headings, staggered lifetimes.
pub fn spawn_particle(engine: &mut Engine, n: u64) -> Result<EntityId, EngineError> {
    // Golden-angle spacing keeps successive headings well apart.
    let heading = (n as f32 * 0.381_966 * TAU) % TAU;
    let speed = 1.0 + (n % 4) as f32;

    let entity = engine.create_entity();
    engine.add_component(entity, Position(Vec2::ZERO))?;
    engine.add_component(entity, Velocity(Vec2::from_angle(heading) * speed))?;
    engine.add_component(
        entity,
        Lifetime {
            remaining: 1.0 + (n % 5) as f32 * 0.5,
        },
    )?;
    Ok(entity)
}

/// Attach the demo systems and the lifecycle listener.
///
/// # Errors
///
/// Fails if any of the systems is already attached.
pub fn install(engine: &mut Engine, population: usize, stats_interval: f32) -> Result<(), EngineError> {
    let movers = engine.family::<(Position, Velocity), (), ()>()?;
    let mortal = engine.family::<(Lifetime,), (), ()>()?;
    let everything = engine.family::<(), (), ()>()?;

    engine.add_system(
        IteratingSystem::new(Arc::clone(&movers), Movement).with_priority(priority::MOVEMENT),
    )?;
    engine.add_system(
        IteratingSystem::new(mortal, Expiry::default()).with_priority(priority::EXPIRY),
    )?;
    engine.add_system(
        IntervalSystem::new(0.25, Respawner::new(population)).with_priority(priority::RESPAWN),
    )?;
    engine.add_system(
        IntervalSystem::new(stats_interval, StatsReporter::new(movers))
            .with_priority(priority::STATS),
    )?;
    engine.add_entity_listener(&everything, 0, LifecycleLog::default());

    info!(systems = ?engine.system_names(), population, "demo installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine_ecs::{EngineConfig, Registry};

    use super::*;

    fn new_engine() -> Engine {
        Engine::with_registry(Arc::new(Registry::new()), EngineConfig::default())
    }

    #[test]
    fn test_movement_integrates_velocity() {
        let mut engine = new_engine();
        let movers = engine.family::<(Position, Velocity), (), ()>().unwrap();
        engine
            .add_system(IteratingSystem::new(movers, Movement))
            .unwrap();
        let e = engine.create_entity();
        engine.add_component(e, Position(Vec2::new(1.0, 1.0))).unwrap();
        engine.add_component(e, Velocity(Vec2::new(2.0, 0.0))).unwrap();

        engine.update(0.5).unwrap();
        assert_eq!(
            engine.get_component::<Position>(e),
            Some(&Position(Vec2::new(2.0, 1.0)))
        );
    }

    #[test]
    fn test_expiry_removes_entities_from_its_own_pass() {
        let mut engine = new_engine();
        let mortal = engine.family::<(Lifetime,), (), ()>().unwrap();
        engine
            .add_system(IteratingSystem::new(mortal, Expiry::default()))
            .unwrap();
        for remaining in [0.1, 0.3, 1.0, 0.2] {
            let e = engine.create_entity();
            engine.add_component(e, Lifetime { remaining }).unwrap();
        }

        engine.update(0.25).unwrap();
        assert_eq!(engine.entity_count(), 2);
        let expiry = engine
            .get_system::<IteratingSystem<Expiry>>()
            .unwrap()
            .processor();
        assert_eq!(expiry.expired(), 2);
    }

    #[test]
    fn test_respawner_tops_up_population() {
        let mut engine = new_engine();
        engine
            .add_system(IntervalSystem::new(0.25, Respawner::new(8)))
            .unwrap();
        engine.update(0.25).unwrap();
        assert_eq!(engine.entity_count(), 8);

        let e = engine.entities().next().unwrap().id();
        engine.remove_entity(e).unwrap();
        engine.update(0.25).unwrap();
        assert_eq!(engine.entity_count(), 8);
        assert_eq!(
            engine
                .get_system::<IntervalSystem<Respawner>>()
                .unwrap()
                .task()
                .spawned(),
            9
        );
    }

    #[test]
    fn test_respawner_counts_queued_spawns_across_ticks() {
        let mut engine = new_engine();
        engine
            .add_system(IntervalSystem::new(0.25, Respawner::new(4)))
            .unwrap();

        // Two ticks in one frame; the first tick's spawns are still queued
        // when the second runs.
        engine.update(0.5).unwrap();
        assert_eq!(engine.entity_count(), 4);
        assert_eq!(engine.pending_entity_count(), 0);
        assert_eq!(
            engine
                .get_system::<IntervalSystem<Respawner>>()
                .unwrap()
                .task()
                .spawned(),
            4
        );
    }

    #[test]
    fn test_demo_population_is_stable() {
        let mut engine = new_engine();
        install(&mut engine, 16, 1.0).unwrap();
        for _ in 0..240 {
            engine.update(1.0 / 60.0).unwrap();
            assert!(engine.entity_count() <= 16);
        }
        assert!(engine.entity_count() > 0);
        assert!(
            engine
                .get_system::<IteratingSystem<Expiry>>()
                .unwrap()
                .processor()
                .expired()
                > 0
        );
        assert!(matches!(
            install(&mut engine, 16, 1.0),
            Err(EngineError::SystemAlreadyAdded(_))
        ));
    }
}
