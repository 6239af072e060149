//! Fixed-rate systems driven by an accumulator over frame time.
//!
//! Frame time is banked until a whole interval has passed; a frame longer
//! than the interval fires several ticks back to back.

use std::sync::Arc;

use engine_component::Family;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::matching::MatchingSet;
use crate::system::System;
use crate::systems::EntityProcessor;
use crate::systems::iterating::process_pass;

/// Work run by an [`IntervalSystem`] at a fixed rate.
pub trait IntervalTask: 'static {
    /// Run one tick. `interval` is the fixed step, not the frame's delta.
    ///
    /// # Errors
    ///
    /// An error stops the remaining ticks and the frame.
    fn update_interval(&mut self, engine: &mut Engine, interval: f32) -> Result<(), EngineError>;
}

/// Time accumulator shared by the interval systems.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    interval: f32,
    elapsed: f32,
}

impl Accumulator {
    fn new(interval: f32) -> Self {
        assert!(
            interval > 0.0 && interval.is_finite(),
            "interval must be positive and finite, got {interval}"
        );
        Self {
            interval,
            elapsed: 0.0,
        }
    }

    /// Advance by `dt` and return how many whole intervals elapsed.
    fn advance(&mut self, dt: f32) -> u32 {
        self.elapsed += dt;
        let mut ticks = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            ticks += 1;
        }
        ticks
    }
}

/// Runs an [`IntervalTask`] once per elapsed `interval` of frame time,
/// regardless of frame rate. A long frame fires the task several times.
pub struct IntervalSystem<T> {
    clock: Accumulator,
    priority: i32,
    task: T,
}

impl<T: IntervalTask> IntervalSystem<T> {
    /// # Panics
    ///
    /// If `interval` is not a positive finite number of seconds.
    pub fn new(interval: f32, task: T) -> Self {
        Self {
            clock: Accumulator::new(interval),
            priority: 0,
            task,
        }
    }

    /// Set the update priority; lower runs first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Seconds between ticks.
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.clock.interval
    }

    /// The task, for reading state it accumulated.
    pub fn task(&self) -> &T {
        &self.task
    }

    /// Mutable access to the task, e.g. to retarget it between frames.
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }
}

impl<T: IntervalTask> System for IntervalSystem<T> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn update(&mut self, engine: &mut Engine, dt: f32) -> Result<(), EngineError> {
        let interval = self.clock.interval;
        for _ in 0..self.clock.advance(dt) {
            self.task.update_interval(engine, interval)?;
        }
        Ok(())
    }
}

/// An interval system that walks one family at each tick, passing the
/// interval as the processor's delta time.
pub struct IntervalIteratingSystem<P> {
    family: Arc<Family>,
    clock: Accumulator,
    priority: i32,
    entities: Option<MatchingSet>,
    processor: P,
}

impl<P: EntityProcessor> IntervalIteratingSystem<P> {
    /// # Panics
    ///
    /// If `interval` is not a positive finite number of seconds.
    pub fn new(family: Arc<Family>, interval: f32, processor: P) -> Self {
        Self {
            family,
            clock: Accumulator::new(interval),
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

    /// The per-entity logic.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }
}

impl<P: EntityProcessor> System for IntervalIteratingSystem<P> {
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
        let interval = self.clock.interval;
        // Removals from an earlier tick stay queued until the system returns;
        // later ticks skip those entities.
        for tick in 0..self.clock.advance(dt) {
            process_pass(&set, &mut self.processor, engine, interval, tick > 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_counts_whole_intervals() {
        let mut clock = Accumulator::new(0.5);
        assert_eq!(clock.advance(0.2), 0);
        assert_eq!(clock.advance(0.2), 0);
        assert_eq!(clock.advance(0.2), 1);
        assert_eq!(clock.advance(1.0), 2);
    }

    #[test]
    #[should_panic(expected = "interval must be positive")]
    fn test_zero_interval_rejected() {
        let _ = Accumulator::new(0.0);
    }
}
