//! Fixed time-step host loop.
//!
//! Each tick advances the tick counter and runs one [`Engine::update`] with
//! the fixed step as delta time. Ticks that overrun their budget are reported
//! and the loop moves straight on to the next one.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use engine_ecs::{Engine, EngineConfig, EngineError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the host loop, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Population the respawner keeps topped up.
    pub entities: usize,
    /// Seconds between stats reports.
    pub stats_interval: f32,
    pub engine: EngineConfig,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            entities: 64,
            stats_interval: 1.0,
            engine: EngineConfig::default(),
        }
    }
}

impl TickConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Malformed JSON, or a non-positive `tick_rate` / `stats_interval`.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: TickConfig = serde_json::from_str(json).context("invalid tick config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// I/O failures and everything [`from_json`](Self::from_json) rejects.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&json)
    }

    /// # Errors
    ///
    /// A non-positive or non-finite `tick_rate` or `stats_interval`.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick_rate must be positive, got {}",
            self.tick_rate
        );
        anyhow::ensure!(
            self.stats_interval.is_finite() && self.stats_interval > 0.0,
            "stats_interval must be positive, got {}",
            self.stats_interval
        );
        Ok(())
    }
}

/// The host loop state.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    engine: Engine,
}

impl TickLoop {
    /// Create a loop around a fresh engine built from `config.engine`.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        let engine = Engine::with_config(config.engine.clone());
        Self::with_engine(config, engine)
    }

    #[must_use]
    pub fn with_engine(config: TickConfig, engine: Engine) -> Self {
        Self {
            tick_id: 0,
            config,
            engine,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Length of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.tick_rate)
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Whatever the engine's update pass returns.
    pub fn tick(&mut self, dt: f32) -> Result<(), EngineError> {
        self.tick_id += 1;
        debug!(
            tick_id = self.tick_id,
            dt,
            entities = self.engine.entity_count(),
            "tick start"
        );
        self.engine.update(dt)
    }

    /// Run the loop for the configured number of ticks, or indefinitely.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tick.
    pub fn run(&mut self) -> Result<(), EngineError> {
        let tick_duration = self.tick_duration();
        let dt = tick_duration.as_secs_f32();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            self.tick(dt)?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0).unwrap();
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick(1.0 / 60.0).unwrap();
        assert_eq!(tick_loop.tick_id(), 2);
        assert_eq!(tick_loop.engine().frame(), 2);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks: 5,
            ..TickConfig::default()
        };
        let mut tick_loop = TickLoop::new(config);
        tick_loop.run().unwrap();
        assert_eq!(tick_loop.tick_id(), 5);
    }

    #[test]
    fn test_partial_json_config() {
        let config = TickConfig::from_json(
            r#"{ "max_ticks": 10, "engine": { "slow_system_threshold_ms": 1.5 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_ticks, 10);
        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.engine.slow_system_threshold_ms, Some(1.5));
    }

    #[test]
    fn test_invalid_tick_rate_rejected() {
        assert!(TickConfig::from_json(r#"{ "tick_rate": 0 }"#).is_err());
        assert!(TickConfig::from_json("not json").is_err());
    }
}
