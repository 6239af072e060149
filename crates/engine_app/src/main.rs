//! # engine_app
//!
//! Demo host for the entity engine: a fixed time-step loop driving a small
//! particle simulation (movement, lifetime expiry, respawning, stats).
//!
//! ## Startup Sequence
//!
//! 1. Load the JSON config if one is given, then apply CLI overrides.
//! 2. Install the demo systems and spawn the initial population.
//! 3. Run the tick loop, then shut the engine down.

mod components;
mod systems;
mod tick;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tick::{TickConfig, TickLoop};

#[derive(Parser)]
#[command(name = "engine_app", about = "Fixed time-step demo host for the entity engine")]
struct Args {
    /// Path to a JSON tick config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run (0 = unlimited)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Population to keep alive
    #[arg(short, long)]
    entities: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            TickConfig::load(path)?
        }
        None => TickConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.max_ticks = ticks;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(entities) = args.entities {
        config.entities = entities;
    }
    config.validate()?;

    info!(
        tick_rate = config.tick_rate,
        max_ticks = config.max_ticks,
        entities = config.entities,
        "engine_app starting"
    );

    let mut tick_loop = TickLoop::new(config);
    let population = tick_loop.config().entities;
    let stats_interval = tick_loop.config().stats_interval;
    let engine = tick_loop.engine_mut();
    systems::install(engine, population, stats_interval)?;
    for n in 0..population as u64 {
        systems::spawn_particle(engine, n)?;
    }

    tick_loop.run()?;

    tick_loop.engine_mut().shutdown();
    info!(ticks = tick_loop.tick_id(), "engine_app shut down");
    Ok(())
}
