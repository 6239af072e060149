//! Components used by the demo simulation.

use engine_ecs::Component;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// World-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position(pub Vec2);

impl Component for Position {}

/// Units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity(pub Vec2);

impl Component for Velocity {}

/// Seconds left before the entity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Component for Lifetime {}
