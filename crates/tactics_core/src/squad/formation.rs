//! Ring formation and the gather/scatter radii.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::config::SquadConfig;
use crate::math::direction;

/// Ring radius for a squad of `n`: `clamp(n / 3, 1, 3)`.
#[must_use]
pub fn formation_radius(n: usize) -> f32 {
    (n as f32 / 3.0).clamp(1.0, 3.0)
}

/// Offset of member `index` of `n` from the formation anchor.
#[must_use]
pub fn formation_offset(index: usize, n: usize) -> Vec2 {
    let n = n.max(1);
    direction(TAU * index as f32 / n as f32) * formation_radius(n)
}

/// Farthest-member distance at which a gathering squad may advance.
#[must_use]
pub fn gather_radius(n: usize, config: &SquadConfig) -> f32 {
    (n as f32).sqrt() * config.gather_ratio + config.gather_min_radius
}

/// Farthest-member distance past which an attacking squad re-gathers.
#[must_use]
pub fn scatter_radius(n: usize, config: &SquadConfig) -> f32 {
    (n as f32).sqrt() * config.gather_ratio + config.gather_max_radius
}
