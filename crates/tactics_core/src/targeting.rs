//! Target-area scoring and the anti-oscillation target lock.
//!
//! An area is worth the summed value of the hostiles around it, discounted by
//! its distance from the force:
//!
//! ```text
//! score = value / (1 + k * distance(area, force_centroid))
//! ```
//!
//! Structures are worth more than combatants, combatants more than anything
//! else, and high-value structures are multiplied further. When a high-value
//! structure is present `k` is relaxed so the force commits to the longer
//! trip instead of bouncing between nearby skirmishes.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::TargetingConfig;
use crate::world::{TickContext, UnitSnapshot};

/// Most candidate points examined per scan.
const MAX_CANDIDATES: usize = 16;

/// A scored candidate area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaScore {
    /// Centre of the area.
    pub point: Vec2,
    /// Distance-discounted value.
    pub score: f32,
    /// Hostiles counted.
    pub hostiles: usize,
    /// Whether a high-value structure is in the area.
    pub high_value: bool,
}

/// Raw value of a single hostile.
#[must_use]
pub fn hostile_value(unit: &UnitSnapshot, config: &TargetingConfig) -> f32 {
    if unit.is_structure {
        let value = config.building_value;
        if unit.is_high_value {
            value * config.high_value_multiplier
        } else {
            value
        }
    } else if unit.is_combatant() {
        config.combat_value
    } else {
        config.other_value
    }
}

/// Score the hostiles around `center` as seen from `force_centroid`.
#[must_use]
pub fn score_area(
    hostiles: &[UnitSnapshot],
    center: Vec2,
    force_centroid: Vec2,
    config: &TargetingConfig,
) -> AreaScore {
    let value: f32 = hostiles.iter().map(|h| hostile_value(h, config)).sum();
    let high_value = hostiles.iter().any(|h| h.is_structure && h.is_high_value);
    let k = if high_value {
        config.distance_factor * config.high_value_relief
    } else {
        config.distance_factor
    };
    let distance = center.distance(force_centroid);
    AreaScore {
        point: center,
        score: value / (1.0 + k * distance),
        hostiles: hostiles.len(),
        high_value,
    }
}

/// Query the awareness collaborator and score the area around `point`.
#[must_use]
pub fn score_point(ctx: &TickContext<'_>, point: Vec2, force_centroid: Vec2) -> AreaScore {
    let config = &ctx.config.targeting;
    let hostiles: Vec<UnitSnapshot> = ctx
        .hostile_snapshots(point, config.scan_radius)
        .into_iter()
        .map(|(unit, _)| unit)
        .collect();
    score_area(&hostiles, point, force_centroid, config)
}

/// Best-scoring hostile position within `radius` of `around`.
///
/// Candidate points are the positions of the nearest hostiles; each is scored
/// with its own neighbourhood. Points `accept` rejects are skipped.
#[must_use]
pub fn best_candidate(
    ctx: &TickContext<'_>,
    around: Vec2,
    radius: f32,
    force_centroid: Vec2,
    accept: impl Fn(Vec2) -> bool,
) -> Option<AreaScore> {
    ctx.hostile_snapshots(around, radius)
        .into_iter()
        .take(MAX_CANDIDATES)
        .map(|(unit, _)| ctx.clamp(unit.position))
        .filter(|p| accept(*p))
        .map(|p| score_point(ctx, p, force_centroid))
        .filter(|s| s.score > 0.0)
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Currently locked target plus a short memory of previous ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetLock {
    current: Option<Vec2>,
    locked_at: u64,
    visited: VecDeque<Vec2>,
}

impl TargetLock {
    /// Empty lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locked target, if any.
    #[must_use]
    pub fn current(&self) -> Option<Vec2> {
        self.current
    }

    /// Tick the current target was locked.
    #[must_use]
    pub fn locked_at(&self) -> u64 {
        self.locked_at
    }

    /// Previously visited targets, oldest first.
    pub fn visited(&self) -> impl Iterator<Item = &Vec2> {
        self.visited.iter()
    }

    /// Lock `target` unconditionally, remembering the previous one.
    pub fn lock(&mut self, target: Vec2, tick: u64, config: &TargetingConfig) {
        if let Some(previous) = self.current.replace(target) {
            self.visited.push_back(previous);
            while self.visited.len() > config.memory {
                self.visited.pop_front();
            }
        }
        self.locked_at = tick;
    }

    /// Whether `point` lies within the exclusion radius of a remembered target.
    #[must_use]
    pub fn is_excluded(&self, point: Vec2, config: &TargetingConfig) -> bool {
        self.visited
            .iter()
            .any(|v| v.distance(point) <= config.exclusion_radius)
    }

    /// The switching rule.
    ///
    /// With no current target any candidate is accepted. Otherwise the lock
    /// must have aged `lock_ticks`, the candidate must beat the current score
    /// by `min_improvement`, and it must not revisit a remembered target.
    #[must_use]
    pub fn should_switch(
        &self,
        current_score: f32,
        candidate: &AreaScore,
        tick: u64,
        config: &TargetingConfig,
    ) -> bool {
        if self.current.is_none() {
            return true;
        }
        let aged = tick.saturating_sub(self.locked_at) >= config.lock_ticks;
        let better = candidate.score > current_score * (1.0 + config.min_improvement);
        aged && better && !self.is_excluded(candidate.point, config)
    }

    /// Apply the switching rule, returning whether the target changed.
    pub fn consider(
        &mut self,
        current_score: f32,
        candidate: &AreaScore,
        tick: u64,
        config: &TargetingConfig,
    ) -> bool {
        if self.should_switch(current_score, candidate, tick, config) {
            self.lock(candidate.point, tick, config);
            true
        } else {
            false
        }
    }
}
