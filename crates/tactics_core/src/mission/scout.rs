//! Scouting task.
//!
//! No preparation phase: the task keeps requesting a few cheap, fast unit
//! types and sends whatever it owns at one target point at a time. Targets
//! come from the awareness collaborator, falling back to a local search for
//! unexplored tiles. Each target gets a budget of `max_attempts` order
//! attempts, one re-issued move every `attempt_interval` ticks, and
//! `max_target_ticks` ticks; both reset whenever the nearest scout gets
//! strictly closer. The task ends once the map is explored past
//! `explored_threshold` or no target is left.

use std::collections::VecDeque;

use glam::Vec2;
use tracing::{debug, info};

use crate::batcher::ActionBatcher;
use crate::config::ScoutConfig;
use crate::error::{Result, TacticsError};
use crate::math::Tile;
use crate::squad::{Squad, SquadState};
use crate::world::{TickContext, UnitCatalog, UnitTypeId};

use super::{elapsed, split_composition, DisbandReason, MissionAction, MissionCore};

/// Abandoned targets remembered so they are not picked again right away.
const ABANDONED_MEMORY: usize = 8;

/// Rings of `search_step` tiles scanned by the local unexplored search.
const SEARCH_RINGS: i32 = 24;

/// Scouting state.
#[derive(Debug, Clone)]
pub struct ScoutTask {
    types: Vec<UnitTypeId>,
    unit_count: u32,
    squad: Squad,
    target: Option<Vec2>,
    attempts: u32,
    target_since: u64,
    best_distance: f32,
    last_attempt: Option<u64>,
    abandoned: VecDeque<Vec2>,
}

impl ScoutTask {
    /// Keep `unit_count` scouts of the given types alive.
    #[must_use]
    pub fn new(types: Vec<UnitTypeId>, unit_count: u32) -> Self {
        Self {
            types,
            unit_count,
            squad: Squad::new(Vec2::ZERO, SquadState::Exploring),
            target: None,
            attempts: 0,
            target_since: 0,
            best_distance: f32::INFINITY,
            last_attempt: None,
            abandoned: VecDeque::new(),
        }
    }

    /// Scout with the fastest, cheapest types of the catalog.
    pub fn from_catalog(catalog: &UnitCatalog, config: &ScoutConfig) -> Result<Self> {
        let types = catalog.scouting_types(config.type_count);
        if types.is_empty() {
            return Err(TacticsError::NoMatchingUnitType("scouting unit".to_string()));
        }
        Ok(Self::new(types, config.unit_count))
    }

    /// Current target point.
    #[must_use]
    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    /// Order attempts spent on the current target.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Embedded squad.
    #[must_use]
    pub fn squad(&self) -> &Squad {
        &self.squad
    }

    pub(super) fn squad_mut(&mut self) -> &mut Squad {
        &mut self.squad
    }

    pub(super) fn update(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
    ) -> Result<MissionAction> {
        if self.types.is_empty() {
            return Err(TacticsError::EmptyComposition(core.name().to_string()));
        }
        let config = &ctx.config.scout;
        let explored = ctx.awareness.explored_fraction();
        if explored > config.explored_threshold {
            info!(mission = %core.name(), explored, "Map explored");
            return Ok(MissionAction::Disband(Some(DisbandReason::Completed)));
        }

        let units = core.unit_list();
        let positions: Vec<Vec2> = units
            .iter()
            .filter_map(|id| ctx.own_unit(*id))
            .map(|u| u.position)
            .collect();
        let nearest = match self.target {
            Some(target) => positions
                .iter()
                .copied()
                .min_by(|a, b| a.distance(target).total_cmp(&b.distance(target))),
            None => positions.first().copied(),
        };

        if let Some(position) = nearest {
            self.track_progress(ctx, position, config);
            if self.target.is_none() {
                match self.next_target(ctx, position, config) {
                    Some(target) => self.set_target(target, ctx.tick),
                    None => {
                        info!(mission = %core.name(), "Nothing left to scout");
                        return Ok(MissionAction::Disband(Some(DisbandReason::NoTargets)));
                    }
                }
            }
            if let Some(target) = self.target {
                let attempt_due = self
                    .last_attempt
                    .map_or(true, |t| elapsed(ctx.tick, t) >= config.attempt_interval);
                if attempt_due {
                    self.squad.forget_orders();
                }
                self.squad.set_target(target);
                let report = self.squad.update(ctx, &units, batcher);
                // Only a re-issued order counts against the target's budget.
                if attempt_due && report.orders > 0 {
                    self.attempts += 1;
                    self.last_attempt = Some(ctx.tick);
                }
            }
        }

        let wanted = split_composition(&self.types, self.unit_count);
        Ok(core
            .missing(ctx, &wanted)
            .filter(|_| (units.len() as u32) < self.unit_count)
            .map_or(MissionAction::Noop, MissionAction::RequestUnits))
    }

    /// Update the per-target budget from the nearest scout's position.
    fn track_progress(&mut self, ctx: &TickContext<'_>, position: Vec2, config: &ScoutConfig) {
        let Some(target) = self.target else {
            return;
        };
        let distance = position.distance(target);
        if distance <= config.arrival_radius {
            debug!(x = target.x, y = target.y, "Scout target reached");
            self.target = None;
            return;
        }
        if distance < self.best_distance {
            self.best_distance = distance;
            self.attempts = 0;
            self.target_since = ctx.tick;
        }
        if self.attempts >= config.max_attempts
            || elapsed(ctx.tick, self.target_since) >= config.max_target_ticks
        {
            debug!(
                x = target.x,
                y = target.y,
                attempts = self.attempts,
                "Abandoning scout target"
            );
            self.abandoned.push_back(target);
            while self.abandoned.len() > ABANDONED_MEMORY {
                self.abandoned.pop_front();
            }
            self.target = None;
        }
    }

    fn set_target(&mut self, target: Vec2, tick: u64) {
        self.target = Some(target);
        self.attempts = 0;
        self.target_since = tick;
        self.best_distance = f32::INFINITY;
        self.last_attempt = None;
    }

    fn is_abandoned(&self, point: Vec2, config: &ScoutConfig) -> bool {
        self.abandoned
            .iter()
            .any(|a| a.distance(point) <= config.arrival_radius)
    }

    /// Provider target if usable, else the nearest unexplored tile on a
    /// strided ring search around `from`.
    fn next_target(&self, ctx: &TickContext<'_>, from: Vec2, config: &ScoutConfig) -> Option<Vec2> {
        if let Some(point) = ctx.awareness.scouting_target() {
            let point = ctx.clamp(point);
            if !self.is_abandoned(point, config)
                && !ctx.awareness.is_explored(Tile::containing(point))
            {
                return Some(point);
            }
        }
        let origin = Tile::containing(from);
        let step = config.search_step.max(1);
        (1..=SEARCH_RINGS)
            .flat_map(|r| origin.ring(r * step))
            .filter(|t| ctx.world.bounds().contains(*t))
            .filter(|t| !ctx.awareness.is_explored(*t))
            .map(Tile::center)
            .find(|p| !self.is_abandoned(*p, config))
    }
}
