//! Land attack task.
//!
//! Preparing: request the composition and hold at the rally point. The force
//! commits when any of these holds:
//!
//! - owned units reach `ready_fraction` of the composition
//! - gathering outlasted `max_gather_ticks` with at least `min_squad_size`
//! - an own structure near the rally point is under attack (the force is
//!   redirected to it) and the minimum size holds
//! - the force already stands within `force_attack_distance` of the target
//!
//! Active: the squad fights toward a locked target. Better targets are taken
//! through the [`TargetLock`] switching rule. When the target area is clear
//! the task asks the controller for area searches with a growing radius; once
//! the radius is exhausted and nothing happened for `idle_timeout` ticks the
//! task disbands with [`DisbandReason::NoTargets`].

use glam::Vec2;
use tracing::{debug, info};

use crate::batcher::ActionBatcher;
use crate::config::AttackConfig;
use crate::error::{Result, TacticsError};
use crate::math::Tile;
use crate::squad::{Squad, SquadState};
use crate::targeting::{best_candidate, score_point, TargetLock};
use crate::world::{MovementDomain, Terrain, TickContext, UnitCatalog, UnitTypeId};

use super::{
    elapsed, split_composition, DisbandReason, MissionAction, MissionCore, MissionKind,
    SearchResult,
};

/// Attack phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    /// Collecting units at the rally point.
    Preparing,
    /// Committed to a target.
    Active,
}

impl AttackPhase {
    /// Display name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AttackPhase::Preparing => "Preparing",
            AttackPhase::Active => "Active",
        }
    }
}

/// Attack task state.
#[derive(Debug, Clone)]
pub struct AttackTask {
    phase: AttackPhase,
    target: Vec2,
    composition: Vec<(UnitTypeId, u32)>,
    squad: Squad,
    lock: TargetLock,
    gather_started: Option<u64>,
    last_retarget: Option<u64>,
    search_radius: Option<f32>,
    search_pending: bool,
    search_exhausted: bool,
    clear_since: Option<u64>,
    naval_requested: bool,
}

impl AttackTask {
    /// Attack `target` with an explicit composition.
    #[must_use]
    pub fn new(target: Vec2, composition: Vec<(UnitTypeId, u32)>) -> Self {
        Self {
            phase: AttackPhase::Preparing,
            target,
            composition,
            squad: Squad::new(target, SquadState::Gathering),
            lock: TargetLock::new(),
            gather_started: None,
            last_retarget: None,
            search_radius: None,
            search_pending: false,
            search_exhausted: false,
            clear_since: None,
            naval_requested: false,
        }
    }

    /// Attack `target` with land combat types from the catalog.
    pub fn from_catalog(target: Vec2, catalog: &UnitCatalog, config: &AttackConfig) -> Result<Self> {
        let types: Vec<UnitTypeId> = catalog
            .combat_types(|d| matches!(d, MovementDomain::Land | MovementDomain::Amphibious))
            .map(|t| t.id)
            .collect();
        if types.is_empty() {
            return Err(TacticsError::NoMatchingUnitType(
                "armed land unit for attack".to_string(),
            ));
        }
        Ok(Self::new(target, split_composition(&types, config.composition_size)))
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Requested composition.
    #[must_use]
    pub fn composition(&self) -> &[(UnitTypeId, u32)] {
        &self.composition
    }

    /// Target lock state.
    #[must_use]
    pub fn target_lock(&self) -> &TargetLock {
        &self.lock
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
        let gather_started = *self.gather_started.get_or_insert(ctx.tick);
        match self.phase {
            AttackPhase::Preparing => self.prepare(core, ctx, batcher, gather_started),
            AttackPhase::Active => Ok(self.fight(core, ctx, batcher)),
        }
    }

    fn prepare(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
        gather_started: u64,
    ) -> Result<MissionAction> {
        if self.composition.is_empty() {
            return Err(TacticsError::EmptyComposition(core.name().to_string()));
        }
        let config = &ctx.config.attack;
        let rally = ctx.clamp(ctx.awareness.rally_point());
        self.squad.set_target(rally);
        let report = self.squad.update(ctx, &core.unit_list(), batcher);

        let n = report.alive as u32;
        let size: u32 = self.composition.iter().map(|(_, c)| c).sum();
        let waited = elapsed(ctx.tick, gather_started);
        let minimum = n >= config.min_squad_size;

        if minimum {
            let defend = ctx
                .awareness
                .attacked_structures()
                .into_iter()
                .filter(|p| p.distance(rally) <= config.defense_radius)
                .min_by(|a, b| a.distance(rally).total_cmp(&b.distance(rally)));
            if let Some(structure) = defend {
                info!(mission = %core.name(), tick = ctx.tick, "Base under attack, committing early");
                self.target = structure;
                return Ok(self.activate(core, ctx, n));
            }
        }

        let ready = n > 0 && n as f32 >= config.ready_fraction * size as f32;
        let gathered_long_enough = minimum && waited >= config.max_gather_ticks;
        let close = report
            .centroid
            .is_some_and(|c| c.distance(self.target) <= config.force_attack_distance);
        if ready || gathered_long_enough || close {
            return Ok(self.activate(core, ctx, n));
        }

        if !minimum && waited >= config.abandon_ticks {
            info!(mission = %core.name(), tick = ctx.tick, units = n, "Attack starved");
            return Ok(MissionAction::Disband(Some(DisbandReason::Starved)));
        }

        Ok(core
            .missing(ctx, &self.composition)
            .map_or(MissionAction::Noop, MissionAction::RequestUnits))
    }

    fn activate(&mut self, core: &mut MissionCore, ctx: &TickContext<'_>, units: u32) -> MissionAction {
        self.phase = AttackPhase::Active;
        core.lock();
        self.target = ctx.clamp(self.target);
        self.lock.lock(self.target, ctx.tick, &ctx.config.targeting);
        self.squad.set_target(self.target);
        self.squad.set_state(SquadState::Gathering);
        self.last_retarget = Some(ctx.tick);
        self.search_radius = Some(ctx.config.attack.search_radius);
        info!(
            mission = %core.name(),
            tick = ctx.tick,
            units,
            x = self.target.x,
            y = self.target.y,
            "Attack committed"
        );
        self.naval_support(ctx)
    }

    /// Ask once for naval support when the target lies on water.
    fn naval_support(&mut self, ctx: &TickContext<'_>) -> MissionAction {
        if !self.naval_requested && ctx.world.terrain(Tile::containing(self.target)) == Terrain::Water
        {
            self.naval_requested = true;
            return MissionAction::RequestSubMission {
                kind: MissionKind::Naval,
                target: self.target,
            };
        }
        MissionAction::Noop
    }

    fn fight(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
    ) -> MissionAction {
        let config = &ctx.config.attack;
        let targeting = &ctx.config.targeting;
        let tick = ctx.tick;

        if let Some(result) = core.take_search_result() {
            if let Some(action) = self.absorb_search(core, ctx, result) {
                return action;
            }
        }

        let report = self.squad.update(ctx, &core.unit_list(), batcher);
        let Some(center) = report.centroid else {
            return MissionAction::Disband(Some(DisbandReason::UnitsLost));
        };

        let threats = ctx
            .hostile_snapshots(center, targeting.scan_radius)
            .iter()
            .filter(|(u, _)| u.is_combatant())
            .count();
        if threats as f32 > config.defence_ratio * report.alive as f32 {
            info!(mission = %core.name(), tick, threats, units = report.alive, "Defence too strong");
            return MissionAction::Disband(Some(DisbandReason::DefenceTooStrong));
        }

        let clear = ctx.hostile_snapshots(self.target, config.clear_radius).is_empty();
        if !clear {
            self.clear_since = None;
            self.search_exhausted = false;
            self.search_radius = Some(config.search_radius);
        }

        let retarget_due = self
            .last_retarget
            .map_or(true, |t| elapsed(tick, t) >= config.retarget_interval);
        if !retarget_due {
            return MissionAction::Noop;
        }
        self.last_retarget = Some(tick);

        let current = if clear {
            0.0
        } else {
            score_point(ctx, self.target, center).score
        };
        let lock = &self.lock;
        let candidate = best_candidate(ctx, center, config.search_radius, center, |p| {
            !lock.is_excluded(p, targeting)
        });
        if let Some(candidate) = candidate {
            if self.lock.consider(current, &candidate, tick, targeting) {
                debug!(
                    mission = %core.name(),
                    tick,
                    score = candidate.score,
                    previous = current,
                    "Switching target"
                );
                return self.retarget(ctx, candidate.point);
            }
        }

        if !clear {
            return MissionAction::Noop;
        }
        let since = *self.clear_since.get_or_insert(tick);
        if !self.search_exhausted && !self.search_pending {
            self.search_pending = true;
            return MissionAction::SearchArea {
                center: self.target,
                radius: self.search_radius.unwrap_or(config.search_radius),
            };
        }
        let last_activity = report.last_engagement.map_or(since, |t| t.max(since));
        if self.search_exhausted && elapsed(tick, last_activity) >= config.idle_timeout {
            info!(mission = %core.name(), tick, "No targets left");
            return MissionAction::Disband(Some(DisbandReason::NoTargets));
        }
        MissionAction::Noop
    }

    /// Fold a delivered search answer into the target state.
    fn absorb_search(
        &mut self,
        core: &MissionCore,
        ctx: &TickContext<'_>,
        result: SearchResult,
    ) -> Option<MissionAction> {
        let config = &ctx.config.attack;
        let targeting = &ctx.config.targeting;
        self.search_pending = false;

        let found = result
            .found
            .filter(|area| !self.lock.is_excluded(area.point, targeting));
        match found {
            Some(area) => {
                if self.lock.consider(0.0, &area, ctx.tick, targeting) {
                    debug!(mission = %core.name(), tick = ctx.tick, radius = result.radius, "Search found a target");
                    return Some(self.retarget(ctx, area.point));
                }
            }
            None => {
                let grown = result.radius * config.search_growth;
                if grown > config.max_search_radius {
                    debug!(mission = %core.name(), tick = ctx.tick, "Search radius exhausted");
                    self.search_exhausted = true;
                } else {
                    self.search_radius = Some(grown);
                }
            }
        }
        None
    }

    fn retarget(&mut self, ctx: &TickContext<'_>, point: Vec2) -> MissionAction {
        self.target = ctx.clamp(point);
        self.squad.set_target(self.target);
        self.clear_since = None;
        self.search_exhausted = false;
        self.search_radius = Some(ctx.config.attack.search_radius);
        self.naval_support(ctx)
    }
}
