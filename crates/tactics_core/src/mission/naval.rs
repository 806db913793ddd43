//! Naval campaign task.
//!
//! Same shape as the attack task with a seaborne composition, plus a scatter
//! check before committing and its own withdrawal phase. The campaign
//! withdraws when nearby hostiles outnumber the fleet by `hostile_ratio`,
//! when it outlasts `max_duration`, or when the fleet centroid stops making
//! progress. Once back at the staging point (or after `retreat_timeout`) it
//! disbands.

use glam::Vec2;
use tracing::{debug, info};

use crate::batcher::ActionBatcher;
use crate::config::NavalConfig;
use crate::error::{Result, TacticsError};
use crate::math::Tile;
use crate::squad::{Squad, SquadState};
use crate::targeting::{best_candidate, TargetLock};
use crate::world::{MovementDomain, Terrain, TickContext, UnitCatalog, UnitId, UnitTypeId};

use super::{elapsed, split_composition, staging_point, DisbandReason, MissionAction, MissionCore};

/// Naval campaign phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavalPhase {
    /// Collecting ships at the staging point.
    Preparing,
    /// Sailing on the target.
    Active,
    /// Withdrawing to the staging point.
    Retreating,
}

impl NavalPhase {
    /// Display name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            NavalPhase::Preparing => "Preparing",
            NavalPhase::Active => "Active",
            NavalPhase::Retreating => "Retreating",
        }
    }
}

/// Naval campaign state.
#[derive(Debug, Clone)]
pub struct NavalTask {
    phase: NavalPhase,
    target: Vec2,
    composition: Vec<(UnitTypeId, u32)>,
    squad: Squad,
    lock: TargetLock,
    gather_started: Option<u64>,
    active_since: u64,
    progress_sample: Option<(u64, Vec2)>,
    last_progress: u64,
    retreat_started: u64,
    retreat_reason: Option<DisbandReason>,
}

impl NavalTask {
    /// Campaign against `target` with an explicit composition.
    #[must_use]
    pub fn new(target: Vec2, composition: Vec<(UnitTypeId, u32)>) -> Self {
        Self {
            phase: NavalPhase::Preparing,
            target,
            composition,
            squad: Squad::new(target, SquadState::Gathering),
            lock: TargetLock::new(),
            gather_started: None,
            active_since: 0,
            progress_sample: None,
            last_progress: 0,
            retreat_started: 0,
            retreat_reason: None,
        }
    }

    /// Campaign against `target` with seaborne combat types from the catalog.
    pub fn from_catalog(target: Vec2, catalog: &UnitCatalog, config: &NavalConfig) -> Result<Self> {
        let types: Vec<UnitTypeId> = catalog
            .combat_types(MovementDomain::is_seaborne)
            .map(|t| t.id)
            .collect();
        if types.is_empty() {
            return Err(TacticsError::NoMatchingUnitType(
                "armed seaborne unit for naval campaign".to_string(),
            ));
        }
        Ok(Self::new(target, split_composition(&types, config.composition_size)))
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> NavalPhase {
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
        if self.composition.is_empty() {
            return Err(TacticsError::EmptyComposition(core.name().to_string()));
        }
        let gather_started = *self.gather_started.get_or_insert(ctx.tick);
        let staging = self.staging(ctx, core);
        Ok(match self.phase {
            NavalPhase::Preparing => self.prepare(core, ctx, batcher, gather_started, staging),
            NavalPhase::Active => self.sail(core, ctx, batcher, staging),
            NavalPhase::Retreating => self.withdraw(core, ctx, batcher),
        })
    }

    /// Water tile nearest the rally point, else the fleet centroid.
    fn staging(&self, ctx: &TickContext<'_>, core: &MissionCore) -> Vec2 {
        let rally = ctx.awareness.rally_point();
        staging_point(ctx, rally, MovementDomain::Naval)
            .or_else(|| core.centroid(ctx))
            .unwrap_or_else(|| ctx.clamp(rally))
    }

    fn prepare(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
        gather_started: u64,
        staging: Vec2,
    ) -> MissionAction {
        let config = &ctx.config.naval;
        let units = core.unit_list();
        let scattered = self.scattered(ctx, &units, config);
        if scattered {
            self.squad.set_state(SquadState::Gathering);
        }
        self.squad.set_target(staging);
        let report = self.squad.update(ctx, &units, batcher);

        let n = report.alive as u32;
        let size: u32 = self.composition.iter().map(|(_, c)| c).sum();
        let waited = elapsed(ctx.tick, gather_started);
        let minimum = n >= config.min_squad_size;
        let ready = n > 0 && n as f32 >= config.ready_fraction * size as f32;
        let gathered_long_enough = minimum && waited >= config.max_gather_ticks;

        if (ready || gathered_long_enough) && !scattered {
            self.phase = NavalPhase::Active;
            core.lock();
            self.target = ctx.clamp(self.target);
            self.lock.lock(self.target, ctx.tick, &ctx.config.targeting);
            self.squad.set_target(self.target);
            self.squad.set_state(SquadState::Gathering);
            self.active_since = ctx.tick;
            self.last_progress = ctx.tick;
            self.progress_sample = report.centroid.map(|c| (ctx.tick, c));
            info!(mission = %core.name(), tick = ctx.tick, units = n, "Naval campaign launched");
            return MissionAction::Noop;
        }

        if !minimum && waited >= config.abandon_ticks {
            info!(mission = %core.name(), tick = ctx.tick, units = n, "Naval campaign starved");
            return MissionAction::Disband(Some(DisbandReason::Starved));
        }

        core.missing(ctx, &self.composition)
            .map_or(MissionAction::Noop, MissionAction::RequestUnits)
    }

    /// More than `scatter_fraction` of the fleet sits beyond `max_scatter`
    /// from its centroid.
    fn scattered(&self, ctx: &TickContext<'_>, units: &[UnitId], config: &NavalConfig) -> bool {
        let positions: Vec<Vec2> = units
            .iter()
            .filter_map(|id| ctx.own_unit(*id))
            .map(|u| u.position)
            .collect();
        let Some(center) = crate::math::centroid(&positions) else {
            return false;
        };
        let far = positions
            .iter()
            .filter(|p| p.distance(center) > config.max_scatter)
            .count();
        far as f32 > config.scatter_fraction * positions.len() as f32
    }

    fn sail(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
        staging: Vec2,
    ) -> MissionAction {
        let config = &ctx.config.naval;
        let targeting = &ctx.config.targeting;
        let tick = ctx.tick;
        let report = self.squad.update(ctx, &core.unit_list(), batcher);
        let Some(center) = report.centroid else {
            return MissionAction::Disband(Some(DisbandReason::UnitsLost));
        };

        let hostiles = ctx.hostile_snapshots(center, config.threat_radius).len();
        if hostiles as f32 > config.hostile_ratio * report.alive as f32 {
            return self.begin_retreat(core, tick, staging, DisbandReason::DefenceTooStrong);
        }
        if elapsed(tick, self.active_since) >= config.max_duration {
            return self.begin_retreat(core, tick, staging, DisbandReason::Timeout);
        }

        let sample_due = self
            .progress_sample
            .map_or(true, |(t, _)| elapsed(tick, t) >= config.progress_interval);
        if sample_due {
            if let Some((_, previous)) = self.progress_sample {
                if previous.distance(center) >= config.min_progress || report.engaged {
                    self.last_progress = tick;
                }
            }
            self.progress_sample = Some((tick, center));

            let lock = &self.lock;
            let candidate = best_candidate(ctx, center, config.threat_radius * 2.0, center, |p| {
                !lock.is_excluded(p, targeting) && near_water(ctx, p)
            });
            let current = crate::targeting::score_point(ctx, self.target, center).score;
            if let Some(candidate) = candidate {
                if self.lock.consider(current, &candidate, tick, targeting) {
                    debug!(mission = %core.name(), tick, score = candidate.score, "Naval retarget");
                    self.target = candidate.point;
                    self.squad.set_target(self.target);
                    self.last_progress = tick;
                }
            } else if report.arrived && current <= 0.0 {
                return self.begin_retreat(core, tick, staging, DisbandReason::Completed);
            }
        }

        if !report.arrived && elapsed(tick, self.last_progress) >= config.no_progress_ticks {
            return self.begin_retreat(core, tick, staging, DisbandReason::Timeout);
        }
        MissionAction::Noop
    }

    fn begin_retreat(
        &mut self,
        core: &MissionCore,
        tick: u64,
        staging: Vec2,
        reason: DisbandReason,
    ) -> MissionAction {
        info!(mission = %core.name(), tick, reason = ?reason, "Naval campaign withdrawing");
        self.phase = NavalPhase::Retreating;
        self.retreat_started = tick;
        self.retreat_reason = Some(reason);
        self.squad.retreat_to(staging);
        MissionAction::Noop
    }

    fn withdraw(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
    ) -> MissionAction {
        let report = self.squad.update(ctx, &core.unit_list(), batcher);
        if report.alive == 0 {
            return MissionAction::Disband(Some(DisbandReason::UnitsLost));
        }
        if report.arrived || elapsed(ctx.tick, self.retreat_started) >= ctx.config.naval.retreat_timeout {
            info!(mission = %core.name(), tick = ctx.tick, "Naval campaign over");
            return MissionAction::Disband(self.retreat_reason);
        }
        MissionAction::Noop
    }
}

/// Water tile or a coast tile with water next to it.
pub(crate) fn near_water(ctx: &TickContext<'_>, point: Vec2) -> bool {
    let tile = Tile::containing(point);
    std::iter::once(tile)
        .chain(tile.neighbors())
        .any(|t| ctx.world.bounds().contains(t) && ctx.world.terrain(t) == Terrain::Water)
}
