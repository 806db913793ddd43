//! Mission factories: spawn conditions, sub-mission requests and removal
//! callbacks.
//!
//! The controller asks every registered factory once per tick whether a new
//! mission should start, routes [`MissionAction::RequestSubMission`] to the
//! factory registered for the requested kind, and hands every removed
//! mission to the factory of its kind so it can react (back off, retry or
//! spawn a successor).
//!
//! [`MissionAction::RequestSubMission`]: crate::mission::MissionAction::RequestSubMission

use glam::Vec2;
use tracing::debug;

use crate::error::Result;
use crate::mission::naval::near_water;
use crate::mission::{
    AttackTask, DisbandReason, Mission, MissionKind, MissionTask, NavalTask, RetreatTask,
    ScoutTask,
};
use crate::targeting::best_candidate;
use crate::world::{TickContext, UnitId};

/// A mission the controller just removed.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedMission {
    /// Unique name of the removed mission.
    pub name: String,
    /// Its family.
    pub kind: MissionKind,
    /// Why it ended, if it said.
    pub reason: Option<DisbandReason>,
    /// Living units it owned, now released.
    pub survivors: Vec<UnitId>,
    /// Its priority at removal.
    pub priority: f32,
    /// Tick of removal.
    pub tick: u64,
}

/// Creates missions of one kind.
pub trait MissionFactory {
    /// Kind this factory creates and receives callbacks for.
    fn kind(&self) -> MissionKind;

    /// Spawn a mission if the trigger conditions hold.
    ///
    /// `missions` is the live mission list before this tick's updates.
    fn try_spawn(&mut self, ctx: &TickContext<'_>, missions: &[Mission]) -> Result<Option<Mission>>;

    /// Spawn a supporting mission another mission asked for.
    fn spawn_requested(
        &mut self,
        _ctx: &TickContext<'_>,
        _target: Vec2,
        _missions: &[Mission],
    ) -> Result<Option<Mission>> {
        Ok(None)
    }

    /// Called once after a mission of this kind was removed. Returned missions
    /// are added to the controller; they may own the survivors.
    fn on_removed(&mut self, _ctx: &TickContext<'_>, _removed: &RemovedMission) -> Vec<Mission> {
        Vec::new()
    }
}

fn cooling_down(last_spawn: Option<u64>, tick: u64, cooldown: u64) -> bool {
    last_spawn.is_some_and(|t| tick.saturating_sub(t) < cooldown)
}

/// Starts land attacks on the best hostile area near the rally point and
/// turns every ended attack into a retreat of its survivors.
#[derive(Debug, Default)]
pub struct AttackFactory {
    spawned: u64,
    last_spawn: Option<u64>,
    backoff_until: u64,
}

impl AttackFactory {
    /// New factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MissionFactory for AttackFactory {
    fn kind(&self) -> MissionKind {
        MissionKind::Attack
    }

    fn try_spawn(&mut self, ctx: &TickContext<'_>, missions: &[Mission]) -> Result<Option<Mission>> {
        let config = &ctx.config.attack;
        if cooling_down(self.last_spawn, ctx.tick, config.cooldown) || ctx.tick < self.backoff_until
        {
            return Ok(None);
        }
        if missions
            .iter()
            .any(|m| m.kind() == MissionKind::Attack && !m.is_locked())
        {
            return Ok(None);
        }
        let rally = ctx.clamp(ctx.awareness.rally_point());
        let Some(area) = best_candidate(ctx, rally, config.max_target_distance, rally, |_| true)
        else {
            return Ok(None);
        };
        self.last_spawn = Some(ctx.tick);
        let task = AttackTask::from_catalog(area.point, ctx.catalog, config)?;
        self.spawned += 1;
        Ok(Some(Mission::new(
            format!("attack-{}", self.spawned),
            config.priority,
            MissionTask::Attack(task),
            ctx.tick,
        )))
    }

    fn on_removed(&mut self, ctx: &TickContext<'_>, removed: &RemovedMission) -> Vec<Mission> {
        if removed.reason == Some(DisbandReason::DefenceTooStrong) {
            self.backoff_until = removed.tick + ctx.config.attack.cooldown * 2;
            debug!(until = self.backoff_until, "Attack spawns backing off");
        }
        if removed.survivors.is_empty() {
            return Vec::new();
        }
        let rally = ctx.clamp(ctx.awareness.rally_point());
        let retreat = Mission::new(
            format!("{}-retreat", removed.name),
            removed.priority,
            MissionTask::Retreat(RetreatTask::new(rally)),
            ctx.tick,
        )
        .with_units(removed.survivors.iter().copied());
        vec![retreat]
    }
}

/// Starts naval campaigns against coastal targets, on its own or when an
/// attack asks for support.
#[derive(Debug, Default)]
pub struct NavalFactory {
    spawned: u64,
    last_spawn: Option<u64>,
}

impl NavalFactory {
    /// New factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&mut self, ctx: &TickContext<'_>, target: Vec2) -> Result<Mission> {
        self.last_spawn = Some(ctx.tick);
        let config = &ctx.config.naval;
        let task = NavalTask::from_catalog(target, ctx.catalog, config)?;
        self.spawned += 1;
        Ok(Mission::new(
            format!("naval-{}", self.spawned),
            config.priority,
            MissionTask::Naval(task),
            ctx.tick,
        ))
    }
}

impl MissionFactory for NavalFactory {
    fn kind(&self) -> MissionKind {
        MissionKind::Naval
    }

    fn try_spawn(&mut self, ctx: &TickContext<'_>, missions: &[Mission]) -> Result<Option<Mission>> {
        let config = &ctx.config.naval;
        if cooling_down(self.last_spawn, ctx.tick, config.cooldown)
            || missions.iter().any(|m| m.kind() == MissionKind::Naval)
        {
            return Ok(None);
        }
        let rally = ctx.clamp(ctx.awareness.rally_point());
        let Some(area) = best_candidate(ctx, rally, config.max_target_distance, rally, |p| {
            near_water(ctx, p)
        }) else {
            return Ok(None);
        };
        self.build(ctx, area.point).map(Some)
    }

    fn spawn_requested(
        &mut self,
        ctx: &TickContext<'_>,
        target: Vec2,
        missions: &[Mission],
    ) -> Result<Option<Mission>> {
        if missions.iter().any(|m| m.kind() == MissionKind::Naval) {
            debug!("Naval support requested but a campaign is already running");
            return Ok(None);
        }
        self.build(ctx, target).map(Some)
    }
}

/// Keeps one scouting mission alive until the map is explored.
#[derive(Debug, Default)]
pub struct ScoutFactory {
    spawned: u64,
    last_spawn: Option<u64>,
}

impl ScoutFactory {
    /// New factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MissionFactory for ScoutFactory {
    fn kind(&self) -> MissionKind {
        MissionKind::Scout
    }

    fn try_spawn(&mut self, ctx: &TickContext<'_>, missions: &[Mission]) -> Result<Option<Mission>> {
        let config = &ctx.config.scout;
        if cooling_down(self.last_spawn, ctx.tick, config.cooldown)
            || missions.iter().any(|m| m.kind() == MissionKind::Scout)
            || ctx.awareness.explored_fraction() > config.explored_threshold
        {
            return Ok(None);
        }
        self.last_spawn = Some(ctx.tick);
        let task = ScoutTask::from_catalog(ctx.catalog, config)?;
        self.spawned += 1;
        Ok(Some(Mission::new(
            format!("scout-{}", self.spawned),
            config.priority,
            MissionTask::Scout(task),
            ctx.tick,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown() {
        assert!(!cooling_down(None, 10, 100));
        assert!(cooling_down(Some(0), 99, 100));
        assert!(!cooling_down(Some(0), 100, 100));
    }

    #[test]
    fn test_factory_kinds() {
        assert_eq!(AttackFactory::new().kind(), MissionKind::Attack);
        assert_eq!(NavalFactory::new().kind(), MissionKind::Naval);
        assert_eq!(ScoutFactory::new().kind(), MissionKind::Scout);
    }
}
