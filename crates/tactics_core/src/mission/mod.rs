//! Missions: goal-directed tasks that claim units.
//!
//! A [`Mission`] couples the bookkeeping every task shares (unique name,
//! ramped priority, owned units, lock flag) with one [`MissionTask`] variant
//! holding the task's private state machine. Each decision tick the
//! controller calls [`Mission::update`], which prunes lost units, runs the
//! task and returns a single [`MissionAction`].
//!
//! Missions never talk to each other or to the unit pool directly. Unit
//! requests, sub-mission requests and area searches are all returned as
//! actions and mediated by the controller.

pub mod attack;
pub mod naval;
pub mod retreat;
pub mod scout;

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batcher::ActionBatcher;
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::math::{centroid, Tile};
use crate::squad::Squad;
use crate::targeting::AreaScore;
use crate::world::{MovementDomain, TickContext, UnitId, UnitTypeId};

pub use attack::{AttackPhase, AttackTask};
pub use naval::{NavalPhase, NavalTask};
pub use retreat::RetreatTask;
pub use scout::ScoutTask;

/// Ring radius (tiles) searched for a staging tile.
const STAGING_SEARCH_RADIUS: i32 = 16;

/// Mission families. Factories register against one kind each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MissionKind {
    /// Land offensive.
    Attack,
    /// Naval campaign.
    Naval,
    /// Reconnaissance.
    Scout,
    /// Withdrawal of survivors.
    Retreat,
}

impl fmt::Display for MissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissionKind::Attack => "attack",
            MissionKind::Naval => "naval",
            MissionKind::Scout => "scout",
            MissionKind::Retreat => "retreat",
        };
        f.write_str(name)
    }
}

/// Why a mission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisbandReason {
    /// Nothing left to attack or scout.
    NoTargets,
    /// The opposition outnumbers the force.
    DefenceTooStrong,
    /// Requested units never arrived.
    Starved,
    /// Goal reached.
    Completed,
    /// Every owned unit died.
    UnitsLost,
    /// A duration budget ran out.
    Timeout,
    /// The update returned an error.
    Fault,
}

/// Units wanted by a mission, per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRequest {
    /// Requested count per unit type.
    pub types: Vec<(UnitTypeId, u32)>,
    /// Requester priority at the time of the request.
    pub priority: f32,
}

impl UnitRequest {
    /// Total units requested.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.types.iter().map(|(_, n)| n).sum()
    }
}

/// What a mission wants from the controller this tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MissionAction {
    /// Nothing.
    #[default]
    Noop,
    /// Ask the allocation auction for units.
    RequestUnits(UnitRequest),
    /// End the mission and release its units.
    Disband(Option<DisbandReason>),
    /// Ask the factory registered for `kind` to start a supporting mission.
    RequestSubMission {
        /// Mission family to spawn.
        kind: MissionKind,
        /// Target for the new mission.
        target: Vec2,
    },
    /// Ask for the best hostile area around a point.
    SearchArea {
        /// Search centre.
        center: Vec2,
        /// Search radius.
        radius: f32,
    },
}

/// Answer to a [`MissionAction::SearchArea`], delivered the following tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Searched centre.
    pub center: Vec2,
    /// Searched radius.
    pub radius: f32,
    /// Best area found, if any.
    pub found: Option<AreaScore>,
}

/// Request priority with bounded multiplicative ramping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    base: f32,
    current: f32,
}

impl Priority {
    /// Start at `base`.
    #[must_use]
    pub fn new(base: f32) -> Self {
        Self {
            base,
            current: base,
        }
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Starting value.
    #[must_use]
    pub fn base(&self) -> f32 {
        self.base
    }

    /// One starved tick: multiply by the ramp factor, saturating at the
    /// ceiling. Never decreases.
    pub fn ramp(&mut self, config: &ControllerConfig) {
        let ramped = (self.current * config.priority_ramp).min(config.priority_ceiling);
        self.current = self.current.max(ramped);
    }
}

/// Closed set of task state machines.
#[derive(Debug, Clone)]
pub enum MissionTask {
    /// Land offensive.
    Attack(AttackTask),
    /// Naval campaign.
    Naval(NavalTask),
    /// Reconnaissance.
    Scout(ScoutTask),
    /// Withdrawal.
    Retreat(RetreatTask),
}

impl MissionTask {
    /// Family of this task.
    #[must_use]
    pub fn kind(&self) -> MissionKind {
        match self {
            MissionTask::Attack(_) => MissionKind::Attack,
            MissionTask::Naval(_) => MissionKind::Naval,
            MissionTask::Scout(_) => MissionKind::Scout,
            MissionTask::Retreat(_) => MissionKind::Retreat,
        }
    }

    fn squad_mut(&mut self) -> &mut Squad {
        match self {
            MissionTask::Attack(t) => t.squad_mut(),
            MissionTask::Naval(t) => t.squad_mut(),
            MissionTask::Scout(t) => t.squad_mut(),
            MissionTask::Retreat(t) => t.squad_mut(),
        }
    }

    fn phase(&self) -> &'static str {
        match self {
            MissionTask::Attack(t) => t.phase().label(),
            MissionTask::Naval(t) => t.phase().label(),
            MissionTask::Scout(_) => "Scouting",
            MissionTask::Retreat(_) => "Retreating",
        }
    }

    fn target(&self) -> Option<Vec2> {
        match self {
            MissionTask::Attack(t) => Some(t.target()),
            MissionTask::Naval(t) => Some(t.target()),
            MissionTask::Scout(t) => t.target(),
            MissionTask::Retreat(t) => Some(t.rally()),
        }
    }
}

/// State every task shares, handed to the task on each update.
#[derive(Debug, Clone)]
pub struct MissionCore {
    name: String,
    priority: Priority,
    units: BTreeSet<UnitId>,
    locked: bool,
    created_tick: u64,
    search_result: Option<SearchResult>,
}

impl MissionCore {
    /// Unique mission name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current request priority.
    #[must_use]
    pub fn priority(&self) -> f32 {
        self.priority.value()
    }

    /// Owned units in id order.
    #[must_use]
    pub fn units(&self) -> &BTreeSet<UnitId> {
        &self.units
    }

    /// Owned units as a vector, id order.
    #[must_use]
    pub fn unit_list(&self) -> Vec<UnitId> {
        self.units.iter().copied().collect()
    }

    /// Whether the controller may no longer reclaim units.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock the mission. Irreversible.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Tick of creation.
    #[must_use]
    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    /// Take the search answer delivered since the last update.
    pub fn take_search_result(&mut self) -> Option<SearchResult> {
        self.search_result.take()
    }

    /// Units still missing from `composition`, given the owned unit types.
    ///
    /// Returns `None` when the composition is complete.
    #[must_use]
    pub fn missing(
        &self,
        ctx: &TickContext<'_>,
        composition: &[(UnitTypeId, u32)],
    ) -> Option<UnitRequest> {
        let types: Vec<(UnitTypeId, u32)> = composition
            .iter()
            .filter_map(|&(unit_type, wanted)| {
                let owned = self
                    .units
                    .iter()
                    .filter_map(|id| ctx.own_unit(*id))
                    .filter(|u| u.unit_type == unit_type)
                    .count() as u32;
                (owned < wanted).then_some((unit_type, wanted - owned))
            })
            .collect();
        (!types.is_empty()).then(|| UnitRequest {
            types,
            priority: self.priority(),
        })
    }

    /// Mean position of the owned units that are still alive.
    #[must_use]
    pub fn centroid(&self, ctx: &TickContext<'_>) -> Option<Vec2> {
        let positions: Vec<Vec2> = self
            .units
            .iter()
            .filter_map(|id| ctx.own_unit(*id))
            .map(|u| u.position)
            .collect();
        centroid(&positions)
    }
}

/// A live mission.
#[derive(Debug, Clone)]
pub struct Mission {
    core: MissionCore,
    seq: u64,
    task: MissionTask,
}

impl Mission {
    /// Wrap a task. Priority starts at `priority`.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: f32, task: MissionTask, tick: u64) -> Self {
        let locked = matches!(task, MissionTask::Scout(_) | MissionTask::Retreat(_));
        Self {
            core: MissionCore {
                name: name.into(),
                priority: Priority::new(priority),
                units: BTreeSet::new(),
                locked,
                created_tick: tick,
                search_result: None,
            },
            seq: 0,
            task,
        }
    }

    /// Start with these units already owned.
    #[must_use]
    pub fn with_units(mut self, units: impl IntoIterator<Item = UnitId>) -> Self {
        self.core.units.extend(units);
        self
    }

    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Family.
    #[must_use]
    pub fn kind(&self) -> MissionKind {
        self.task.kind()
    }

    /// Current request priority.
    #[must_use]
    pub fn priority(&self) -> f32 {
        self.core.priority()
    }

    /// Owned units.
    #[must_use]
    pub fn units(&self) -> &BTreeSet<UnitId> {
        &self.core.units
    }

    /// Whether the controller may no longer reclaim units.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.core.locked
    }

    /// Tick of creation.
    #[must_use]
    pub fn created_tick(&self) -> u64 {
        self.core.created_tick
    }

    /// Creation order within the controller.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Task state.
    #[must_use]
    pub fn task(&self) -> &MissionTask {
        &self.task
    }

    /// Current phase name.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        self.task.phase()
    }

    /// One-line debug text.
    #[must_use]
    pub fn describe(&self) -> String {
        let target = self
            .task
            .target()
            .map_or_else(|| "-".to_string(), |t| format!("({:.0},{:.0})", t.x, t.y));
        format!(
            "{} [{}] prio={:.1} units={}{} target={}",
            self.core.name,
            self.phase(),
            self.core.priority(),
            self.core.units.len(),
            if self.core.locked { " locked" } else { "" },
            target
        )
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub(crate) fn grant(&mut self, unit: UnitId) {
        self.core.units.insert(unit);
    }

    pub(crate) fn revoke(&mut self, unit: UnitId) -> bool {
        self.task.squad_mut().release(unit);
        self.core.units.remove(&unit)
    }

    pub(crate) fn take_units(&mut self) -> Vec<UnitId> {
        let units: Vec<UnitId> = std::mem::take(&mut self.core.units).into_iter().collect();
        let squad = self.task.squad_mut();
        for unit in &units {
            squad.release(*unit);
        }
        units
    }

    pub(crate) fn ramp_priority(&mut self, config: &ControllerConfig) {
        self.core.priority.ramp(config);
    }

    pub(crate) fn deliver_search(&mut self, result: SearchResult) {
        self.core.search_result = Some(result);
    }

    /// Run one decision tick of the task.
    ///
    /// Units that died or changed hands are dropped first. A locked mission
    /// left with no units and nothing to ask for disbands as
    /// [`DisbandReason::UnitsLost`].
    pub fn update(
        &mut self,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
    ) -> Result<MissionAction> {
        let lost: Vec<UnitId> = self
            .core
            .units
            .iter()
            .copied()
            .filter(|id| ctx.own_unit(*id).is_none())
            .collect();
        for unit in lost {
            debug!(mission = %self.core.name, unit = %unit, "Unit lost");
            self.revoke(unit);
        }

        let action = match &mut self.task {
            MissionTask::Attack(t) => t.update(&mut self.core, ctx, batcher)?,
            MissionTask::Naval(t) => t.update(&mut self.core, ctx, batcher)?,
            MissionTask::Scout(t) => t.update(&mut self.core, ctx, batcher)?,
            MissionTask::Retreat(t) => t.update(&mut self.core, ctx, batcher)?,
        };

        if action == MissionAction::Noop && self.core.locked && self.core.units.is_empty() {
            return Ok(MissionAction::Disband(Some(DisbandReason::UnitsLost)));
        }
        Ok(action)
    }
}

/// Split `size` units across `types` as evenly as possible, earlier types
/// taking the remainder.
#[must_use]
pub fn split_composition(types: &[UnitTypeId], size: u32) -> Vec<(UnitTypeId, u32)> {
    if types.is_empty() {
        return Vec::new();
    }
    let n = types.len() as u32;
    types
        .iter()
        .enumerate()
        .map(|(i, t)| (*t, size / n + u32::from((i as u32) < size % n)))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Nearest tile centre around `anchor` that `domain` can stand on.
#[must_use]
pub fn staging_point(ctx: &TickContext<'_>, anchor: Vec2, domain: MovementDomain) -> Option<Vec2> {
    let origin = Tile::containing(ctx.clamp(anchor));
    (0..=STAGING_SEARCH_RADIUS)
        .flat_map(|r| origin.ring(r))
        .find(|t| ctx.is_traversable(*t, domain))
        .map(Tile::center)
}

/// Ticks elapsed since `since`.
pub(crate) fn elapsed(tick: u64, since: u64) -> u64 {
    tick.saturating_sub(since)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ramp_saturates() {
        let config = ControllerConfig::default();
        let mut priority = Priority::new(90.0);
        priority.ramp(&config);
        assert!((priority.value() - 94.5).abs() < 1e-4);
        for _ in 0..10 {
            priority.ramp(&config);
        }
        assert_eq!(priority.value(), 100.0);
        assert_eq!(priority.base(), 90.0);
    }

    #[test]
    fn test_priority_above_ceiling_never_drops() {
        let config = ControllerConfig::default();
        let mut priority = Priority::new(150.0);
        priority.ramp(&config);
        assert_eq!(priority.value(), 150.0);
    }

    #[test]
    fn test_split_composition() {
        let types = [UnitTypeId(1), UnitTypeId(2), UnitTypeId(3)];
        assert_eq!(
            split_composition(&types, 10),
            vec![(UnitTypeId(1), 4), (UnitTypeId(2), 3), (UnitTypeId(3), 3)]
        );
        assert_eq!(split_composition(&types, 1), vec![(UnitTypeId(1), 1)]);
        assert!(split_composition(&[], 5).is_empty());
    }

    #[test]
    fn test_request_total() {
        let request = UnitRequest {
            types: vec![(UnitTypeId(1), 2), (UnitTypeId(2), 3)],
            priority: 1.0,
        };
        assert_eq!(request.total(), 5);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MissionKind::Naval.to_string(), "naval");
    }
}
