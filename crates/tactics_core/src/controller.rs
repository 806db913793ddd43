//! Mission controller and the allocation auction.
//!
//! One decision tick runs these steps in order:
//!
//! 1. every registered factory may spawn a mission
//! 2. every mission updates, in creation order; an error disbands it
//! 3. returned actions are handled: unit requests are queued for the
//!    auction, area searches are resolved and delivered for the next tick,
//!    sub-mission requests are routed to the factory of the requested kind
//! 4. the auction hands idle units to unit requests in descending priority,
//!    reclaiming from lower-priority unlocked missions when the pool runs dry
//! 5. starved requesters ramp their priority
//! 6. disbanded missions release their units and are removed; the factory
//!    of their kind is told and may spawn successors
//! 7. buffered orders are flushed to the host
//!
//! Missions see the auction's grants only on their next update.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batcher::ActionBatcher;
use crate::config::TacticsConfig;
use crate::factory::{MissionFactory, RemovedMission};
use crate::mission::{DisbandReason, Mission, MissionAction, SearchResult, UnitRequest};
use crate::targeting::best_candidate;
use crate::world::{OrderSink, TickContext, UnitId, UnitTypeId};

/// Decides which raw simulation ticks are decision ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionClock {
    divisor: u64,
}

impl DecisionClock {
    /// Clock with the divisor derived from the APM budget.
    #[must_use]
    pub fn new(config: &TacticsConfig) -> Self {
        Self {
            divisor: config.decision_divisor(),
        }
    }

    /// Raw ticks between two decision ticks.
    #[must_use]
    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    /// Whether the controller should run on `raw_tick`.
    #[must_use]
    pub fn is_decision_tick(&self, raw_tick: u64) -> bool {
        raw_tick % self.divisor == 0
    }
}

/// Outstanding demand for one unit type, for the production collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestTally {
    /// Units still wanted.
    pub count: u32,
    /// Sum of `count * priority` over requesters.
    pub weight: f32,
}

/// A mission removed during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalRecord {
    /// Mission name.
    pub name: String,
    /// Why it ended.
    pub reason: Option<DisbandReason>,
    /// Units released.
    pub released: usize,
}

/// What happened during one decision tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Decision tick.
    pub tick: u64,
    /// Missions added, successors included.
    pub spawned: Vec<String>,
    /// Missions removed.
    pub removed: Vec<RemovalRecord>,
    /// Units handed out from the idle pool.
    pub granted: usize,
    /// Units taken from lower-priority missions.
    pub reclaimed: usize,
    /// Missions whose update returned an error.
    pub faults: usize,
    /// Host order calls issued.
    pub orders: usize,
}

/// Owns the active missions and arbitrates units between them.
pub struct MissionController {
    missions: Vec<Mission>,
    factories: Vec<Box<dyn MissionFactory>>,
    batcher: ActionBatcher,
    pending: Vec<(String, UnitRequest)>,
    next_seq: u64,
}

impl Default for MissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionController {
    /// Controller without missions or factories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            missions: Vec::new(),
            factories: Vec::new(),
            batcher: ActionBatcher::new(),
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Register a factory. Sub-mission requests go to the first factory
    /// registered for the requested kind.
    pub fn register_factory(&mut self, factory: Box<dyn MissionFactory>) {
        self.factories.push(factory);
    }

    /// Add a mission. Returns `false` if the name is already taken.
    pub fn add_mission(&mut self, mut mission: Mission) -> bool {
        if self.missions.iter().any(|m| m.name() == mission.name()) {
            warn!(mission = %mission.name(), "Duplicate mission name rejected");
            return false;
        }
        mission.set_seq(self.next_seq);
        self.next_seq += 1;
        info!(mission = %mission.name(), kind = %mission.kind(), units = mission.units().len(), "Mission added");
        self.missions.push(mission);
        true
    }

    /// Live missions in creation order.
    #[must_use]
    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    /// Look up a mission by name.
    #[must_use]
    pub fn mission(&self, name: &str) -> Option<&Mission> {
        self.missions.iter().find(|m| m.name() == name)
    }

    /// Mission owning `unit`, if any.
    #[must_use]
    pub fn owner_of(&self, unit: UnitId) -> Option<&Mission> {
        self.missions.iter().find(|m| m.units().contains(&unit))
    }

    /// Demand left unsatisfied by the last auction, grouped by unit type.
    #[must_use]
    pub fn requested_unit_types(&self) -> BTreeMap<UnitTypeId, RequestTally> {
        let mut tally: BTreeMap<UnitTypeId, RequestTally> = BTreeMap::new();
        for (_, request) in &self.pending {
            for &(unit_type, count) in &request.types {
                let entry = tally.entry(unit_type).or_default();
                entry.count += count;
                entry.weight += count as f32 * request.priority;
            }
        }
        tally
    }

    /// Multi-line debug text, one line per mission.
    #[must_use]
    pub fn describe(&self) -> String {
        self.missions
            .iter()
            .map(Mission::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run one decision tick.
    pub fn on_ai_update(&mut self, ctx: &TickContext<'_>, sink: &mut dyn OrderSink) -> TickReport {
        let mut report = TickReport {
            tick: ctx.tick,
            ..TickReport::default()
        };

        self.run_factories(ctx, &mut report);

        let mut requests: Vec<(usize, UnitRequest)> = Vec::new();
        let mut disbanded: BTreeMap<usize, Option<DisbandReason>> = BTreeMap::new();
        let mut searches: Vec<(usize, SearchResult)> = Vec::new();
        let mut sub_requests = Vec::new();

        for (index, mission) in self.missions.iter_mut().enumerate() {
            let action = match mission.update(ctx, &mut self.batcher) {
                Ok(action) => action,
                Err(err) => {
                    warn!(mission = %mission.name(), tick = ctx.tick, error = %err, "Mission faulted, disbanding");
                    report.faults += 1;
                    MissionAction::Disband(Some(DisbandReason::Fault))
                }
            };
            match action {
                MissionAction::Noop => {}
                MissionAction::RequestUnits(request) => requests.push((index, request)),
                MissionAction::Disband(reason) => {
                    info!(mission = %mission.name(), tick = ctx.tick, reason = ?reason, "Mission disbanding");
                    disbanded.insert(index, reason);
                }
                MissionAction::RequestSubMission { kind, target } => {
                    debug!(mission = %mission.name(), kind = %kind, "Sub-mission requested");
                    sub_requests.push((kind, target));
                }
                MissionAction::SearchArea { center, radius } => {
                    let found = best_candidate(ctx, center, radius, center, |_| true);
                    searches.push((
                        index,
                        SearchResult {
                            center,
                            radius,
                            found,
                        },
                    ));
                }
            }
        }

        for (index, result) in searches {
            self.missions[index].deliver_search(result);
        }

        self.auction(ctx, requests, &disbanded, &mut report);
        self.remove_disbanded(ctx, &disbanded, &mut report);

        for (kind, target) in sub_requests {
            let Some(factory) = self.factories.iter_mut().find(|f| f.kind() == kind) else {
                debug!(kind = %kind, "No factory registered for sub-mission");
                continue;
            };
            match factory.spawn_requested(ctx, target, &self.missions) {
                Ok(Some(mission)) => {
                    let name = mission.name().to_string();
                    if self.add_mission(mission) {
                        report.spawned.push(name);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(kind = %kind, error = %err, "Sub-mission spawn failed"),
            }
        }

        #[cfg(feature = "debug-validation")]
        self.validate_ownership();

        report.orders = self.batcher.flush(sink);
        report
    }

    fn run_factories(&mut self, ctx: &TickContext<'_>, report: &mut TickReport) {
        let mut spawned = Vec::new();
        for factory in &mut self.factories {
            match factory.try_spawn(ctx, &self.missions) {
                Ok(Some(mission)) => spawned.push(mission),
                Ok(None) => {}
                Err(err) => warn!(kind = %factory.kind(), error = %err, "Mission spawn failed"),
            }
        }
        for mission in spawned {
            let name = mission.name().to_string();
            if self.add_mission(mission) {
                report.spawned.push(name);
            }
        }
    }

    /// Priority-ordered best-effort distribution of units.
    fn auction(
        &mut self,
        ctx: &TickContext<'_>,
        mut requests: Vec<(usize, UnitRequest)>,
        disbanded: &BTreeMap<usize, Option<DisbandReason>>,
        report: &mut TickReport,
    ) {
        requests.retain(|(index, _)| !disbanded.contains_key(index));
        requests.sort_by(|a, b| {
            b.1.priority
                .total_cmp(&a.1.priority)
                .then(self.missions[a.0].seq().cmp(&self.missions[b.0].seq()))
        });

        let owned: BTreeSet<UnitId> = self
            .missions
            .iter()
            .flat_map(|m| m.units().iter().copied())
            .collect();
        let mut idle: BTreeMap<UnitTypeId, Vec<UnitId>> = BTreeMap::new();
        let mut own_units = ctx.world.own_units();
        own_units.sort();
        for id in own_units {
            if owned.contains(&id) {
                continue;
            }
            if let Some(unit) = ctx.own_unit(id).filter(|u| !u.is_structure) {
                idle.entry(unit.unit_type).or_default().push(id);
            }
        }
        for units in idle.values_mut() {
            units.reverse();
        }

        self.pending.clear();
        for (index, request) in requests {
            let mut remaining = Vec::new();
            let mut starved = false;
            for &(unit_type, count) in &request.types {
                let mut missing = count;
                let pool = idle.entry(unit_type).or_default();
                while missing > 0 {
                    let Some(unit) = pool.pop() else { break };
                    self.missions[index].grant(unit);
                    report.granted += 1;
                    missing -= 1;
                }
                while missing > 0 {
                    let Some(unit) = self.reclaim(ctx, index, request.priority, unit_type, disbanded)
                    else {
                        break;
                    };
                    self.missions[index].grant(unit);
                    report.reclaimed += 1;
                    missing -= 1;
                }
                if missing > 0 {
                    starved = true;
                    remaining.push((unit_type, missing));
                }
            }
            if starved {
                self.missions[index].ramp_priority(&ctx.config.controller);
                self.pending.push((
                    self.missions[index].name().to_string(),
                    UnitRequest {
                        types: remaining,
                        priority: request.priority,
                    },
                ));
            }
        }
    }

    /// Take one unit of `unit_type` from the lowest-priority unlocked mission
    /// ranked strictly below `priority`.
    fn reclaim(
        &mut self,
        ctx: &TickContext<'_>,
        requester: usize,
        priority: f32,
        unit_type: UnitTypeId,
        disbanded: &BTreeMap<usize, Option<DisbandReason>>,
    ) -> Option<UnitId> {
        let (victim, unit) = self
            .missions
            .iter()
            .enumerate()
            .filter(|(i, m)| {
                *i != requester
                    && !disbanded.contains_key(i)
                    && !m.is_locked()
                    && m.priority() < priority
            })
            .filter_map(|(i, m)| {
                m.units()
                    .iter()
                    .rev()
                    .find(|id| ctx.own_unit(**id).is_some_and(|u| u.unit_type == unit_type))
                    .map(|id| (i, *id, m.priority(), m.seq()))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2).then(b.3.cmp(&a.3)))
            .map(|(i, id, _, _)| (i, id))?;
        self.missions[victim].revoke(unit);
        self.batcher.cancel(unit);
        debug!(
            unit = %unit,
            from = %self.missions[victim].name(),
            to = %self.missions[requester].name(),
            "Unit reclaimed"
        );
        Some(unit)
    }

    fn remove_disbanded(
        &mut self,
        ctx: &TickContext<'_>,
        disbanded: &BTreeMap<usize, Option<DisbandReason>>,
        report: &mut TickReport,
    ) {
        if disbanded.is_empty() {
            return;
        }
        let mut removed = Vec::new();
        for (index, mission) in std::mem::take(&mut self.missions).into_iter().enumerate() {
            match disbanded.get(&index) {
                Some(reason) => removed.push((mission, *reason)),
                None => self.missions.push(mission),
            }
        }

        for (mut mission, reason) in removed {
            let survivors: Vec<UnitId> = mission
                .take_units()
                .into_iter()
                .filter(|id| ctx.own_unit(*id).is_some())
                .collect();
            info!(
                mission = %mission.name(),
                tick = ctx.tick,
                reason = ?reason,
                released = survivors.len(),
                "Mission removed"
            );
            report.removed.push(RemovalRecord {
                name: mission.name().to_string(),
                reason,
                released: survivors.len(),
            });
            let record = RemovedMission {
                name: mission.name().to_string(),
                kind: mission.kind(),
                reason,
                survivors,
                priority: mission.priority(),
                tick: ctx.tick,
            };
            let successors = self
                .factories
                .iter_mut()
                .find(|f| f.kind() == record.kind)
                .map(|f| f.on_removed(ctx, &record))
                .unwrap_or_default();
            for successor in successors {
                let name = successor.name().to_string();
                if self.add_mission(successor) {
                    info!(mission = %name, from = %record.name, "Successor spawned");
                    report.spawned.push(name);
                }
            }
        }
    }

    /// Check that no unit is owned by two missions.
    #[cfg(feature = "debug-validation")]
    fn validate_ownership(&self) {
        let mut seen = BTreeSet::new();
        for mission in &self.missions {
            for unit in mission.units() {
                if !seen.insert(*unit) {
                    tracing::error!(unit = %unit, mission = %mission.name(), "Unit owned by two missions");
                }
            }
        }
    }
}
