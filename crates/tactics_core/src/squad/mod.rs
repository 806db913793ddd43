//! Squad: the tactical controller embedded in a mission.
//!
//! A squad turns an assigned unit set and a target point into individual
//! orders. The state machine is small:
//!
//! ```text
//! Gathering --(spread <= gather radius)--> Attacking
//! Attacking --(spread >  scatter radius)--> Gathering
//! any       --(retreat_to)---------------> Retreating
//! Exploring: units move independently, no gathering
//! ```
//!
//! Orders go out only on command ticks (every `command_interval` ticks) and
//! only when they differ from the unit's previous order. Stuck units get an
//! escalating recovery move that is held for one sampling interval.

pub mod formation;
pub mod micro;
pub mod recovery;
pub mod track;

use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batcher::ActionBatcher;
use crate::math::{centroid, direction, max_distance};
use crate::world::{Order, TickContext, UnitId, UnitSnapshot};

pub use formation::{formation_offset, formation_radius, gather_radius, scatter_radius};
pub use track::UnitTrack;

/// Golden angle in radians, spreads successive search directions evenly.
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Squad behaviour state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SquadState {
    /// Converging on the centroid.
    #[default]
    Gathering,
    /// Advancing on the target and fighting.
    Attacking,
    /// Returning to the rally point, ignoring enemies.
    Retreating,
    /// Units move independently to the target.
    Exploring,
}

/// Summary of one squad update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SquadReport {
    /// State after the update.
    pub state: SquadState,
    /// Living members.
    pub alive: usize,
    /// Mean member position.
    pub centroid: Option<Vec2>,
    /// Distance from the centroid to the farthest member.
    pub spread: f32,
    /// Centroid is within the arrival radius of the current anchor.
    pub arrived: bool,
    /// Some member engaged within the recency window.
    pub engaged: bool,
    /// Most recent engagement of any member.
    pub last_engagement: Option<u64>,
    /// Orders handed to the batcher.
    pub orders: usize,
}

/// Tactical controller for one mission's units.
#[derive(Debug, Clone)]
pub struct Squad {
    state: SquadState,
    target: Vec2,
    rally: Vec2,
    last_command_tick: Option<u64>,
    last_orders: HashMap<UnitId, Order>,
    tracks: BTreeMap<UnitId, UnitTrack>,
}

impl Squad {
    /// New squad heading for `target` in the given state.
    #[must_use]
    pub fn new(target: Vec2, state: SquadState) -> Self {
        Self {
            state,
            target,
            rally: target,
            last_command_tick: None,
            last_orders: HashMap::new(),
            tracks: BTreeMap::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SquadState {
        self.state
    }

    /// Force a state, e.g. a re-gather requested by the mission.
    pub fn set_state(&mut self, state: SquadState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Squad state forced");
            self.state = state;
        }
    }

    /// Current target point.
    #[must_use]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Point the squad is currently converging on.
    #[must_use]
    pub fn anchor(&self) -> Vec2 {
        match self.state {
            SquadState::Retreating => self.rally,
            _ => self.target,
        }
    }

    /// Change the target point.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    /// Withdraw everyone to `rally`.
    pub fn retreat_to(&mut self, rally: Vec2) {
        self.rally = rally;
        self.state = SquadState::Retreating;
    }

    /// Forget everything about a unit that left the squad.
    pub fn release(&mut self, unit: UnitId) {
        self.tracks.remove(&unit);
        self.last_orders.remove(&unit);
    }

    /// Drop the last-order cache so the next command tick re-issues every
    /// unit's order even if it has not changed.
    pub fn forget_orders(&mut self) {
        self.last_orders.clear();
    }

    /// Number of units with transient state.
    #[must_use]
    pub fn tracked_units(&self) -> usize {
        self.tracks.len()
    }

    /// Per-unit transient state.
    #[must_use]
    pub fn track(&self, unit: UnitId) -> Option<&UnitTrack> {
        self.tracks.get(&unit)
    }

    /// Last order emitted for a unit.
    #[must_use]
    pub fn last_order(&self, unit: UnitId) -> Option<Order> {
        self.last_orders.get(&unit).copied()
    }

    /// Advance the squad one decision tick.
    pub fn update(
        &mut self,
        ctx: &TickContext<'_>,
        units: &[UnitId],
        batcher: &mut ActionBatcher,
    ) -> SquadReport {
        let config = &ctx.config.squad;
        let mut members: Vec<UnitSnapshot> =
            units.iter().filter_map(|id| ctx.own_unit(*id)).collect();
        members.sort_by_key(|u| u.id);

        self.tracks
            .retain(|id, _| members.binary_search_by_key(id, |u| u.id).is_ok());
        self.last_orders
            .retain(|id, _| members.binary_search_by_key(id, |u| u.id).is_ok());

        let positions: Vec<Vec2> = members.iter().map(|u| u.position).collect();
        let Some(center) = centroid(&positions) else {
            return SquadReport {
                state: self.state,
                ..SquadReport::default()
            };
        };
        let spread = max_distance(center, &positions);
        let n = members.len();

        for unit in &members {
            self.tracks
                .entry(unit.id)
                .or_insert_with(|| UnitTrack::new(ctx.tick))
                .sample(unit.position, ctx.tick, config);
        }

        match self.state {
            SquadState::Gathering if spread <= gather_radius(n, config) => {
                debug!(tick = ctx.tick, spread, units = n, "Squad gathered, advancing");
                self.state = SquadState::Attacking;
            }
            SquadState::Attacking if spread > scatter_radius(n, config) => {
                debug!(tick = ctx.tick, spread, units = n, "Squad scattered, re-gathering");
                self.state = SquadState::Gathering;
            }
            _ => {}
        }

        let arrived = center.distance(self.anchor()) <= config.arrival_radius;
        let mut report = SquadReport {
            state: self.state,
            alive: n,
            centroid: Some(center),
            spread,
            arrived,
            ..SquadReport::default()
        };

        let command_tick = self
            .last_command_tick
            .map_or(true, |t| ctx.tick.saturating_sub(t) >= config.command_interval);
        if command_tick {
            self.last_command_tick = Some(ctx.tick);
            let engaged_allies: Vec<(UnitId, Vec2)> = members
                .iter()
                .filter(|u| {
                    self.tracks.get(&u.id).is_some_and(|t| {
                        t.engaged_recently(ctx.tick, config.engagement_recency)
                    })
                })
                .map(|u| (u.id, u.position))
                .collect();

            for (index, unit) in members.iter().enumerate() {
                let Some(order) =
                    self.order_for(ctx, unit, index, n, center, arrived, &engaged_allies)
                else {
                    continue;
                };
                if self.emit(unit.id, order, batcher) {
                    report.orders += 1;
                }
            }
        }

        report.last_engagement = self.tracks.values().filter_map(|t| t.last_engaged).max();
        report.engaged = self
            .tracks
            .values()
            .any(|t| t.engaged_recently(ctx.tick, config.engagement_recency));
        report
    }

    fn order_for(
        &mut self,
        ctx: &TickContext<'_>,
        unit: &UnitSnapshot,
        index: usize,
        n: usize,
        center: Vec2,
        arrived: bool,
        engaged_allies: &[(UnitId, Vec2)],
    ) -> Option<Order> {
        let config = &ctx.config.squad;
        let tick = ctx.tick;
        let offset = formation_offset(index, n);
        let previous = self.last_orders.get(&unit.id).copied();
        let state = self.state;
        let target = self.target;
        let rally = self.rally;
        let track = self.tracks.get_mut(&unit.id)?;

        if track.recovering_until > tick {
            return None;
        }

        let order = match state {
            SquadState::Gathering => Order::Move(ctx.clamp(center + offset)),
            SquadState::Exploring => Order::Move(ctx.clamp(target + offset)),
            SquadState::Retreating => {
                if unit.has_special && !track.toggled {
                    track.toggled = true;
                    return Some(Order::Toggle(true));
                }
                Order::Move(ctx.clamp(rally + offset))
            }
            SquadState::Attacking => {
                let hostiles = ctx.hostile_snapshots(unit.position, config.scan_radius);
                if let Some(victim) = micro::pick_target(unit, &hostiles, config) {
                    track.last_engaged = Some(tick);
                    return Some(Order::Attack(victim));
                }
                let nearest_ally = engaged_allies
                    .iter()
                    .filter(|(id, _)| *id != unit.id)
                    .min_by(|a, b| {
                        a.1.distance(unit.position)
                            .total_cmp(&b.1.distance(unit.position))
                    });
                if let Some((_, ally)) = nearest_ally {
                    Order::AttackMove(*ally)
                } else if arrived
                    && tick.saturating_sub(track.last_active()) > config.idle_timeout
                {
                    // Pick a new direction every idle period.
                    let round = tick.saturating_sub(track.last_active()) / config.idle_timeout.max(1);
                    let angle = GOLDEN_ANGLE * (unit.id.0 + round) as f32;
                    Order::AttackMove(ctx.clamp(target + direction(angle) * config.search_radius))
                } else {
                    Order::AttackMove(ctx.clamp(target + offset))
                }
            }
        };

        // Stuck units get an escape move instead of their regular order.
        if track.is_moving(config) {
            track.stuck_attempts = 0;
        }
        let destination = previous
            .and_then(|o| o.destination())
            .or_else(|| order.destination());
        if let Some(destination) = destination {
            let far = unit.position.distance(destination) > config.arrival_radius;
            if far && track.is_stationary(config) {
                track.clear_samples();
                track.stuck_attempts += 1;
                if track.stuck_attempts > config.stuck_max_attempts {
                    debug!(unit = %unit.id, "Giving up stuck recovery");
                    track.stuck_attempts = 0;
                } else if let Some(escape) =
                    recovery::recovery_point(ctx, unit, destination, track.stuck_attempts)
                {
                    debug!(
                        unit = %unit.id,
                        attempt = track.stuck_attempts,
                        x = escape.x,
                        y = escape.y,
                        "Stuck recovery"
                    );
                    track.recovering_until = tick + config.stuck_sample_interval;
                    return Some(Order::Move(escape));
                }
            }
        }
        Some(order)
    }

    fn emit(&mut self, unit: UnitId, order: Order, batcher: &mut ActionBatcher) -> bool {
        if self.last_orders.get(&unit) == Some(&order) {
            return false;
        }
        self.last_orders.insert(unit, order);
        batcher.push(unit, order);
        true
    }
}
