//! Sandbox world driving the decision layer.
//!
//! Just enough of a game to exercise missions end to end:
//!
//! - Straight-line movement at a fixed speed, sliding along impassable tiles
//! - Weapon-range combat with per-tick damage, resolved simultaneously
//! - Exploration around own units; hostiles are known once their tile is seen
//! - A production stub that builds whatever the controller asks for most
//!
//! There is no pathfinding and no perception beyond explored tiles. The
//! sandbox implements [`WorldView`] and [`Awareness`]; orders are collected in
//! an [`OrderBuffer`] and applied between ticks.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tactics_core::config::TacticsConfig;
use tactics_core::controller::RequestTally;
use tactics_core::math::{step_towards, MapBounds, Tile};
use tactics_core::world::{
    Awareness, HostileContact, MovementDomain, Order, OrderSink, PlayerId, Terrain, TickContext,
    UnitCatalog, UnitId, UnitSnapshot, UnitTypeId, WorldView,
};
use tracing::{debug, trace};

use crate::metrics::Outcome;
use crate::scenario::{PlayerSetup, Scenario, ScenarioError, UnitTypeSetup};

/// Ticks an own structure stays in the attacked list after a hit.
const ATTACK_MEMORY: u64 = 30;
/// Exploration is refreshed every this many ticks.
const EXPLORE_INTERVAL: u64 = 5;
/// Rings searched for a spawn tile the unit can stand on.
const SPAWN_SEARCH_RADIUS: i32 = 24;
/// Tile stride of the scouting-target grid.
const SCOUT_GRID: i32 = 8;
/// Positional orders complete within this distance.
const ARRIVAL_EPSILON: f32 = 0.1;

/// One entity in the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxUnit {
    /// What the decision layer sees.
    pub snapshot: UnitSnapshot,
    /// Remaining hit points.
    pub hit_points: f32,
    /// Hit points at full health.
    pub max_hit_points: f32,
    /// Damage per tick.
    pub damage: f32,
    /// Tiles per tick.
    pub speed: f32,
    /// Exploration radius.
    pub sight: f32,
    /// Current standing order.
    pub order: Option<Order>,
    /// Special ability switched on.
    pub special_active: bool,
    last_damaged: Option<u64>,
}

/// Something that happened during a sandbox step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxEvent {
    /// One of ours died.
    Lost {
        /// Dead unit.
        unit: UnitId,
        /// Its type.
        unit_type: UnitTypeId,
    },
    /// A hostile died.
    Killed {
        /// Dead unit.
        unit: UnitId,
        /// Its type.
        unit_type: UnitTypeId,
    },
}

/// Order sink that buffers calls until the sandbox applies them.
#[derive(Debug, Clone, Default)]
pub struct OrderBuffer {
    calls: Vec<(Vec<UnitId>, Order)>,
}

impl OrderBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls buffered so far.
    #[must_use]
    pub fn calls(&self) -> &[(Vec<UnitId>, Order)] {
        &self.calls
    }

    /// Take every buffered call, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<(Vec<UnitId>, Order)> {
        std::mem::take(&mut self.calls)
    }
}

impl OrderSink for OrderBuffer {
    fn issue(&mut self, units: &[UnitId], order: Order) {
        self.calls.push((units.to_vec(), order));
    }
}

/// The sandbox world.
#[derive(Debug, Clone)]
pub struct Sandbox {
    player: PlayerId,
    allies: BTreeSet<PlayerId>,
    assaults: BTreeMap<PlayerId, u64>,
    bounds: MapBounds,
    terrain: Vec<Terrain>,
    explored: Vec<bool>,
    explored_count: u64,
    reveal: bool,
    units: BTreeMap<UnitId, SandboxUnit>,
    types: BTreeMap<UnitTypeId, UnitTypeSetup>,
    rally: Vec2,
    production_interval: u64,
    income: u32,
    resources: u32,
    next_id: u64,
    tick: u64,
    rng: ChaCha8Rng,
}

impl Sandbox {
    /// Build the starting state of a scenario.
    ///
    /// The seed only affects where grouped units are scattered around their
    /// placement point.
    pub fn from_scenario(scenario: &Scenario, seed: u64) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let bounds = MapBounds::new(scenario.map_size.0, scenario.map_size.1);
        let area = bounds.area() as usize;

        let mut terrain = vec![Terrain::Land; area];
        for (areas, kind) in [
            (&scenario.water, Terrain::Water),
            (&scenario.blocked, Terrain::Blocked),
        ] {
            for rect in areas {
                for (x, y) in rect.tiles() {
                    if let Some(i) = tile_index(bounds, Tile::new(x, y)) {
                        terrain[i] = kind;
                    }
                }
            }
        }

        let player = PlayerId(scenario.player.player);
        let mut allies = BTreeSet::from([player]);
        let mut assaults = BTreeMap::new();
        for opponent in &scenario.opponents {
            let id = PlayerId(opponent.player);
            if opponent.allied {
                allies.insert(id);
            }
            if let Some(at) = opponent.attack_at {
                assaults.insert(id, at);
            }
        }

        let mut sandbox = Self {
            player,
            allies,
            assaults,
            bounds,
            terrain,
            explored: vec![false; area],
            explored_count: 0,
            reveal: scenario.reveal_map,
            units: BTreeMap::new(),
            types: scenario
                .unit_types
                .iter()
                .map(|t| (t.type_id(), t.clone()))
                .collect(),
            rally: Vec2::new(scenario.player.rally.0, scenario.player.rally.1),
            production_interval: scenario.production.interval_ticks,
            income: scenario.production.income,
            resources: scenario.production.starting_resources,
            next_id: 1,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        for setup in std::iter::once(&scenario.player).chain(&scenario.opponents) {
            sandbox.place(scenario, setup)?;
        }
        sandbox.explore();
        debug!(
            units = sandbox.units.len(),
            explored = sandbox.explored_count,
            "Sandbox ready"
        );
        Ok(sandbox)
    }

    fn place(&mut self, scenario: &Scenario, setup: &PlayerSetup) -> Result<(), ScenarioError> {
        let owner = PlayerId(setup.player);
        for placement in &setup.units {
            let unit_type = scenario.unit_type(&placement.kind).cloned().ok_or_else(|| {
                ScenarioError::Invalid(format!("unknown unit type '{}'", placement.kind))
            })?;
            let anchor = Vec2::new(placement.position.0, placement.position.1);
            for _ in 0..placement.count {
                let mut position = anchor;
                if placement.count > 1 {
                    let jitter = Vec2::new(
                        self.rng.gen_range(-1.0f32..=1.0),
                        self.rng.gen_range(-1.0f32..=1.0),
                    );
                    position = self.bounds.clamp(anchor + jitter);
                }
                if !unit_type.structure && !self.passable(position, unit_type.domain) {
                    position = self
                        .spawn_point(anchor, unit_type.domain)
                        .unwrap_or(anchor);
                }
                self.spawn(owner, &unit_type, position);
            }
        }
        Ok(())
    }

    fn spawn(&mut self, owner: PlayerId, setup: &UnitTypeSetup, position: Vec2) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        let snapshot = UnitSnapshot {
            id,
            unit_type: setup.type_id(),
            owner,
            position,
            weapon_range: if setup.damage > 0.0 {
                setup.weapon_range
            } else {
                0.0
            },
            health: 1.0,
            domain: setup.domain,
            is_structure: setup.structure,
            is_high_value: setup.high_value,
            has_special: setup.special,
        };
        self.units.insert(
            id,
            SandboxUnit {
                snapshot,
                hit_points: setup.hit_points,
                max_hit_points: setup.hit_points,
                damage: setup.damage,
                speed: if setup.structure { 0.0 } else { setup.speed },
                sight: setup.sight,
                order: None,
                special_active: false,
                last_damaged: None,
            },
        );
        id
    }

    /// Current raw tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Resources available to the production stub.
    #[must_use]
    pub fn resources(&self) -> u32 {
        self.resources
    }

    /// Every entity, by id.
    pub fn units(&self) -> impl Iterator<Item = &SandboxUnit> {
        self.units.values()
    }

    /// One entity.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&SandboxUnit> {
        self.units.get(&id)
    }

    /// Name of a unit type.
    #[must_use]
    pub fn type_name(&self, unit_type: UnitTypeId) -> &str {
        self.types
            .get(&unit_type)
            .map_or("unknown", |t| t.name.as_str())
    }

    /// Build a tick context over this world for the current tick.
    #[must_use]
    pub fn context<'a>(
        &'a self,
        catalog: &'a UnitCatalog,
        config: &'a TacticsConfig,
    ) -> TickContext<'a> {
        TickContext {
            tick: self.tick,
            world: self,
            awareness: self,
            catalog,
            config,
        }
    }

    /// Apply buffered orders. Orders for units we do not own are dropped.
    ///
    /// Returns the number of units that received an order.
    pub fn apply_orders(&mut self, calls: Vec<(Vec<UnitId>, Order)>) -> usize {
        let mut applied = 0;
        for (ids, order) in calls {
            for id in ids {
                let Some(unit) = self.units.get_mut(&id) else {
                    continue;
                };
                if unit.snapshot.owner != self.player {
                    continue;
                }
                match order {
                    Order::Toggle(on) => unit.special_active = on,
                    other => unit.order = Some(other),
                }
                applied += 1;
            }
        }
        applied
    }

    /// Whether this tick is a production round.
    #[must_use]
    pub fn production_due(&self) -> bool {
        self.tick % self.production_interval == 0
    }

    /// Run one production round: collect income and build the most wanted
    /// affordable type, if any.
    ///
    /// The heaviest request is saved up for rather than skipped.
    pub fn produce(&mut self, requests: &BTreeMap<UnitTypeId, RequestTally>) -> Option<UnitId> {
        self.resources = self.resources.saturating_add(self.income);
        let (unit_type, _) = requests
            .iter()
            .filter(|(id, tally)| {
                tally.count > 0
                    && self
                        .types
                        .get(*id)
                        .is_some_and(|t| t.producible && !t.structure)
            })
            .max_by(|a, b| a.1.weight.total_cmp(&b.1.weight).then(b.0.cmp(a.0)))?;
        let setup = self.types.get(unit_type).cloned()?;
        if setup.cost > self.resources {
            trace!(unit = %setup.name, resources = self.resources, "Saving up");
            return None;
        }
        let position = self.spawn_point(self.rally, setup.domain)?;
        self.resources -= setup.cost;
        let id = self.spawn(self.player, &setup, position);
        debug!(tick = self.tick, unit = %setup.name, %id, "Produced");
        Some(id)
    }

    /// Advance one raw tick: combat, movement, exploration.
    pub fn step(&mut self) -> Vec<SandboxEvent> {
        let mut events = Vec::new();
        self.combat(&mut events);
        self.movement();
        self.tick += 1;
        if self.tick % EXPLORE_INTERVAL == 0 {
            self.explore();
        }
        events
    }

    /// Outcome once one side has nothing left.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        let mut own = false;
        let mut hostile = false;
        for unit in self.units.values() {
            if unit.snapshot.owner == self.player {
                own = true;
            } else if !self.is_ally(self.player, unit.snapshot.owner) {
                hostile = true;
            }
        }
        if !own {
            Some(Outcome::Defeat)
        } else if !hostile {
            Some(Outcome::Victory)
        } else {
            None
        }
    }

    fn combat(&mut self, events: &mut Vec<SandboxEvent>) {
        let mut hits: BTreeMap<UnitId, f32> = BTreeMap::new();
        for unit in self.units.values() {
            if let Some(target) = self.firing_target(unit) {
                *hits.entry(target).or_default() += unit.damage;
            }
        }

        for (id, damage) in hits {
            if let Some(target) = self.units.get_mut(&id) {
                target.hit_points -= damage;
                target.snapshot.health = (target.hit_points / target.max_hit_points).clamp(0.0, 1.0);
                target.last_damaged = Some(self.tick);
            }
        }

        let dead: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.hit_points <= 0.0)
            .map(|u| u.snapshot.id)
            .collect();
        for id in dead {
            let Some(unit) = self.units.remove(&id) else {
                continue;
            };
            let unit_type = unit.snapshot.unit_type;
            if unit.snapshot.owner == self.player {
                events.push(SandboxEvent::Lost { unit: id, unit_type });
            } else if !self.is_ally(self.player, unit.snapshot.owner) {
                events.push(SandboxEvent::Killed { unit: id, unit_type });
            }
            trace!(tick = self.tick, %id, "Destroyed");
        }
    }

    /// Explicit attack target when in range, else the nearest hostile in
    /// range. Units on a plain move hold fire.
    fn firing_target(&self, unit: &SandboxUnit) -> Option<UnitId> {
        if unit.damage <= 0.0 || unit.snapshot.weapon_range <= 0.0 {
            return None;
        }
        match unit.order {
            Some(Order::Move(_)) => return None,
            Some(Order::Attack(target)) => {
                if let Some(t) = self.units.get(&target) {
                    let in_range = t.snapshot.position.distance(unit.snapshot.position)
                        <= unit.snapshot.weapon_range;
                    if in_range && self.hostile(unit, t) {
                        return Some(target);
                    }
                }
            }
            _ => {}
        }
        self.nearest_hostile_in_range(unit)
    }

    fn nearest_hostile_in_range(&self, unit: &SandboxUnit) -> Option<UnitId> {
        let origin = unit.snapshot.position;
        self.units
            .values()
            .filter(|other| self.hostile(unit, other))
            .map(|other| (other.snapshot.id, other.snapshot.position.distance(origin)))
            .filter(|(_, d)| *d <= unit.snapshot.weapon_range)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    fn hostile(&self, a: &SandboxUnit, b: &SandboxUnit) -> bool {
        !self.is_ally(a.snapshot.owner, b.snapshot.owner)
    }

    fn movement(&mut self) {
        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in ids {
            let Some(destination) = self.destination(id) else {
                continue;
            };
            let Some(unit) = self.units.get(&id) else {
                continue;
            };
            let from = unit.snapshot.position;
            let next = self.advance(from, destination, unit.speed, unit.snapshot.domain);
            let arrived = next.distance(destination) < ARRIVAL_EPSILON;
            if let Some(unit) = self.units.get_mut(&id) {
                unit.snapshot.position = next;
                if arrived && matches!(unit.order, Some(Order::Move(_) | Order::AttackMove(_))) {
                    unit.order = None;
                }
            }
        }
    }

    fn destination(&self, id: UnitId) -> Option<Vec2> {
        let unit = self.units.get(&id)?;
        if unit.snapshot.is_structure || unit.speed <= 0.0 {
            return None;
        }
        let position = unit.snapshot.position;
        match unit.order {
            Some(Order::Move(p)) => Some(p),
            Some(Order::AttackMove(p)) => self.nearest_hostile_in_range(unit).is_none().then_some(p),
            Some(Order::Attack(target)) => {
                let t = self.units.get(&target)?;
                let distance = t.snapshot.position.distance(position);
                (distance > unit.snapshot.weapon_range).then_some(t.snapshot.position)
            }
            Some(Order::Toggle(_)) | None => {
                let at = self.assaults.get(&unit.snapshot.owner)?;
                let charging = self.tick >= *at && self.nearest_hostile_in_range(unit).is_none();
                charging.then_some(self.rally)
            }
        }
    }

    /// One step toward `to`, sliding along an axis when the direct step is
    /// blocked.
    fn advance(&self, from: Vec2, to: Vec2, speed: f32, domain: MovementDomain) -> Vec2 {
        let next = step_towards(from, to, speed.min(from.distance(to)));
        [next, Vec2::new(next.x, from.y), Vec2::new(from.x, next.y)]
            .into_iter()
            .find(|p| self.passable(*p, domain))
            .unwrap_or(from)
    }

    fn passable(&self, point: Vec2, domain: MovementDomain) -> bool {
        let tile = Tile::containing(point);
        self.bounds.contains(tile) && domain.can_traverse(self.tile_terrain(tile))
    }

    fn tile_terrain(&self, tile: Tile) -> Terrain {
        tile_index(self.bounds, tile).map_or(Terrain::Blocked, |i| self.terrain[i])
    }

    /// Nearest tile centre to `anchor` that `domain` can stand on.
    fn spawn_point(&self, anchor: Vec2, domain: MovementDomain) -> Option<Vec2> {
        let origin = Tile::containing(self.bounds.clamp(anchor));
        (0..=SPAWN_SEARCH_RADIUS)
            .flat_map(|r| origin.ring(r))
            .find(|t| self.bounds.contains(*t) && domain.can_traverse(self.tile_terrain(*t)))
            .map(Tile::center)
    }

    fn explore(&mut self) {
        let mut seen = Vec::new();
        for unit in self.units.values() {
            if unit.snapshot.owner != self.player {
                continue;
            }
            let center = Tile::containing(unit.snapshot.position);
            let r = unit.sight.ceil() as i32;
            let reach = unit.sight * unit.sight;
            for dy in -r..=r {
                for dx in -r..=r {
                    if (dx * dx + dy * dy) as f32 > reach {
                        continue;
                    }
                    let tile = Tile::new(center.x + dx, center.y + dy);
                    if let Some(i) = tile_index(self.bounds, tile) {
                        seen.push(i);
                    }
                }
            }
        }
        for i in seen {
            if !self.explored[i] {
                self.explored[i] = true;
                self.explored_count += 1;
            }
        }
    }
}

fn tile_index(bounds: MapBounds, tile: Tile) -> Option<usize> {
    bounds
        .contains(tile)
        .then(|| tile.y as usize * bounds.width as usize + tile.x as usize)
}

impl WorldView for Sandbox {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn players(&self) -> Vec<PlayerId> {
        let mut players: BTreeSet<PlayerId> =
            self.units.values().map(|u| u.snapshot.owner).collect();
        players.insert(self.player);
        players.into_iter().collect()
    }

    fn is_ally(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b || (self.allies.contains(&a) && self.allies.contains(&b))
    }

    fn own_units(&self) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.snapshot.owner == self.player)
            .map(|u| u.snapshot.id)
            .collect()
    }

    fn unit(&self, id: UnitId) -> Option<UnitSnapshot> {
        self.units.get(&id).map(|u| u.snapshot)
    }

    fn terrain(&self, tile: Tile) -> Terrain {
        self.tile_terrain(tile)
    }

    fn bounds(&self) -> MapBounds {
        self.bounds
    }
}

impl Awareness for Sandbox {
    fn hostiles_near(&self, point: Vec2, radius: f32) -> Vec<HostileContact> {
        let mut contacts: Vec<HostileContact> = self
            .units
            .values()
            .filter(|u| !self.is_ally(self.player, u.snapshot.owner))
            .filter(|u| self.reveal || self.is_explored(Tile::containing(u.snapshot.position)))
            .map(|u| HostileContact {
                id: u.snapshot.id,
                distance: u.snapshot.position.distance(point),
            })
            .filter(|c| c.distance <= radius)
            .collect();
        contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        contacts
    }

    fn rally_point(&self) -> Vec2 {
        self.rally
    }

    /// Nearest unexplored grid point to the rally point.
    fn scouting_target(&self) -> Option<Vec2> {
        let half = SCOUT_GRID / 2;
        let width = self.bounds.width as i32;
        let height = self.bounds.height as i32;
        (0..height)
            .step_by(SCOUT_GRID as usize)
            .flat_map(|y| {
                (0..width)
                    .step_by(SCOUT_GRID as usize)
                    .map(move |x| Tile::new((x + half).min(width - 1), (y + half).min(height - 1)))
            })
            .filter(|t| !self.is_explored(*t))
            .map(Tile::center)
            .min_by(|a, b| {
                a.distance(self.rally)
                    .total_cmp(&b.distance(self.rally))
                    .then(a.x.total_cmp(&b.x))
                    .then(a.y.total_cmp(&b.y))
            })
    }

    fn attacked_structures(&self) -> Vec<Vec2> {
        let since = self.tick.saturating_sub(ATTACK_MEMORY);
        self.units
            .values()
            .filter(|u| u.snapshot.owner == self.player && u.snapshot.is_structure)
            .filter(|u| u.last_damaged.is_some_and(|t| t >= since))
            .map(|u| u.snapshot.position)
            .collect()
    }

    fn explored_fraction(&self) -> f32 {
        self.explored_count as f32 / self.bounds.area().max(1) as f32
    }

    fn is_explored(&self, tile: Tile) -> bool {
        tile_index(self.bounds, tile).is_some_and(|i| self.explored[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{standard_unit_types, Area, ProductionSetup, UnitPlacement};

    const RIFLE: UnitTypeId = UnitTypeId(1);
    const BIKE: UnitTypeId = UnitTypeId(3);
    const GUNBOAT: UnitTypeId = UnitTypeId(4);

    fn duel(own: Vec<UnitPlacement>, hostile: Vec<UnitPlacement>) -> Scenario {
        Scenario {
            name: "duel".to_string(),
            description: String::new(),
            map_size: (16, 16),
            water: Vec::new(),
            blocked: Vec::new(),
            unit_types: standard_unit_types(),
            player: PlayerSetup {
                player: 1,
                rally: (2.0, 2.0),
                units: own,
                attack_at: None,
                allied: false,
            },
            opponents: vec![PlayerSetup {
                player: 2,
                rally: (14.0, 14.0),
                units: hostile,
                attack_at: None,
                allied: false,
            }],
            production: ProductionSetup::default(),
            reveal_map: true,
            max_ticks: 1000,
        }
    }

    fn only_own(sandbox: &Sandbox) -> UnitId {
        sandbox.own_units()[0]
    }

    #[test]
    fn test_spawns_every_placement() {
        let sandbox = Sandbox::from_scenario(&Scenario::skirmish(), 7).unwrap();
        assert_eq!(sandbox.own_units().len(), 11);
        let hostiles = sandbox
            .units()
            .filter(|u| u.snapshot.owner == PlayerId(2))
            .count();
        assert_eq!(hostiles, 8);
        assert!(sandbox.units().all(|u| sandbox
            .bounds()
            .contains(Tile::containing(u.snapshot.position))));
    }

    #[test]
    fn test_same_seed_same_layout() {
        let a = Sandbox::from_scenario(&Scenario::skirmish(), 3).unwrap();
        let b = Sandbox::from_scenario(&Scenario::skirmish(), 3).unwrap();
        let pa: Vec<Vec2> = a.units().map(|u| u.snapshot.position).collect();
        let pb: Vec<Vec2> = b.units().map(|u| u.snapshot.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_move_order_reaches_destination() {
        let scenario = duel(vec![UnitPlacement::new("rifle", 2.5, 2.5, 1)], Vec::new());
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let rifle = only_own(&sandbox);
        let destination = Vec2::new(6.5, 2.5);
        sandbox.apply_orders(vec![(vec![rifle], Order::Move(destination))]);
        for _ in 0..80 {
            sandbox.step();
        }
        let unit = sandbox.get(rifle).unwrap();
        assert!(unit.snapshot.position.distance(destination) < ARRIVAL_EPSILON);
        assert_eq!(unit.order, None);
    }

    #[test]
    fn test_land_unit_stopped_by_water() {
        let mut scenario = duel(vec![UnitPlacement::new("rifle", 2.5, 8.5, 1)], Vec::new());
        scenario.water.push(Area::new((5, 0), (5, 15)));
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let rifle = only_own(&sandbox);
        sandbox.apply_orders(vec![(vec![rifle], Order::Move(Vec2::new(10.5, 8.5)))]);
        for _ in 0..200 {
            sandbox.step();
        }
        assert!(sandbox.get(rifle).unwrap().snapshot.position.x < 5.0);
    }

    #[test]
    fn test_combat_kills_and_reports() {
        let scenario = duel(
            vec![UnitPlacement::new("tank", 4.5, 4.5, 1)],
            vec![UnitPlacement::new("rifle", 7.5, 4.5, 1)],
        );
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(sandbox.step());
            if sandbox.outcome().is_some() {
                break;
            }
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, SandboxEvent::Killed { unit_type, .. } if *unit_type == RIFLE)));
        assert_eq!(sandbox.outcome(), Some(Outcome::Victory));
        let tank = sandbox.get(only_own(&sandbox)).unwrap();
        assert!(tank.snapshot.health < 1.0);
    }

    #[test]
    fn test_move_order_holds_fire() {
        let scenario = duel(
            vec![UnitPlacement::new("tank", 4.5, 4.5, 1)],
            vec![UnitPlacement::new("depot", 7.5, 4.5, 1)],
        );
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let tank = only_own(&sandbox);
        sandbox.apply_orders(vec![(vec![tank], Order::Move(Vec2::new(4.5, 12.5)))]);
        sandbox.step();
        let depot = sandbox
            .units()
            .find(|u| u.snapshot.is_structure)
            .unwrap();
        assert_eq!(depot.snapshot.health, 1.0);
    }

    #[test]
    fn test_orders_for_foreign_units_ignored() {
        let scenario = duel(
            vec![UnitPlacement::new("rifle", 2.5, 2.5, 1)],
            vec![UnitPlacement::new("rifle", 12.5, 12.5, 1)],
        );
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let foreign = sandbox
            .units()
            .find(|u| u.snapshot.owner == PlayerId(2))
            .map(|u| u.snapshot.id)
            .unwrap();
        let applied = sandbox.apply_orders(vec![(vec![foreign], Order::Move(Vec2::ZERO))]);
        assert_eq!(applied, 0);
        assert_eq!(sandbox.get(foreign).unwrap().order, None);
    }

    #[test]
    fn test_toggle_switches_special() {
        let scenario = duel(vec![UnitPlacement::new("tank", 2.5, 2.5, 1)], Vec::new());
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let tank = only_own(&sandbox);
        sandbox.apply_orders(vec![(vec![tank], Order::Toggle(true))]);
        let unit = sandbox.get(tank).unwrap();
        assert!(unit.special_active);
        assert_eq!(unit.order, None);
    }

    #[test]
    fn test_production_builds_heaviest_request() {
        let scenario = duel(vec![UnitPlacement::new("depot", 1.5, 1.5, 1)], Vec::new());
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        assert!(sandbox.production_due());
        let requests = BTreeMap::from([
            (RIFLE, RequestTally { count: 2, weight: 20.0 }),
            (BIKE, RequestTally { count: 1, weight: 50.0 }),
        ]);
        let id = sandbox.produce(&requests).unwrap();
        assert_eq!(sandbox.get(id).unwrap().snapshot.unit_type, BIKE);
        assert_eq!(sandbox.resources(), 400 + 150 - 50);
    }

    #[test]
    fn test_production_saves_up_for_expensive_units() {
        let mut scenario = duel(vec![UnitPlacement::new("depot", 1.5, 1.5, 1)], Vec::new());
        scenario.production.starting_resources = 0;
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let requests = BTreeMap::from([(GUNBOAT, RequestTally { count: 1, weight: 40.0 })]);
        // No water anywhere, but the budget check comes first.
        assert!(sandbox.produce(&requests).is_none());
        assert_eq!(sandbox.resources(), 150);
    }

    #[test]
    fn test_naval_production_spawns_on_water() {
        let mut sandbox = Sandbox::from_scenario(&Scenario::coastal(), 0).unwrap();
        let requests = BTreeMap::from([(GUNBOAT, RequestTally { count: 1, weight: 40.0 })]);
        let id = sandbox.produce(&requests).unwrap();
        let tile = Tile::containing(sandbox.get(id).unwrap().snapshot.position);
        assert_eq!(sandbox.terrain(tile), Terrain::Water);
    }

    #[test]
    fn test_hostiles_hidden_until_explored() {
        let mut scenario = Scenario::skirmish();
        scenario.reveal_map = false;
        let sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        assert!(sandbox.hostiles_near(Vec2::new(50.0, 50.0), 20.0).is_empty());

        scenario.reveal_map = true;
        let revealed = Sandbox::from_scenario(&scenario, 0).unwrap();
        let contacts = revealed.hostiles_near(Vec2::new(50.0, 50.0), 20.0);
        assert_eq!(contacts.len(), 8);
        assert!(contacts.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_exploration_and_scouting_target() {
        let sandbox = Sandbox::from_scenario(&Scenario::skirmish(), 0).unwrap();
        let explored = sandbox.explored_fraction();
        assert!(explored > 0.0 && explored < 1.0);
        let target = sandbox.scouting_target().unwrap();
        assert!(!sandbox.is_explored(Tile::containing(target)));
    }

    #[test]
    fn test_attacked_structures_reported() {
        let scenario = duel(
            vec![UnitPlacement::new("depot", 4.5, 4.5, 1)],
            vec![UnitPlacement::new("rifle", 6.5, 4.5, 1)],
        );
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        assert!(sandbox.attacked_structures().is_empty());
        sandbox.step();
        assert_eq!(sandbox.attacked_structures(), vec![Vec2::new(4.5, 4.5)]);
    }

    #[test]
    fn test_assault_charges_rally() {
        let mut scenario = duel(
            vec![UnitPlacement::new("depot", 2.5, 2.5, 1)],
            vec![UnitPlacement::new("rifle", 12.5, 12.5, 1)],
        );
        scenario.opponents[0].attack_at = Some(10);
        let mut sandbox = Sandbox::from_scenario(&scenario, 0).unwrap();
        let start = Vec2::new(12.5, 12.5);
        for _ in 0..10 {
            sandbox.step();
        }
        let hostile = |s: &Sandbox| {
            s.units()
                .find(|u| u.snapshot.owner == PlayerId(2))
                .map(|u| u.snapshot.position)
                .unwrap()
        };
        assert_eq!(hostile(&sandbox), start);
        for _ in 0..20 {
            sandbox.step();
        }
        assert!(hostile(&sandbox).distance(Vec2::new(2.0, 2.0)) < start.distance(Vec2::new(2.0, 2.0)));
    }
}
