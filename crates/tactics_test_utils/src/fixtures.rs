//! Test fixtures and helpers.
//!
//! A scriptable [`MockWorld`] that serves both the world and awareness
//! interfaces, a [`RecordingSink`] that keeps every issued order, and a
//! small standard unit catalog.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use tactics_core::config::TacticsConfig;
use tactics_core::math::{MapBounds, Tile};
use tactics_core::world::{
    Awareness, HostileContact, MovementDomain, Order, OrderSink, PlayerId, Terrain, TickContext,
    UnitCatalog, UnitId, UnitSnapshot, UnitTypeId, UnitTypeInfo, WorldView,
};

/// The player the decision layer controls in fixtures.
pub const ME: PlayerId = PlayerId(1);
/// The default opponent.
pub const ENEMY: PlayerId = PlayerId(2);

/// Armed land infantry.
pub const RIFLE: UnitTypeId = UnitTypeId(1);
/// Armed land vehicle.
pub const TANK: UnitTypeId = UnitTypeId(2);
/// Fast, cheap, unarmed land scout.
pub const BIKE: UnitTypeId = UnitTypeId(3);
/// Armed ship.
pub const GUNBOAT: UnitTypeId = UnitTypeId(4);
/// Armed amphibious hovercraft.
pub const HOVER: UnitTypeId = UnitTypeId(5);
/// Structure type used for buildings.
pub const DEPOT: UnitTypeId = UnitTypeId(100);

/// Catalog with one type per constant above (structures excluded).
#[must_use]
pub fn standard_catalog() -> UnitCatalog {
    let info = |id, name: &str, domain, cost, speed, combat| UnitTypeInfo {
        id,
        name: name.to_string(),
        domain,
        cost,
        speed,
        combat,
    };
    UnitCatalog::new(vec![
        info(RIFLE, "rifle", MovementDomain::Land, 100, 1.0, true),
        info(TANK, "tank", MovementDomain::Land, 300, 0.8, true),
        info(BIKE, "bike", MovementDomain::Land, 50, 2.0, false),
        info(GUNBOAT, "gunboat", MovementDomain::Naval, 250, 1.2, true),
        info(HOVER, "hover", MovementDomain::Amphibious, 200, 1.5, true),
    ])
}

/// Snapshot of an armed, healthy land unit.
#[must_use]
pub fn combatant(owner: PlayerId, unit_type: UnitTypeId, position: Vec2) -> UnitSnapshot {
    UnitSnapshot {
        id: UnitId(0),
        unit_type,
        owner,
        position,
        weapon_range: 5.0,
        health: 1.0,
        domain: MovementDomain::Land,
        is_structure: false,
        is_high_value: false,
        has_special: false,
    }
}

/// Snapshot of a structure.
#[must_use]
pub fn structure(owner: PlayerId, position: Vec2, high_value: bool) -> UnitSnapshot {
    UnitSnapshot {
        id: UnitId(0),
        unit_type: DEPOT,
        owner,
        position,
        weapon_range: 0.0,
        health: 1.0,
        domain: MovementDomain::Land,
        is_structure: true,
        is_high_value: high_value,
        has_special: false,
    }
}

/// Scriptable world, awareness provider and unit store.
///
/// Every non-allied unit counts as a known hostile; there is no fog.
#[derive(Debug, Clone)]
pub struct MockWorld {
    player: PlayerId,
    alliances: BTreeSet<(PlayerId, PlayerId)>,
    units: BTreeMap<UnitId, UnitSnapshot>,
    bounds: MapBounds,
    terrain: BTreeMap<Tile, Terrain>,
    rally: Vec2,
    scouting_target: Option<Vec2>,
    attacked: Vec<Vec2>,
    explored_fraction: f32,
    explored: BTreeSet<Tile>,
    next_id: u64,
}

impl MockWorld {
    /// Empty all-land map of the given size, rally point in the corner.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            player: ME,
            alliances: BTreeSet::new(),
            units: BTreeMap::new(),
            bounds: MapBounds::new(width, height),
            terrain: BTreeMap::new(),
            rally: Vec2::new(5.0, 5.0),
            scouting_target: None,
            attacked: Vec::new(),
            explored_fraction: 0.0,
            explored: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Set the rally point.
    #[must_use]
    pub fn with_rally(mut self, rally: Vec2) -> Self {
        self.rally = rally;
        self
    }

    /// Declare two players allied.
    #[must_use]
    pub fn with_alliance(mut self, a: PlayerId, b: PlayerId) -> Self {
        self.alliances.insert((a, b));
        self.alliances.insert((b, a));
        self
    }

    /// Build a tick context over this world.
    #[must_use]
    pub fn context<'a>(
        &'a self,
        tick: u64,
        catalog: &'a UnitCatalog,
        config: &'a TacticsConfig,
    ) -> TickContext<'a> {
        TickContext {
            tick,
            world: self,
            awareness: self,
            catalog,
            config,
        }
    }

    /// Add a unit, assigning a fresh id.
    pub fn spawn(&mut self, mut unit: UnitSnapshot) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Add an own armed land unit.
    pub fn spawn_own(&mut self, unit_type: UnitTypeId, position: Vec2) -> UnitId {
        self.spawn(combatant(ME, unit_type, position))
    }

    /// Add `count` own units of one type spread along a short row.
    pub fn spawn_own_group(&mut self, unit_type: UnitTypeId, at: Vec2, count: usize) -> Vec<UnitId> {
        (0..count)
            .map(|i| self.spawn_own(unit_type, at + Vec2::new(i as f32, 0.0)))
            .collect()
    }

    /// Add an enemy armed land unit.
    pub fn spawn_hostile(&mut self, unit_type: UnitTypeId, position: Vec2) -> UnitId {
        self.spawn(combatant(ENEMY, unit_type, position))
    }

    /// Remove a unit; its id goes stale.
    pub fn kill(&mut self, id: UnitId) {
        self.units.remove(&id);
    }

    /// Teleport a unit.
    pub fn set_position(&mut self, id: UnitId, position: Vec2) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.position = position;
        }
    }

    /// Edit a unit in place.
    pub fn edit(&mut self, id: UnitId, f: impl FnOnce(&mut UnitSnapshot)) {
        if let Some(unit) = self.units.get_mut(&id) {
            f(unit);
        }
    }

    /// Set one tile's terrain.
    pub fn set_terrain(&mut self, tile: Tile, terrain: Terrain) {
        self.terrain.insert(tile, terrain);
    }

    /// Set the terrain of every tile in an inclusive rectangle.
    pub fn fill_terrain(&mut self, from: Tile, to: Tile, terrain: Terrain) {
        for x in from.x..=to.x {
            for y in from.y..=to.y {
                self.terrain.insert(Tile::new(x, y), terrain);
            }
        }
    }

    /// Set the provider's scouting suggestion.
    pub fn set_scouting_target(&mut self, target: Option<Vec2>) {
        self.scouting_target = target;
    }

    /// Report an own structure under attack at `position`.
    pub fn attack_structure_at(&mut self, position: Vec2) {
        self.attacked.push(position);
    }

    /// Set the explored fraction reported to missions.
    pub fn set_explored_fraction(&mut self, fraction: f32) {
        self.explored_fraction = fraction;
    }

    /// Mark a tile explored.
    pub fn explore(&mut self, tile: Tile) {
        self.explored.insert(tile);
    }
}

impl WorldView for MockWorld {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn players(&self) -> Vec<PlayerId> {
        let mut players: BTreeSet<PlayerId> = self.units.values().map(|u| u.owner).collect();
        players.insert(self.player);
        players.into_iter().collect()
    }

    fn is_ally(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b || self.alliances.contains(&(a, b))
    }

    fn own_units(&self) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.owner == self.player)
            .map(|u| u.id)
            .collect()
    }

    fn unit(&self, id: UnitId) -> Option<UnitSnapshot> {
        self.units.get(&id).copied()
    }

    fn terrain(&self, tile: Tile) -> Terrain {
        if !self.bounds.contains(tile) {
            return Terrain::Blocked;
        }
        self.terrain.get(&tile).copied().unwrap_or_default()
    }

    fn bounds(&self) -> MapBounds {
        self.bounds
    }
}

impl Awareness for MockWorld {
    fn hostiles_near(&self, point: Vec2, radius: f32) -> Vec<HostileContact> {
        let mut contacts: Vec<HostileContact> = self
            .units
            .values()
            .filter(|u| !self.is_ally(self.player, u.owner))
            .map(|u| HostileContact {
                id: u.id,
                distance: u.position.distance(point),
            })
            .filter(|c| c.distance <= radius)
            .collect();
        contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        contacts
    }

    fn rally_point(&self) -> Vec2 {
        self.rally
    }

    fn scouting_target(&self) -> Option<Vec2> {
        self.scouting_target
    }

    fn attacked_structures(&self) -> Vec<Vec2> {
        self.attacked.clone()
    }

    fn explored_fraction(&self) -> f32 {
        self.explored_fraction
    }

    fn is_explored(&self, tile: Tile) -> bool {
        self.explored.contains(&tile)
    }
}

/// Order sink that remembers every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Every `issue` call in order.
    pub calls: Vec<(Vec<UnitId>, Order)>,
}

impl RecordingSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every order issued to `unit`, oldest first.
    #[must_use]
    pub fn orders_for(&self, unit: UnitId) -> Vec<Order> {
        self.calls
            .iter()
            .filter(|(units, _)| units.contains(&unit))
            .map(|(_, order)| *order)
            .collect()
    }

    /// Most recent order issued to `unit`.
    #[must_use]
    pub fn last_order_for(&self, unit: UnitId) -> Option<Order> {
        self.orders_for(unit).last().copied()
    }

    /// Total unit orders issued (one call may cover several units).
    #[must_use]
    pub fn unit_orders(&self) -> usize {
        self.calls.iter().map(|(units, _)| units.len()).sum()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl OrderSink for RecordingSink {
    fn issue(&mut self, units: &[UnitId], order: Order) {
        self.calls.push((units.to_vec(), order));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostiles_sorted_and_filtered() {
        let mut world = MockWorld::new(64, 64).with_alliance(ME, PlayerId(3));
        world.spawn_own(RIFLE, Vec2::new(10.0, 10.0));
        let far = world.spawn_hostile(RIFLE, Vec2::new(18.0, 10.0));
        let near = world.spawn_hostile(RIFLE, Vec2::new(12.0, 10.0));
        world.spawn(combatant(PlayerId(3), RIFLE, Vec2::new(11.0, 10.0)));
        let contacts = world.hostiles_near(Vec2::new(10.0, 10.0), 10.0);
        let ids: Vec<UnitId> = contacts.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![near, far]);
    }

    #[test]
    fn test_off_map_is_blocked() {
        let mut world = MockWorld::new(8, 8);
        world.set_terrain(Tile::new(2, 2), Terrain::Water);
        assert_eq!(world.terrain(Tile::new(2, 2)), Terrain::Water);
        assert_eq!(world.terrain(Tile::new(3, 3)), Terrain::Land);
        assert_eq!(world.terrain(Tile::new(-1, 0)), Terrain::Blocked);
    }

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::new();
        sink.issue(&[UnitId(1), UnitId(2)], Order::Move(Vec2::ONE));
        sink.issue(&[UnitId(2)], Order::Attack(UnitId(9)));
        assert_eq!(sink.unit_orders(), 3);
        assert_eq!(sink.last_order_for(UnitId(2)), Some(Order::Attack(UnitId(9))));
        assert_eq!(sink.orders_for(UnitId(1)).len(), 1);
    }
}
