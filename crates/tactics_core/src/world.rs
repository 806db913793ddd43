//! Interfaces to the host engine and the awareness collaborator.
//!
//! The decision layer never owns unit lifecycle. It sees the world through
//! three narrow seams:
//!
//! - [`WorldView`]: read-only unit snapshots, terrain and player roster
//! - [`Awareness`]: hostile-proximity queries and strategic points
//! - [`OrderSink`]: where batched orders are finally issued
//!
//! Both human-facing drivers and tests implement these traits, so the same
//! decision code runs against the real host, the headless sandbox and mocks.
//! Unit handles may go stale at any moment; every lookup returns `Option`
//! and callers treat `None` as "unit lost".

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::TacticsConfig;
use crate::math::{MapBounds, Tile};

/// Opaque handle to a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

/// Producible unit type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

/// How a unit moves across the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovementDomain {
    /// Ground units.
    #[default]
    Land,
    /// Ships.
    Naval,
    /// Hovercraft and similar, land or water.
    Amphibious,
    /// Aircraft.
    Air,
}

impl MovementDomain {
    /// Whether a unit of this domain may stand on the given terrain.
    #[must_use]
    pub fn can_traverse(self, terrain: Terrain) -> bool {
        match (self, terrain) {
            (_, Terrain::Blocked) => false,
            (MovementDomain::Land, Terrain::Land) => true,
            (MovementDomain::Land, Terrain::Water) => false,
            (MovementDomain::Naval, Terrain::Water) => true,
            (MovementDomain::Naval, Terrain::Land) => false,
            (MovementDomain::Amphibious | MovementDomain::Air, _) => true,
        }
    }

    /// Naval and amphibious units get the water-fighting bonus.
    #[must_use]
    pub fn is_seaborne(self) -> bool {
        matches!(self, MovementDomain::Naval | MovementDomain::Amphibious)
    }
}

/// Tile terrain classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Terrain {
    /// Walkable ground.
    #[default]
    Land,
    /// Navigable water.
    Water,
    /// Cliffs, off-map and anything else nobody can stand on.
    Blocked,
}

/// Read-only view of one unit, fresh for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Entity handle.
    pub id: UnitId,
    /// Producible type.
    pub unit_type: UnitTypeId,
    /// Owning player.
    pub owner: PlayerId,
    /// Current position.
    pub position: Vec2,
    /// Longest weapon range, zero for unarmed units.
    pub weapon_range: f32,
    /// Remaining health as a fraction in `0.0..=1.0`.
    pub health: f32,
    /// Movement classification.
    pub domain: MovementDomain,
    /// Whether this is a building.
    pub is_structure: bool,
    /// High-value structure (production, tech, headquarters).
    pub is_high_value: bool,
    /// Whether the unit has a toggleable special ability.
    pub has_special: bool,
}

impl UnitSnapshot {
    /// Armed, mobile unit.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.weapon_range > 0.0 && !self.is_structure
    }
}

/// Result row of a hostile-proximity query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostileContact {
    /// Hostile unit.
    pub id: UnitId,
    /// Distance from the query point.
    pub distance: f32,
}

/// An order for a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Order {
    /// Move to a position, ignoring enemies on the way.
    Move(Vec2),
    /// Move to a position, engaging enemies on the way.
    AttackMove(Vec2),
    /// Attack a specific unit.
    Attack(UnitId),
    /// Switch the unit's special ability on or off.
    Toggle(bool),
}

impl Order {
    /// Destination point for positional orders.
    #[must_use]
    pub fn destination(&self) -> Option<Vec2> {
        match self {
            Order::Move(p) | Order::AttackMove(p) => Some(*p),
            Order::Attack(_) | Order::Toggle(_) => None,
        }
    }
}

/// Read-only world queries supplied by the host each tick.
pub trait WorldView {
    /// The player this agent controls.
    fn player(&self) -> PlayerId;

    /// All players in the match, including this one.
    fn players(&self) -> Vec<PlayerId>;

    /// Alliance predicate. A player is always allied with itself.
    fn is_ally(&self, a: PlayerId, b: PlayerId) -> bool;

    /// All entities owned by this player, structures included.
    fn own_units(&self) -> Vec<UnitId>;

    /// Snapshot of any entity, `None` once it no longer exists.
    fn unit(&self, id: UnitId) -> Option<UnitSnapshot>;

    /// Terrain of a tile. Off-map tiles are [`Terrain::Blocked`].
    fn terrain(&self, tile: Tile) -> Terrain;

    /// Map extents.
    fn bounds(&self) -> MapBounds;
}

/// Threat and strategic-point provider.
///
/// Snapshots are never mutated by the decision layer.
pub trait Awareness {
    /// Known hostile units within `radius` of `point`, nearest first.
    fn hostiles_near(&self, point: Vec2, radius: f32) -> Vec<HostileContact>;

    /// Suggested gathering point for new and withdrawing forces.
    fn rally_point(&self) -> Vec2;

    /// Next point worth scouting, if the provider has one.
    fn scouting_target(&self) -> Option<Vec2>;

    /// Positions of own structures currently taking damage.
    fn attacked_structures(&self) -> Vec<Vec2>;

    /// Fraction of the map explored so far, `0.0..=1.0`.
    fn explored_fraction(&self) -> f32;

    /// Whether a tile has ever been seen.
    fn is_explored(&self, tile: Tile) -> bool;
}

/// Host order-issuing surface.
pub trait OrderSink {
    /// Issue one order to a group of units.
    fn issue(&mut self, units: &[UnitId], order: Order);
}

/// Static description of one producible unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeInfo {
    /// Type id.
    pub id: UnitTypeId,
    /// Display name.
    pub name: String,
    /// Movement classification.
    pub domain: MovementDomain,
    /// Production cost.
    pub cost: u32,
    /// Movement speed in tiles per tick.
    pub speed: f32,
    /// Whether the type is armed.
    pub combat: bool,
}

/// Producible unit types known to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitCatalog {
    types: Vec<UnitTypeInfo>,
}

impl UnitCatalog {
    /// Build a catalog from a list of types.
    #[must_use]
    pub fn new(types: Vec<UnitTypeInfo>) -> Self {
        Self { types }
    }

    /// Look up a type by id.
    #[must_use]
    pub fn get(&self, id: UnitTypeId) -> Option<&UnitTypeInfo> {
        self.types.iter().find(|t| t.id == id)
    }

    /// All types in declaration order.
    #[must_use]
    pub fn types(&self) -> &[UnitTypeInfo] {
        &self.types
    }

    /// Armed types whose domain passes `filter`.
    pub fn combat_types<'a>(
        &'a self,
        filter: impl Fn(MovementDomain) -> bool + 'a,
    ) -> impl Iterator<Item = &'a UnitTypeInfo> + 'a {
        self.types
            .iter()
            .filter(move |t| t.combat && filter(t.domain))
    }

    /// The `n` best scouting types: fastest first, cheapest on ties.
    ///
    /// Naval types are excluded; scouts need to reach inland tiles.
    #[must_use]
    pub fn scouting_types(&self, n: usize) -> Vec<UnitTypeId> {
        let mut candidates: Vec<&UnitTypeInfo> = self
            .types
            .iter()
            .filter(|t| t.domain != MovementDomain::Naval)
            .collect();
        candidates.sort_by(|a, b| {
            b.speed
                .total_cmp(&a.speed)
                .then(a.cost.cmp(&b.cost))
                .then(a.id.cmp(&b.id))
        });
        candidates.into_iter().take(n).map(|t| t.id).collect()
    }
}

/// Everything a mission or squad may read during one decision tick.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Engine-provided tick counter.
    pub tick: u64,
    /// Host world queries.
    pub world: &'a dyn WorldView,
    /// Threat and strategic-point queries.
    pub awareness: &'a dyn Awareness,
    /// Producible unit types.
    pub catalog: &'a UnitCatalog,
    /// Tuning values.
    pub config: &'a TacticsConfig,
}

impl<'a> TickContext<'a> {
    /// Snapshot of a unit only if it is still alive and ours.
    #[must_use]
    pub fn own_unit(&self, id: UnitId) -> Option<UnitSnapshot> {
        self.world
            .unit(id)
            .filter(|u| u.owner == self.world.player())
    }

    /// Whether `tile` is on the map and traversable for `domain`.
    #[must_use]
    pub fn is_traversable(&self, tile: Tile, domain: MovementDomain) -> bool {
        self.world.bounds().contains(tile) && domain.can_traverse(self.world.terrain(tile))
    }

    /// Clamp a point onto the map.
    #[must_use]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        self.world.bounds().clamp(point)
    }

    /// Hostile contacts with their snapshots, dropping stale and allied ids.
    #[must_use]
    pub fn hostile_snapshots(&self, point: Vec2, radius: f32) -> Vec<(UnitSnapshot, f32)> {
        let me = self.world.player();
        self.awareness
            .hostiles_near(point, radius)
            .into_iter()
            .filter_map(|c| {
                let unit = self.world.unit(c.id)?;
                (!self.world.is_ally(me, unit.owner)).then_some((unit, c.distance))
            })
            .collect()
    }
}
