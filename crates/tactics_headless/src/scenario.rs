//! Scenario loading and configuration.
//!
//! A scenario describes the sandbox map, the unit types in play, where every
//! player's units start and how the production stub is paced.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::error::TacticsError;
use tactics_core::world::{MovementDomain, UnitCatalog, UnitTypeId, UnitTypeInfo};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario parsed but is inconsistent.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The tactics configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] TacticsError),
}

/// Default run length: ten game minutes at 1500 ticks per minute.
pub const DEFAULT_MAX_TICKS: u64 = 15_000;

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Map dimensions (width, height) in tiles.
    pub map_size: (u32, u32),
    /// Water rectangles.
    #[serde(default)]
    pub water: Vec<Area>,
    /// Impassable rectangles.
    #[serde(default)]
    pub blocked: Vec<Area>,
    /// Every unit and structure type that may appear.
    pub unit_types: Vec<UnitTypeSetup>,
    /// The player driven by the decision layer.
    pub player: PlayerSetup,
    /// Everyone else.
    pub opponents: Vec<PlayerSetup>,
    /// Production stub pacing.
    #[serde(default)]
    pub production: ProductionSetup,
    /// Report every hostile as known, ignoring exploration.
    #[serde(default)]
    pub reveal_map: bool,
    /// Run length in raw simulation ticks.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "skirmish" => Some(Self::skirmish()),
            "coastal" => Some(Self::coastal()),
            _ => None,
        }
    }

    /// A built-in scenario name, or else a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Check placements and type tables for consistency.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.map_size.0 == 0 || self.map_size.1 == 0 {
            return Err(ScenarioError::Invalid("map has zero area".to_string()));
        }
        let mut ids = BTreeSet::new();
        let mut names = BTreeSet::new();
        for setup in &self.unit_types {
            if !ids.insert(setup.id) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate unit type id {}",
                    setup.id
                )));
            }
            if !names.insert(setup.name.as_str()) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate unit type name '{}'",
                    setup.name
                )));
            }
            if setup.hit_points <= 0.0 {
                return Err(ScenarioError::Invalid(format!(
                    "unit type '{}' has no hit points",
                    setup.name
                )));
            }
        }

        let mut players = BTreeSet::new();
        for setup in std::iter::once(&self.player).chain(&self.opponents) {
            if !players.insert(setup.player) {
                return Err(ScenarioError::Invalid(format!(
                    "player {} listed twice",
                    setup.player
                )));
            }
            for placement in &setup.units {
                if self.unit_type(&placement.kind).is_none() {
                    return Err(ScenarioError::Invalid(format!(
                        "player {} places unknown unit type '{}'",
                        setup.player, placement.kind
                    )));
                }
            }
        }
        if self.production.interval_ticks == 0 {
            return Err(ScenarioError::Invalid(
                "production interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a unit type by name.
    #[must_use]
    pub fn unit_type(&self, name: &str) -> Option<&UnitTypeSetup> {
        self.unit_types.iter().find(|t| t.name == name)
    }

    /// Producible mobile types, as the decision layer sees them.
    #[must_use]
    pub fn catalog(&self) -> UnitCatalog {
        UnitCatalog::new(
            self.unit_types
                .iter()
                .filter(|t| t.producible && !t.structure)
                .map(UnitTypeSetup::info)
                .collect(),
        )
    }

    /// Open land skirmish against a single opponent who counter-attacks
    /// after a while.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Skirmish".to_string(),
            description: "Open land map, one opponent base in the far corner".to_string(),
            map_size: (64, 64),
            water: Vec::new(),
            blocked: vec![Area::new((28, 20), (30, 36))],
            unit_types: standard_unit_types(),
            player: PlayerSetup {
                player: 1,
                rally: (8.0, 8.0),
                units: vec![
                    UnitPlacement::new("rifle", 10.0, 10.0, 6),
                    UnitPlacement::new("tank", 12.0, 8.0, 2),
                    UnitPlacement::new("bike", 8.0, 12.0, 1),
                    UnitPlacement::new("factory", 5.0, 5.0, 1),
                    UnitPlacement::new("depot", 3.0, 9.0, 1),
                ],
                attack_at: None,
                allied: false,
            },
            opponents: vec![PlayerSetup {
                player: 2,
                rally: (54.0, 54.0),
                units: vec![
                    UnitPlacement::new("rifle", 50.0, 50.0, 5),
                    UnitPlacement::new("turret", 48.0, 54.0, 1),
                    UnitPlacement::new("factory", 57.0, 57.0, 1),
                    UnitPlacement::new("depot", 54.0, 60.0, 1),
                ],
                attack_at: Some(6000),
                allied: false,
            }],
            production: ProductionSetup::default(),
            reveal_map: false,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// Opponent across a channel with a narrow land bridge on the east side.
    #[must_use]
    pub fn coastal() -> Self {
        Self {
            name: "Coastal".to_string(),
            description: "Channel splits the map; naval and amphibious units matter".to_string(),
            map_size: (64, 48),
            water: vec![Area::new((0, 20), (51, 27))],
            blocked: Vec::new(),
            unit_types: standard_unit_types(),
            player: PlayerSetup {
                player: 1,
                rally: (12.0, 10.0),
                units: vec![
                    UnitPlacement::new("rifle", 14.0, 10.0, 4),
                    UnitPlacement::new("hover", 12.0, 14.0, 2),
                    UnitPlacement::new("gunboat", 12.0, 22.0, 2),
                    UnitPlacement::new("bike", 10.0, 12.0, 1),
                    UnitPlacement::new("factory", 8.0, 6.0, 1),
                ],
                attack_at: None,
                allied: false,
            },
            opponents: vec![PlayerSetup {
                player: 2,
                rally: (20.0, 40.0),
                units: vec![
                    UnitPlacement::new("rifle", 18.0, 32.0, 4),
                    UnitPlacement::new("gunboat", 24.0, 26.0, 1),
                    UnitPlacement::new("factory", 20.0, 42.0, 1),
                    UnitPlacement::new("depot", 26.0, 40.0, 1),
                ],
                attack_at: None,
                allied: false,
            }],
            production: ProductionSetup::default(),
            reveal_map: false,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

/// Inclusive tile rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    /// First corner.
    pub from: (i32, i32),
    /// Opposite corner, inclusive.
    pub to: (i32, i32),
}

impl Area {
    /// Create a new area.
    #[must_use]
    pub fn new(from: (i32, i32), to: (i32, i32)) -> Self {
        Self { from, to }
    }

    /// Every tile in the rectangle.
    pub fn tiles(self) -> impl Iterator<Item = (i32, i32)> {
        let (x0, x1) = (self.from.0.min(self.to.0), self.from.0.max(self.to.0));
        let (y0, y1) = (self.from.1.min(self.to.1), self.from.1.max(self.to.1));
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
    }
}

/// Stats of one unit or structure type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeSetup {
    /// Type id reported to the decision layer.
    pub id: u32,
    /// Name used by placements.
    pub name: String,
    /// Movement classification.
    #[serde(default)]
    pub domain: MovementDomain,
    /// Production cost.
    #[serde(default)]
    pub cost: u32,
    /// Tiles per tick; zero for structures.
    #[serde(default)]
    pub speed: f32,
    /// Weapon range, zero when unarmed.
    #[serde(default)]
    pub weapon_range: f32,
    /// Damage per tick against a target in range.
    #[serde(default)]
    pub damage: f32,
    /// Starting and maximum hit points.
    pub hit_points: f32,
    /// Exploration radius.
    #[serde(default = "default_sight")]
    pub sight: f32,
    /// Buildings never move and are never allocated.
    #[serde(default)]
    pub structure: bool,
    /// Production, tech or headquarters building.
    #[serde(default)]
    pub high_value: bool,
    /// Has a toggleable special ability.
    #[serde(default)]
    pub special: bool,
    /// Whether the production stub may build it.
    #[serde(default = "default_producible")]
    pub producible: bool,
}

fn default_sight() -> f32 {
    8.0
}

fn default_producible() -> bool {
    true
}

impl UnitTypeSetup {
    /// Type id as the decision layer knows it.
    #[must_use]
    pub fn type_id(&self) -> UnitTypeId {
        UnitTypeId(self.id)
    }

    /// Catalog row for this type.
    #[must_use]
    pub fn info(&self) -> UnitTypeInfo {
        UnitTypeInfo {
            id: self.type_id(),
            name: self.name.clone(),
            domain: self.domain,
            cost: self.cost,
            speed: self.speed,
            combat: self.damage > 0.0 && self.weapon_range > 0.0,
        }
    }
}

/// Starting setup for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Player id.
    pub player: u8,
    /// Gathering point.
    pub rally: (f32, f32),
    /// Starting units and structures.
    pub units: Vec<UnitPlacement>,
    /// From this tick on, mobile units attack-move to the main player's rally.
    #[serde(default)]
    pub attack_at: Option<u64>,
    /// Allied with the main player.
    #[serde(default)]
    pub allied: bool,
}

/// Placement of units at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type name.
    pub kind: String,
    /// Position (x, y).
    pub position: (f32, f32),
    /// Number of units to spawn.
    pub count: u32,
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, x: f32, y: f32, count: u32) -> Self {
        Self {
            kind: kind.into(),
            position: (x, y),
            count,
        }
    }
}

/// Production stub pacing for the main player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionSetup {
    /// Ticks between two production rounds.
    pub interval_ticks: u64,
    /// Resources gained per round.
    pub income: u32,
    /// Resources at tick zero.
    pub starting_resources: u32,
}

impl Default for ProductionSetup {
    fn default() -> Self {
        Self {
            interval_ticks: 300,
            income: 150,
            starting_resources: 400,
        }
    }
}

pub(crate) fn standard_unit_types() -> Vec<UnitTypeSetup> {
    let mobile = |id, name: &str, domain, cost, speed, weapon_range, damage, hit_points| {
        UnitTypeSetup {
            id,
            name: name.to_string(),
            domain,
            cost,
            speed,
            weapon_range,
            damage,
            hit_points,
            sight: default_sight(),
            structure: false,
            high_value: false,
            special: false,
            producible: true,
        }
    };
    let building = |id, name: &str, high_value, weapon_range, damage, hit_points| UnitTypeSetup {
        id,
        name: name.to_string(),
        domain: MovementDomain::Land,
        cost: 0,
        speed: 0.0,
        weapon_range,
        damage,
        hit_points,
        sight: 6.0,
        structure: true,
        high_value,
        special: false,
        producible: false,
    };
    let mut tank = mobile(2, "tank", MovementDomain::Land, 300, 0.06, 6.0, 1.2, 120.0);
    tank.special = true;
    let mut bike = mobile(3, "bike", MovementDomain::Land, 50, 0.15, 0.0, 0.0, 25.0);
    bike.sight = 10.0;
    vec![
        mobile(1, "rifle", MovementDomain::Land, 100, 0.08, 4.0, 0.5, 40.0),
        tank,
        bike,
        mobile(4, "gunboat", MovementDomain::Naval, 250, 0.1, 7.0, 1.0, 90.0),
        mobile(5, "hover", MovementDomain::Amphibious, 200, 0.12, 4.0, 0.6, 60.0),
        building(100, "depot", false, 0.0, 0.0, 400.0),
        building(101, "factory", true, 0.0, 0.0, 600.0),
        building(102, "turret", false, 6.0, 0.8, 250.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scenarios_validate() {
        for name in ["skirmish", "coastal"] {
            let scenario = Scenario::builtin(name).unwrap();
            scenario.validate().unwrap();
        }
        assert!(Scenario::builtin("nope").is_none());
    }

    #[test]
    fn test_catalog_excludes_structures() {
        let catalog = Scenario::skirmish().catalog();
        let names: Vec<&str> = catalog.types().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rifle", "tank", "bike", "gunboat", "hover"]);
        let bike = catalog.get(UnitTypeId(3)).unwrap();
        assert!(!bike.combat);
    }

    #[test]
    fn test_area_tiles_inclusive() {
        let tiles: Vec<_> = Area::new((2, 1), (1, 2)).tiles().collect();
        assert_eq!(tiles, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                description: "Test scenario",
                map_size: (16, 16),
                unit_types: [
                    UnitTypeSetup(id: 1, name: "rifle", speed: 0.1, weapon_range: 4.0, damage: 1.0, hit_points: 10.0),
                ],
                player: PlayerSetup(
                    player: 1,
                    rally: (2.0, 2.0),
                    units: [UnitPlacement(kind: "rifle", position: (3.0, 3.0), count: 2)],
                ),
                opponents: [],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.max_ticks, DEFAULT_MAX_TICKS);
        assert_eq!(scenario.production.interval_ticks, 300);
        assert!(scenario.unit_types[0].producible);
    }

    #[test]
    fn test_unknown_placement_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.opponents[0]
            .units
            .push(UnitPlacement::new("dragon", 1.0, 1.0, 1));
        let err = scenario.validate().unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(msg) if msg.contains("dragon")));
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.opponents[0].player = 1;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }
}
