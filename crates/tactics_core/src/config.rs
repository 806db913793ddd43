//! Tuning values for every part of the decision layer.
//!
//! Loaded from RON, with every field defaulted so a config file only needs to
//! name the values it changes:
//!
//! ```
//! use tactics_core::config::TacticsConfig;
//!
//! let config = TacticsConfig::from_ron_str("(attack: (composition_size: 12))").unwrap();
//! assert_eq!(config.attack.composition_size, 12);
//! assert_eq!(config.squad.command_interval, 15);
//! ```
//!
//! All durations are simulation ticks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Mission controller and allocation auction.
    pub controller: ControllerConfig,
    /// Squad movement and combat micro.
    pub squad: SquadConfig,
    /// Area scoring and target locking.
    pub targeting: TargetingConfig,
    /// Attack task.
    pub attack: AttackConfig,
    /// Naval campaign task.
    pub naval: NavalConfig,
    /// Scouting task.
    pub scout: ScoutConfig,
    /// Retreat task.
    pub retreat: RetreatConfig,
}

impl TacticsConfig {
    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TacticsError::ConfigNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse and validate a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: TacticsConfig = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or divide by zero.
    pub fn validate(&self) -> Result<()> {
        fn positive(field: &str, value: f32) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(TacticsError::InvalidConfig {
                    field: field.to_string(),
                    message: format!("must be a positive number, got {value}"),
                })
            }
        }
        fn fraction(field: &str, value: f32) -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(TacticsError::InvalidConfig {
                    field: field.to_string(),
                    message: format!("must lie in 0.0..=1.0, got {value}"),
                })
            }
        }
        fn nonzero(field: &str, value: u64) -> Result<()> {
            if value > 0 {
                Ok(())
            } else {
                Err(TacticsError::InvalidConfig {
                    field: field.to_string(),
                    message: "must be greater than zero".to_string(),
                })
            }
        }

        if self.controller.priority_ramp < 1.0 {
            return Err(TacticsError::InvalidConfig {
                field: "controller.priority_ramp".to_string(),
                message: "ramp factor below 1.0 would decrease priority".to_string(),
            });
        }
        positive("controller.priority_ceiling", self.controller.priority_ceiling)?;
        nonzero("controller.apm", u64::from(self.controller.apm))?;
        nonzero("squad.command_interval", self.squad.command_interval)?;
        nonzero("squad.stuck_sample_interval", self.squad.stuck_sample_interval)?;
        nonzero("squad.idle_timeout", self.squad.idle_timeout)?;
        if self.squad.stuck_samples < 2 {
            return Err(TacticsError::InvalidConfig {
                field: "squad.stuck_samples".to_string(),
                message: "need at least two samples to measure displacement".to_string(),
            });
        }
        if self.squad.gather_max_radius < self.squad.gather_min_radius {
            return Err(TacticsError::InvalidConfig {
                field: "squad.gather_max_radius".to_string(),
                message: "must not be smaller than gather_min_radius".to_string(),
            });
        }
        positive("squad.range_decay", self.squad.range_decay)?;
        positive("targeting.exclusion_radius", self.targeting.exclusion_radius)?;
        fraction("attack.ready_fraction", self.attack.ready_fraction)?;
        fraction("naval.ready_fraction", self.naval.ready_fraction)?;
        fraction("naval.scatter_fraction", self.naval.scatter_fraction)?;
        fraction("scout.explored_threshold", self.scout.explored_threshold)?;
        if self.attack.search_growth <= 1.0 {
            return Err(TacticsError::InvalidConfig {
                field: "attack.search_growth".to_string(),
                message: "search radius must grow".to_string(),
            });
        }
        nonzero("attack.composition_size", u64::from(self.attack.composition_size))?;
        nonzero("naval.composition_size", u64::from(self.naval.composition_size))?;
        nonzero("scout.unit_count", u64::from(self.scout.unit_count))?;
        Ok(())
    }

    /// Raw simulation ticks between two decision ticks.
    ///
    /// Derived from the actions-per-minute budget; never zero.
    #[must_use]
    pub fn decision_divisor(&self) -> u64 {
        let apm = u64::from(self.controller.apm.max(1));
        (self.controller.ticks_per_minute / apm).max(1)
    }
}

/// Controller and auction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Multiplicative priority growth per starved tick.
    pub priority_ramp: f32,
    /// Priority never ramps above this.
    pub priority_ceiling: f32,
    /// Actions-per-minute budget.
    pub apm: u32,
    /// Raw simulation ticks per game minute.
    pub ticks_per_minute: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            priority_ramp: 1.05,
            priority_ceiling: 100.0,
            apm: 300,
            ticks_per_minute: 1500,
        }
    }
}

/// Squad state machine and per-unit micro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadConfig {
    /// Gather radius grows with `sqrt(n) * gather_ratio`.
    pub gather_ratio: f32,
    /// Added to the gather radius when deciding to advance.
    pub gather_min_radius: f32,
    /// Added to the gather radius when deciding the squad has scattered.
    pub gather_max_radius: f32,
    /// Ticks between two command ticks.
    pub command_interval: u64,
    /// Centroid distance at which the squad has reached its target.
    pub arrival_radius: f32,
    /// Per-unit hostile scan radius.
    pub scan_radius: f32,
    /// Attack weight decays to zero at `range_decay * weapon_range`.
    pub range_decay: f32,
    /// Base weight for armed mobile targets.
    pub combatant_weight: f32,
    /// Base weight for structures.
    pub structure_weight: f32,
    /// Base weight for everything else.
    pub other_weight: f32,
    /// Bonus when a seaborne unit fights a seaborne target.
    pub seaborne_bonus: f32,
    /// Scaled by `1 / health` of the target.
    pub low_health_bonus: f32,
    /// Bonus when the target is already within weapon range.
    pub in_range_bonus: f32,
    /// Ticks an ally's engagement stays attractive.
    pub engagement_recency: u64,
    /// Ticks without combat before a unit starts searching on its own.
    pub idle_timeout: u64,
    /// Radius of autonomous search moves around the target.
    pub search_radius: f32,
    /// Ticks between two position samples.
    pub stuck_sample_interval: u64,
    /// Number of samples kept per unit.
    pub stuck_samples: usize,
    /// Maximum displacement across the window that still counts as stuck.
    pub stuck_threshold: f32,
    /// Recovery attempts before the unit is left alone.
    pub stuck_max_attempts: u32,
    /// Projection distance toward the target added per recovery attempt.
    pub recovery_step: f32,
    /// Open-area search radius (tiles) on the second attempt.
    pub recovery_radius: i32,
    /// Extra radius per further attempt.
    pub recovery_radius_growth: i32,
    /// Score penalty per tile of distance from the original target.
    pub recovery_target_penalty: f32,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            gather_ratio: 1.5,
            gather_min_radius: 3.0,
            gather_max_radius: 8.0,
            command_interval: 15,
            arrival_radius: 5.0,
            scan_radius: 10.0,
            range_decay: 2.5,
            combatant_weight: 2.0,
            structure_weight: 1.0,
            other_weight: 0.5,
            seaborne_bonus: 0.5,
            low_health_bonus: 0.25,
            in_range_bonus: 1.0,
            engagement_recency: 90,
            idle_timeout: 300,
            search_radius: 12.0,
            stuck_sample_interval: 60,
            stuck_samples: 3,
            stuck_threshold: 0.5,
            stuck_max_attempts: 4,
            recovery_step: 3.0,
            recovery_radius: 2,
            recovery_radius_growth: 2,
            recovery_target_penalty: 0.1,
        }
    }
}

/// Area scoring and the anti-oscillation target lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Value of a hostile structure.
    pub building_value: f32,
    /// Value of a hostile combatant.
    pub combat_value: f32,
    /// Value of any other hostile.
    pub other_value: f32,
    /// Multiplier applied to high-value structures.
    pub high_value_multiplier: f32,
    /// Distance penalty coefficient `k`.
    pub distance_factor: f32,
    /// `k` is multiplied by this when a high-value structure is present.
    pub high_value_relief: f32,
    /// Radius around a candidate point whose hostiles are scored.
    pub scan_radius: f32,
    /// Ticks a locked target is kept before a switch is considered.
    pub lock_ticks: u64,
    /// Candidate must beat the current score by this ratio.
    pub min_improvement: f32,
    /// Candidates this close to a recently visited target are ignored.
    pub exclusion_radius: f32,
    /// Number of visited targets remembered.
    pub memory: usize,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            building_value: 10.0,
            combat_value: 5.0,
            other_value: 1.0,
            high_value_multiplier: 3.0,
            distance_factor: 0.02,
            high_value_relief: 0.5,
            scan_radius: 12.0,
            lock_ticks: 150,
            min_improvement: 0.3,
            exclusion_radius: 8.0,
            memory: 3,
        }
    }
}

/// Attack task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Starting request priority.
    pub priority: f32,
    /// Units in the full composition.
    pub composition_size: u32,
    /// Fraction of the composition that is enough to commit.
    pub ready_fraction: f32,
    /// Smallest force allowed to commit early.
    pub min_squad_size: u32,
    /// Gather time after which a minimum force commits anyway.
    pub max_gather_ticks: u64,
    /// Gather time after which an under-sized force gives up.
    pub abandon_ticks: u64,
    /// Attacked structures within this radius of the rally point interrupt gathering.
    pub defense_radius: f32,
    /// Commit immediately when the force is already this close to the target.
    pub force_attack_distance: f32,
    /// Ticks between two retarget scans.
    pub retarget_interval: u64,
    /// No hostile within this radius of the target means the area is clear.
    pub clear_radius: f32,
    /// First search radius once the target area is clear.
    pub search_radius: f32,
    /// Search radius growth factor per fruitless search.
    pub search_growth: f32,
    /// Search stops growing past this radius.
    pub max_search_radius: f32,
    /// Ticks without contact before a cleared attack ends.
    pub idle_timeout: u64,
    /// Disband when hostile combatants exceed this multiple of our force.
    pub defence_ratio: f32,
    /// Ticks between two attack spawns.
    pub cooldown: u64,
    /// Factory only considers targets within this distance of the rally point.
    pub max_target_distance: f32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            priority: 50.0,
            composition_size: 10,
            ready_fraction: 0.8,
            min_squad_size: 3,
            max_gather_ticks: 1500,
            abandon_ticks: 4500,
            defense_radius: 30.0,
            force_attack_distance: 15.0,
            retarget_interval: 30,
            clear_radius: 12.0,
            search_radius: 20.0,
            search_growth: 1.5,
            max_search_radius: 80.0,
            idle_timeout: 450,
            defence_ratio: 3.0,
            cooldown: 750,
            max_target_distance: 200.0,
        }
    }
}

/// Naval campaign task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavalConfig {
    /// Starting request priority.
    pub priority: f32,
    /// Units in the full composition.
    pub composition_size: u32,
    /// Fraction of the composition that is enough to commit.
    pub ready_fraction: f32,
    /// Smallest force allowed to commit early.
    pub min_squad_size: u32,
    /// Gather time after which a minimum force commits anyway.
    pub max_gather_ticks: u64,
    /// Gather time after which an under-sized force gives up.
    pub abandon_ticks: u64,
    /// Force re-gather when more than this fraction is scattered.
    pub scatter_fraction: f32,
    /// Distance from the centroid that counts as scattered.
    pub max_scatter: f32,
    /// Retreat when nearby hostiles exceed this multiple of our force.
    pub hostile_ratio: f32,
    /// Radius around the centroid used for the hostile count.
    pub threat_radius: f32,
    /// Longest allowed campaign once active.
    pub max_duration: u64,
    /// Ticks between two centroid progress samples.
    pub progress_interval: u64,
    /// Minimum centroid displacement per sample that counts as progress.
    pub min_progress: f32,
    /// Ticks without progress before retreating.
    pub no_progress_ticks: u64,
    /// Ticks allowed for the withdrawal before disbanding anyway.
    pub retreat_timeout: u64,
    /// Ticks between two naval spawns.
    pub cooldown: u64,
    /// Factory only considers targets within this distance of the rally point.
    pub max_target_distance: f32,
}

impl Default for NavalConfig {
    fn default() -> Self {
        Self {
            priority: 40.0,
            composition_size: 6,
            ready_fraction: 0.8,
            min_squad_size: 3,
            max_gather_ticks: 1500,
            abandon_ticks: 4500,
            scatter_fraction: 0.6,
            max_scatter: 12.0,
            hostile_ratio: 2.0,
            threat_radius: 15.0,
            max_duration: 6000,
            progress_interval: 150,
            min_progress: 3.0,
            no_progress_ticks: 900,
            retreat_timeout: 900,
            cooldown: 1500,
            max_target_distance: 250.0,
        }
    }
}

/// Scouting task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Request priority.
    pub priority: f32,
    /// Scouts kept alive.
    pub unit_count: u32,
    /// Distinct cheap/fast types to request from.
    pub type_count: usize,
    /// Order attempts per target without getting closer.
    pub max_attempts: u32,
    /// Ticks per target without getting closer.
    pub max_target_ticks: u64,
    /// Ticks between two attempts.
    pub attempt_interval: u64,
    /// Disband once this fraction of the map has been seen.
    pub explored_threshold: f32,
    /// Tile stride of the local unexplored-tile search.
    pub search_step: i32,
    /// Distance at which a target counts as reached.
    pub arrival_radius: f32,
    /// Ticks between two scout spawns.
    pub cooldown: u64,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            priority: 10.0,
            unit_count: 1,
            type_count: 2,
            max_attempts: 5,
            max_target_ticks: 600,
            attempt_interval: 60,
            explored_threshold: 0.9,
            search_step: 8,
            arrival_radius: 3.0,
            cooldown: 300,
        }
    }
}

/// Retreat task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetreatConfig {
    /// Centroid distance from the rally point that ends the retreat.
    pub arrival_radius: f32,
    /// Ticks allowed before the retreat disbands anyway.
    pub timeout: u64,
}

impl Default for RetreatConfig {
    fn default() -> Self {
        Self {
            arrival_radius: 6.0,
            timeout: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        TacticsConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = TacticsConfig::from_ron_str("(squad: (command_interval: 30))").unwrap();
        assert_eq!(config.squad.command_interval, 30);
        assert_eq!(config.targeting.lock_ticks, 150);
        assert_eq!(config.scout.max_attempts, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = TacticsConfig::from_ron_str("(squad: (command_interval: 0))").unwrap_err();
        assert!(matches!(err, TacticsError::InvalidConfig { .. }));

        let err = TacticsConfig::from_ron_str("(attack: (ready_fraction: 1.5))").unwrap_err();
        assert!(err.to_string().contains("attack.ready_fraction"));
    }

    #[test]
    fn test_zero_idle_timeout_is_rejected() {
        let err = TacticsConfig::from_ron_str("(squad: (idle_timeout: 0))").unwrap_err();
        assert!(err.to_string().contains("squad.idle_timeout"));
    }

    #[test]
    fn test_decision_divisor() {
        let mut config = TacticsConfig::default();
        assert_eq!(config.decision_divisor(), 5);
        config.controller.apm = 10_000;
        assert_eq!(config.decision_divisor(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = TacticsConfig::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, TacticsError::ConfigNotFound(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = TacticsConfig::from_ron_str("(squad: ").unwrap_err();
        assert!(matches!(err, TacticsError::ConfigParse(_)));
    }
}
