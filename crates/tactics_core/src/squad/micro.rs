//! Per-unit target selection.

use crate::config::SquadConfig;
use crate::world::{UnitId, UnitSnapshot};

/// Lower bound on target health when computing the low-health bonus.
const MIN_HEALTH_FRACTION: f32 = 0.05;

/// How much `attacker` wants to shoot `target` at `distance`.
///
/// Zero means "do not engage": the decay reaches zero at
/// `range_decay * weapon_range`, so unarmed attackers never engage.
#[must_use]
pub fn attack_weight(
    attacker: &UnitSnapshot,
    target: &UnitSnapshot,
    distance: f32,
    config: &SquadConfig,
) -> f32 {
    let reach = attacker.weapon_range * config.range_decay;
    if reach <= 0.0 || distance >= reach {
        return 0.0;
    }
    let decay = 1.0 - distance / reach;

    let mut weight = if target.is_structure {
        config.structure_weight
    } else if target.is_combatant() {
        config.combatant_weight
    } else {
        config.other_weight
    };
    if attacker.domain.is_seaborne() && target.domain.is_seaborne() {
        weight += config.seaborne_bonus;
    }
    weight += config.low_health_bonus / target.health.max(MIN_HEALTH_FRACTION);
    if distance <= attacker.weapon_range {
        weight += config.in_range_bonus;
    }
    weight * decay
}

/// Highest-weight hostile, ties broken by lowest id.
#[must_use]
pub fn pick_target(
    attacker: &UnitSnapshot,
    hostiles: &[(UnitSnapshot, f32)],
    config: &SquadConfig,
) -> Option<UnitId> {
    hostiles
        .iter()
        .map(|(h, d)| (h.id, attack_weight(attacker, h, *d, config)))
        .filter(|(_, w)| *w > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::world::{MovementDomain, PlayerId, UnitTypeId};

    fn unit(id: u64, range: f32, health: f32, structure: bool) -> UnitSnapshot {
        UnitSnapshot {
            id: UnitId(id),
            unit_type: UnitTypeId(1),
            owner: PlayerId(1),
            position: Vec2::ZERO,
            weapon_range: range,
            health,
            domain: MovementDomain::Land,
            is_structure: structure,
            is_high_value: false,
            has_special: false,
        }
    }

    #[test]
    fn test_weight_decays_to_zero_at_reach() {
        let config = SquadConfig::default();
        let attacker = unit(1, 4.0, 1.0, false);
        let target = unit(2, 4.0, 1.0, false);
        assert_eq!(attack_weight(&attacker, &target, 10.0, &config), 0.0);
        assert!(attack_weight(&attacker, &target, 9.9, &config) > 0.0);
    }

    #[test]
    fn test_in_range_and_low_health_raise_weight() {
        let config = SquadConfig::default();
        let attacker = unit(1, 4.0, 1.0, false);
        let healthy = unit(2, 4.0, 1.0, false);
        let wounded = unit(3, 4.0, 0.2, false);
        let near = attack_weight(&attacker, &healthy, 3.0, &config);
        let just_outside = attack_weight(&attacker, &healthy, 4.5, &config);
        assert!(near > just_outside);
        assert!(
            attack_weight(&attacker, &wounded, 3.0, &config)
                > attack_weight(&attacker, &healthy, 3.0, &config)
        );
    }

    #[test]
    fn test_unarmed_never_engages() {
        let config = SquadConfig::default();
        let scout = unit(1, 0.0, 1.0, false);
        let hostiles = [(unit(2, 4.0, 0.1, false), 1.0)];
        assert_eq!(pick_target(&scout, &hostiles, &config), None);
    }

    #[test]
    fn test_prefers_combatants_over_structures() {
        let config = SquadConfig::default();
        let attacker = unit(1, 5.0, 1.0, false);
        let hostiles = [
            (unit(10, 0.0, 1.0, true), 3.0),
            (unit(11, 3.0, 1.0, false), 3.0),
        ];
        assert_eq!(pick_target(&attacker, &hostiles, &config), Some(UnitId(11)));
    }

    #[test]
    fn test_seaborne_bonus() {
        let config = SquadConfig::default();
        let mut ship = unit(1, 5.0, 1.0, false);
        ship.domain = MovementDomain::Naval;
        let mut enemy_ship = unit(2, 5.0, 1.0, false);
        enemy_ship.domain = MovementDomain::Naval;
        let tank = unit(3, 5.0, 1.0, false);
        assert!(
            attack_weight(&ship, &enemy_ship, 2.0, &config)
                > attack_weight(&ship, &tank, 2.0, &config)
        );
    }
}
