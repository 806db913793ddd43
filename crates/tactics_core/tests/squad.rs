//! Squad behaviour against a mock world.

use glam::Vec2;
use tactics_core::batcher::ActionBatcher;
use tactics_core::config::TacticsConfig;
use tactics_core::squad::{Squad, SquadState};
use tactics_core::world::Order;
use tactics_test_utils::fixtures::{standard_catalog, MockWorld, RIFLE};

// ============================================================================
// Gather / attack transitions
// ============================================================================

#[test]
fn test_gathering_advances_exactly_at_gather_radius() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    // Four units around (20, 20); gather radius for n = 4 is sqrt(4) * 1.5 + 3 = 6.
    let units = vec![
        world.spawn_own(RIFLE, Vec2::new(13.5, 20.0)),
        world.spawn_own(RIFLE, Vec2::new(26.5, 20.0)),
        world.spawn_own(RIFLE, Vec2::new(20.0, 13.5)),
        world.spawn_own(RIFLE, Vec2::new(20.0, 26.5)),
    ];
    let mut squad = Squad::new(Vec2::new(50.0, 50.0), SquadState::Gathering);
    let mut batcher = ActionBatcher::new();

    let report = squad.update(&world.context(0, &catalog, &config), &units, &mut batcher);
    assert_eq!(report.state, SquadState::Gathering);
    assert!((report.spread - 6.5).abs() < 1e-5);

    world.set_position(units[0], Vec2::new(14.0, 20.0));
    world.set_position(units[1], Vec2::new(26.0, 20.0));
    world.set_position(units[2], Vec2::new(20.0, 14.0));
    world.set_position(units[3], Vec2::new(20.0, 26.0));
    let report = squad.update(&world.context(1, &catalog, &config), &units, &mut batcher);
    assert_eq!(report.state, SquadState::Attacking);
}

#[test]
fn test_attacking_regathers_past_scatter_radius() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    // Scatter radius for n = 4 is sqrt(4) * 1.5 + 8 = 11.
    let units = vec![
        world.spawn_own(RIFLE, Vec2::new(9.0, 20.0)),
        world.spawn_own(RIFLE, Vec2::new(31.0, 20.0)),
        world.spawn_own(RIFLE, Vec2::new(20.0, 9.0)),
        world.spawn_own(RIFLE, Vec2::new(20.0, 31.0)),
    ];
    let mut squad = Squad::new(Vec2::new(50.0, 50.0), SquadState::Attacking);
    let mut batcher = ActionBatcher::new();

    let report = squad.update(&world.context(0, &catalog, &config), &units, &mut batcher);
    assert_eq!(report.state, SquadState::Attacking);

    world.set_position(units[0], Vec2::new(8.5, 20.0));
    world.set_position(units[1], Vec2::new(31.5, 20.0));
    world.set_position(units[2], Vec2::new(20.0, 8.5));
    world.set_position(units[3], Vec2::new(20.0, 31.5));
    let report = squad.update(&world.context(1, &catalog, &config), &units, &mut batcher);
    assert_eq!(report.state, SquadState::Gathering);
}

// ============================================================================
// Command throttling
// ============================================================================

#[test]
fn test_orders_only_on_command_ticks_and_only_when_changed() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let units = world.spawn_own_group(RIFLE, Vec2::new(10.0, 10.0), 2);
    let mut squad = Squad::new(Vec2::new(40.0, 40.0), SquadState::Exploring);
    let mut batcher = ActionBatcher::new();

    let run = |squad: &mut Squad, batcher: &mut ActionBatcher, tick| {
        squad
            .update(&world.context(tick, &catalog, &config), &units, batcher)
            .orders
    };

    assert_eq!(run(&mut squad, &mut batcher, 0), 2);
    assert_eq!(run(&mut squad, &mut batcher, 5), 0);
    assert_eq!(run(&mut squad, &mut batcher, 15), 0);
    squad.set_target(Vec2::new(30.0, 40.0));
    assert_eq!(run(&mut squad, &mut batcher, 20), 0);
    assert_eq!(run(&mut squad, &mut batcher, 30), 2);
    assert_eq!(
        squad.last_order(units[0]).and_then(|o| o.destination()),
        Some(Vec2::new(30.0, 40.0) + tactics_core::squad::formation_offset(0, 2))
    );
}

// ============================================================================
// Per-unit micro
// ============================================================================

#[test]
fn test_armed_units_attack_and_unarmed_follow_engaged_ally() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let a = world.spawn_own(RIFLE, Vec2::new(20.0, 20.0));
    let b = world.spawn_own(RIFLE, Vec2::new(21.0, 20.0));
    let c = world.spawn_own(RIFLE, Vec2::new(20.0, 22.0));
    world.edit(c, |u| u.weapon_range = 0.0);
    let enemy = world.spawn_hostile(RIFLE, Vec2::new(23.0, 20.0));
    let units = vec![a, b, c];

    let mut squad = Squad::new(Vec2::new(22.0, 20.0), SquadState::Attacking);
    let mut batcher = ActionBatcher::new();
    squad.update(&world.context(0, &catalog, &config), &units, &mut batcher);
    assert_eq!(squad.last_order(a), Some(Order::Attack(enemy)));
    assert_eq!(squad.last_order(b), Some(Order::Attack(enemy)));
    assert!(matches!(squad.last_order(c), Some(Order::AttackMove(_))));

    let report = squad.update(&world.context(15, &catalog, &config), &units, &mut batcher);
    assert!(report.engaged);
    assert_eq!(report.last_engagement, Some(15));
    assert_eq!(squad.last_order(c), Some(Order::AttackMove(Vec2::new(20.0, 20.0))));
}

#[test]
fn test_retreat_toggles_special_once_then_moves() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let unit = world.spawn_own(RIFLE, Vec2::new(30.0, 30.0));
    world.edit(unit, |u| u.has_special = true);
    world.spawn_hostile(RIFLE, Vec2::new(31.0, 30.0));

    let mut squad = Squad::new(Vec2::new(30.0, 30.0), SquadState::Attacking);
    squad.retreat_to(Vec2::new(5.0, 5.0));
    let mut batcher = ActionBatcher::new();

    squad.update(&world.context(0, &catalog, &config), &[unit], &mut batcher);
    assert_eq!(squad.last_order(unit), Some(Order::Toggle(true)));
    squad.update(&world.context(15, &catalog, &config), &[unit], &mut batcher);
    // Retreating ignores the adjacent enemy.
    assert!(matches!(squad.last_order(unit), Some(Order::Move(_))));
    assert_eq!(squad.state(), SquadState::Retreating);
}

#[test]
fn test_idle_search_with_zero_idle_timeout() {
    let catalog = standard_catalog();
    // Built directly so validation does not reject it.
    let mut config = TacticsConfig::default();
    config.squad.idle_timeout = 0;
    let mut world = MockWorld::new(64, 64);
    let target = Vec2::new(30.0, 30.0);
    let unit = world.spawn_own(RIFLE, target);

    let mut squad = Squad::new(target, SquadState::Attacking);
    let mut batcher = ActionBatcher::new();
    squad.update(&world.context(0, &catalog, &config), &[unit], &mut batcher);
    squad.update(&world.context(15, &catalog, &config), &[unit], &mut batcher);

    // Idle past the timeout: a search move away from the target.
    let order = squad.last_order(unit).unwrap();
    assert!(matches!(order, Order::AttackMove(_)));
    let destination = order.destination().unwrap();
    assert!(destination.distance(target) > 1.0);
}

// ============================================================================
// Stuck detection and recovery
// ============================================================================

#[test]
fn test_stuck_unit_gets_recovery_order() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let stuck = world.spawn_own(RIFLE, Vec2::new(10.0, 10.0));
    let b = world.spawn_own(RIFLE, Vec2::new(12.0, 10.0));
    let c = world.spawn_own(RIFLE, Vec2::new(10.0, 12.0));
    let units = vec![stuck, b, c];
    let target = Vec2::new(50.0, 50.0);

    let mut squad = Squad::new(target, SquadState::Exploring);
    let mut batcher = ActionBatcher::new();
    squad.update(&world.context(0, &catalog, &config), &units, &mut batcher);
    let first = squad.last_order(stuck).and_then(|o| o.destination());
    assert!(first.is_some());

    for tick in (15..=120).step_by(15) {
        let step = tick as f32 * 0.05;
        world.set_position(b, Vec2::new(12.0 + step, 10.0 + step));
        world.set_position(c, Vec2::new(10.0 + step, 12.0 + step));
        // The stuck unit jitters well below the movement threshold.
        world.set_position(stuck, Vec2::new(10.0 + (tick % 30) as f32 * 0.01, 10.0));
        squad.update(&world.context(tick, &catalog, &config), &units, &mut batcher);
    }

    let track = squad.track(stuck).unwrap();
    assert_eq!(track.stuck_attempts, 1);
    let recovery = squad.last_order(stuck).and_then(|o| o.destination());
    assert!(matches!(squad.last_order(stuck), Some(Order::Move(_))));
    assert_ne!(recovery, first);
    assert_eq!(squad.track(b).unwrap().stuck_attempts, 0);
    assert_eq!(squad.track(c).unwrap().stuck_attempts, 0);
}

#[test]
fn test_recovery_avoids_blocked_terrain() {
    use tactics_core::math::Tile;
    use tactics_core::world::{Terrain, WorldView};

    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let unit = world.spawn_own(RIFLE, Vec2::new(10.5, 10.5));
    // Wall across the straight line to the target.
    world.fill_terrain(Tile::new(11, 9), Tile::new(15, 11), Terrain::Blocked);

    let mut squad = Squad::new(Vec2::new(40.0, 10.5), SquadState::Exploring);
    let mut batcher = ActionBatcher::new();
    for tick in (0..=120).step_by(15) {
        squad.update(&world.context(tick, &catalog, &config), &[unit], &mut batcher);
    }
    let escape = squad
        .last_order(unit)
        .and_then(|o| o.destination())
        .unwrap();
    let tile = Tile::containing(escape);
    assert_ne!(tile, Tile::new(10, 10));
    assert_eq!(world.terrain(tile), Terrain::Land);
}

// ============================================================================
// Per-unit state eviction
// ============================================================================

#[test]
fn test_tracks_are_evicted_when_units_leave() {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut world = MockWorld::new(64, 64);
    let units = world.spawn_own_group(RIFLE, Vec2::new(10.0, 10.0), 3);
    let mut squad = Squad::new(Vec2::new(40.0, 40.0), SquadState::Exploring);
    let mut batcher = ActionBatcher::new();

    squad.update(&world.context(0, &catalog, &config), &units, &mut batcher);
    assert_eq!(squad.tracked_units(), 3);

    world.kill(units[2]);
    squad.update(&world.context(1, &catalog, &config), &units[..2], &mut batcher);
    assert_eq!(squad.tracked_units(), 2);
    assert!(squad.last_order(units[2]).is_none());

    squad.release(units[1]);
    assert_eq!(squad.tracked_units(), 1);
}
