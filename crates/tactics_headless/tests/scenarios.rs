//! Shipped scenario files and end-to-end sandbox runs.

use std::path::PathBuf;

use tactics_core::config::TacticsConfig;
use tactics_headless::batch::verify_determinism;
use tactics_headless::metrics::Outcome;
use tactics_headless::runner::{run_scenario, RunConfig};
use tactics_headless::scenario::{Scenario, ScenarioError};

fn crate_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn shipped_scenarios() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(crate_path("scenarios"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "ron"))
        .collect();
    paths.sort();
    paths
}

#[test]
fn test_every_shipped_scenario_loads() {
    let paths = shipped_scenarios();
    assert!(paths.len() >= 3);
    for path in paths {
        let scenario = Scenario::load(&path)
            .unwrap_or_else(|e| panic!("{} failed to load: {}", path.display(), e));
        assert!(!scenario.catalog().types().is_empty());
    }
}

#[test]
fn test_shipped_files_match_builtins() {
    for name in ["skirmish", "coastal"] {
        let file = Scenario::load(crate_path(&format!("scenarios/{name}.ron"))).unwrap();
        let builtin = Scenario::builtin(name).unwrap();
        assert_eq!(file.name, builtin.name);
        assert_eq!(file.map_size, builtin.map_size);
        assert_eq!(file.catalog(), builtin.catalog());
        assert_eq!(file.player.units.len(), builtin.player.units.len());
        assert_eq!(file.opponents.len(), builtin.opponents.len());
    }
}

#[test]
fn test_sample_tuning_loads() {
    let config = TacticsConfig::load(crate_path("config/tactics.ron")).unwrap();
    assert_eq!(config.attack.composition_size, 8);
    // Untouched sections keep their defaults.
    assert_eq!(config.naval, TacticsConfig::default().naval);
}

#[test]
fn test_scenario_from_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.ron");
    std::fs::write(
        &path,
        r#"
        Scenario(
            name: "Tiny",
            description: "",
            map_size: (12, 12),
            unit_types: [
                UnitTypeSetup(id: 1, name: "rifle", speed: 0.1, weapon_range: 4.0, damage: 2.0, hit_points: 10.0),
            ],
            player: PlayerSetup(
                player: 1,
                rally: (2.0, 2.0),
                units: [UnitPlacement(kind: "rifle", position: (3.0, 3.0), count: 3)],
            ),
            opponents: [
                PlayerSetup(
                    player: 2,
                    rally: (10.0, 10.0),
                    units: [UnitPlacement(kind: "rifle", position: (5.0, 3.0), count: 1)],
                ),
            ],
            reveal_map: true,
            max_ticks: 500,
        )
        "#,
    )
    .unwrap();

    let scenario = Scenario::resolve(path.to_str().unwrap()).unwrap();
    let metrics = run_scenario(&scenario, &RunConfig::new(0)).unwrap();
    // Three rifles in range of a lone hostile rifle win the exchange.
    assert_eq!(metrics.outcome, Outcome::Victory);
    assert_eq!(metrics.hostiles_killed, 1);
    assert!(metrics.duration_ticks < 500);
}

#[test]
fn test_broken_file_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "Scenario(name: ").unwrap();
    let err = Scenario::load(&path).unwrap_err();
    assert!(matches!(err, ScenarioError::ParseError(_)));
}

#[test]
fn test_crossfire_spawns_attacks() {
    let scenario = Scenario::load(crate_path("scenarios/crossfire.ron")).unwrap();
    let metrics = run_scenario(&scenario, &RunConfig::new(3).with_max_ticks(400)).unwrap();
    assert!(metrics.missions_spawned.get("attack").copied().unwrap_or(0) >= 1);
    assert!(metrics.units_granted > 0);
    assert_eq!(metrics.faults, 0);
}

#[test]
fn test_coastal_is_deterministic() {
    let scenario = Scenario::load(crate_path("scenarios/coastal.ron")).unwrap();
    let config = RunConfig::new(99).with_max_ticks(1500);
    assert!(verify_determinism(&scenario, &config, 2).unwrap());
}

#[test]
fn test_different_seeds_change_layout_not_validity() {
    let scenario = Scenario::skirmish();
    for seed in [1, 2] {
        let metrics = run_scenario(&scenario, &RunConfig::new(seed).with_max_ticks(300)).unwrap();
        assert_eq!(metrics.seed, seed);
        assert_eq!(metrics.outcome, Outcome::TimeLimit);
    }
}
