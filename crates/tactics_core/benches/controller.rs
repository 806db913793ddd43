//! Decision-tick benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use tactics_core::config::TacticsConfig;
use tactics_core::controller::MissionController;
use tactics_core::factory::{AttackFactory, NavalFactory, ScoutFactory};
use tactics_test_utils::fixtures::{standard_catalog, MockWorld, RecordingSink, BIKE, RIFLE, TANK};

fn populated_world(units: usize) -> MockWorld {
    let mut world = MockWorld::new(128, 128).with_rally(Vec2::new(10.0, 10.0));
    for i in 0..units {
        let unit_type = match i % 3 {
            0 => RIFLE,
            1 => TANK,
            _ => BIKE,
        };
        let x = 5.0 + (i % 16) as f32;
        let y = 5.0 + (i / 16) as f32;
        world.spawn_own(unit_type, Vec2::new(x, y));
    }
    for i in 0..units / 2 {
        let x = 90.0 + (i % 10) as f32 * 2.0;
        let y = 90.0 + (i / 10) as f32 * 2.0;
        world.spawn_hostile(RIFLE, Vec2::new(x, y));
    }
    world
}

/// One decision tick with the standard factories over growing unit counts.
pub fn controller_benchmark(c: &mut Criterion) {
    let catalog = standard_catalog();
    let config = TacticsConfig::default();
    let mut group = c.benchmark_group("on_ai_update");

    for units in [16usize, 64, 256] {
        let world = populated_world(units);
        group.bench_with_input(BenchmarkId::from_parameter(units), &world, |b, world| {
            let mut controller = MissionController::new();
            controller.register_factory(Box::new(AttackFactory::new()));
            controller.register_factory(Box::new(NavalFactory::new()));
            controller.register_factory(Box::new(ScoutFactory::new()));
            let mut sink = RecordingSink::new();
            let mut tick = 0u64;
            b.iter(|| {
                let ctx = world.context(tick, &catalog, &config);
                let report = controller.on_ai_update(&ctx, &mut sink);
                sink.clear();
                tick += 1;
                black_box(report)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, controller_benchmark);
criterion_main!(benches);
