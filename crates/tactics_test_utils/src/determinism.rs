//! Determinism testing utilities.
//!
//! The decision layer must issue identical orders given identical inputs,
//! so recorded games and batch tuning runs can be reproduced exactly.
//! Sources of non-determinism to watch for:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Anything that decides order (auction, batching, unit lists) iterates
//!   `BTreeMap`s or sorted vectors.
//!
//! - **Float ties**: comparisons use `total_cmp` and break ties on ids.
//!
//! - **System randomness**: none in the core; the headless sandbox seeds a
//!   `ChaCha8Rng` from the scenario.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tactics_core::world::{Order, UnitId};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Decision layer is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a scenario multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the scenario
/// * `ticks` - Number of decision ticks per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one decision tick
/// * `hash` - Function to compute the final state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for tick in 0..ticks {
            step(&mut state, tick);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Feed one order into a hasher. Floats are hashed by bit pattern.
pub fn hash_order<H: Hasher>(order: &Order, state: &mut H) {
    match order {
        Order::Move(p) => {
            0u8.hash(state);
            p.x.to_bits().hash(state);
            p.y.to_bits().hash(state);
        }
        Order::AttackMove(p) => {
            1u8.hash(state);
            p.x.to_bits().hash(state);
            p.y.to_bits().hash(state);
        }
        Order::Attack(target) => {
            2u8.hash(state);
            target.hash(state);
        }
        Order::Toggle(on) => {
            3u8.hash(state);
            on.hash(state);
        }
    }
}

/// Hash a log of issued orders.
#[must_use]
pub fn hash_order_log(calls: &[(Vec<UnitId>, Order)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (units, order) in calls {
        units.hash(&mut hasher);
        hash_order(order, &mut hasher);
    }
    hasher.finish()
}

/// Proptest strategies for decision-layer tests.
pub mod strategies {
    use glam::Vec2;
    use proptest::prelude::*;
    use tactics_core::world::UnitTypeId;

    use crate::fixtures::{RIFLE, TANK};

    /// Position on a `size` x `size` map.
    pub fn arb_position(size: u32) -> impl Strategy<Value = Vec2> {
        let max = size as f32 - 0.5;
        (0.0f32..max, 0.0f32..max).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// One of the two armed land types.
    pub fn arb_land_type() -> impl Strategy<Value = UnitTypeId> {
        prop_oneof![Just(RIFLE), Just(TANK)]
    }

    /// Own units to place: type and position.
    pub fn arb_placements(size: u32, max: usize) -> impl Strategy<Value = Vec<(UnitTypeId, Vec2)>> {
        prop::collection::vec((arb_land_type(), arb_position(size)), 0..max)
    }

    /// A request composition over the armed land types.
    pub fn arb_composition() -> impl Strategy<Value = Vec<(UnitTypeId, u32)>> {
        (0u32..6, 0u32..6)
            .prop_filter("non-empty composition", |(a, b)| a + b > 0)
            .prop_map(|(rifles, tanks)| {
                [(RIFLE, rifles), (TANK, tanks)]
                    .into_iter()
                    .filter(|(_, n)| *n > 0)
                    .collect()
            })
    }

    /// Base priority for a mission.
    pub fn arb_priority() -> impl Strategy<Value = f32> {
        1.0f32..100.0
    }
}
