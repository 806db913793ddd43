//! Headless sandbox for the tactical decision layer.
//!
//! Runs the mission controller from `tactics_core` against a small
//! deterministic sandbox world so mission behaviour can be tested and tuned
//! without a game engine. This enables:
//!
//! - **Tuning**: batch runs over many seeds with aggregate metrics
//! - **CI verification**: scenario smoke tests and determinism checks
//!
//! # Example
//!
//! ```bash
//! # Run one scenario and print its metrics
//! cargo run -p tactics_headless -- run --scenario skirmish
//!
//! # Run a custom scenario over 200 seeds
//! cargo run -p tactics_headless -- batch --scenario scenarios/coastal.ron --count 200
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --scenario skirmish --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod sandbox;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, Outcome, RunMetrics};
pub use runner::{run_scenario, standard_controller, RunConfig};
pub use sandbox::{OrderBuffer, Sandbox};
pub use scenario::{Scenario, ScenarioError};
