//! Batch runner.
//!
//! Runs one scenario over many seeds in parallel using rayon and collects
//! the per-run metrics plus an aggregate summary.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tactics_core::config::TacticsConfig;
use tracing::{debug, info, warn};

use crate::metrics::{BatchSummary, RunMetrics};
use crate::runner::{run_scenario, RunConfig};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or RON path
    pub scenario: String,
    /// Number of runs
    pub run_count: u32,
    /// Worker threads (0 = use rayon default)
    pub parallel_runs: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Seed of the first run; run `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Tick budget override
    pub max_ticks: Option<u64>,
    /// Tactics configuration file (defaults when absent)
    pub tactics_path: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "skirmish".to_string(),
            run_count: 20,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: None,
            tactics_path: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, run_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            run_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick budget
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Load tactics tuning from a RON file
    pub fn with_tactics(mut self, path: PathBuf) -> Self {
        self.tactics_path = Some(path);
        self
    }

    /// Set worker threads
    pub fn with_parallelism(mut self, threads: u32) -> Self {
        self.parallel_runs = threads;
        self
    }

    /// Load the tactics configuration this batch runs with
    pub fn tactics(&self) -> Result<TacticsConfig, ScenarioError> {
        match &self.tactics_path {
            Some(path) => Ok(TacticsConfig::load(path)?),
            None => Ok(TacticsConfig::default()),
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual run metrics, in seed order
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total wall-clock runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index
    pub run_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Run a batch.
///
/// Fails up front when the scenario or tactics file cannot be loaded;
/// per-run failures are collected in [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let scenario = Scenario::resolve(&config.scenario)?;
    let tactics = config.tactics()?;

    info!(
        "Starting batch run: {} runs of '{}'",
        config.run_count, scenario.name
    );

    let completed = AtomicU32::new(0);
    let run_one = |i: u32| -> Result<RunMetrics, BatchError> {
        let seed = config.seed_start.wrapping_add(u64::from(i));
        let mut run_config = RunConfig::new(seed).with_tactics(tactics.clone());
        run_config.max_ticks = config.max_ticks;
        let result = run_scenario(&scenario, &run_config).map_err(|e| {
            warn!("Run {} failed: {}", i, e);
            BatchError {
                run_index: i,
                seed,
                message: e.to_string(),
            }
        });
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % 10 == 0 {
            debug!("Progress: {}/{}", done, config.run_count);
        }
        result
    };

    let results: Vec<Result<RunMetrics, BatchError>> = if config.parallel_runs > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build()
        {
            Ok(pool) => pool.install(|| (0..config.run_count).into_par_iter().map(run_one).collect()),
            Err(e) => {
                warn!("Could not build a dedicated pool ({}), using the global one", e);
                (0..config.run_count).into_par_iter().map(run_one).collect()
            }
        }
    } else {
        (0..config.run_count).into_par_iter().map(run_one).collect()
    };

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} runs in {:.1}s ({} failed)",
        runs.len(),
        duration_seconds,
        errors.len()
    );

    Ok(BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    })
}

/// Verify determinism by running the same seed several times.
///
/// Runs must agree on the order stream, the outcome and the losses.
pub fn verify_determinism(
    scenario: &Scenario,
    config: &RunConfig,
    runs: u32,
) -> Result<bool, ScenarioError> {
    let results = (0..runs)
        .map(|_| run_scenario(scenario, config))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = results.first() else {
        return Ok(true);
    };
    Ok(results.iter().all(|r| {
        r.order_hash == first.order_hash
            && r.duration_ticks == first.duration_ticks
            && r.outcome == first.outcome
            && r.units_lost == first.units_lost
            && r.hostiles_killed == first.hostiles_killed
    }))
}
