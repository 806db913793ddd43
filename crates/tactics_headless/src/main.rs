//! Headless tactics sandbox.
//!
//! Runs the decision layer against scripted scenarios without a game engine.
//! Designed for CI smoke tests, determinism checks and tuning sweeps.
//!
//! # Usage
//!
//! ```bash
//! # Run a single scenario and print its metrics as JSON
//! cargo run -p tactics_headless -- run --scenario skirmish --seed 7
//!
//! # Run a batch and write results/batch_results.json
//! cargo run -p tactics_headless -- batch --scenario coastal --count 100 --output results/
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --scenario skirmish --runs 5
//!
//! # Print the effective tuning values
//! cargo run -p tactics_headless -- config --tactics tuning.ron
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level picked by `--verbose`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tactics_core::config::TacticsConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tactics_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    metrics::Outcome,
    runner::{run_scenario, RunConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless sandbox for the tactical decision layer")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Layout seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick budget (defaults to the scenario's)
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Tactics tuning file (RON)
        #[arg(short, long)]
        tactics: Option<PathBuf>,

        /// Write metrics JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run one scenario over many seeds
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Number of runs
        #[arg(short, long, default_value = "20")]
        count: u32,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick budget per run (defaults to the scenario's)
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Tactics tuning file (RON)
        #[arg(short, long)]
        tactics: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick budget per run
        #[arg(long, default_value = "3000")]
        max_ticks: u64,
    },

    /// Validate a tuning file and print the effective values
    Config {
        /// Tactics tuning file (RON); defaults when absent
        #[arg(short, long)]
        tactics: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs on stderr; stdout carries JSON output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            max_ticks,
            tactics,
            output,
        } => cmd_run(&scenario, seed, max_ticks, tactics, output),
        Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
            tactics,
        } => cmd_batch(scenario, count, parallel, output, seed, max_ticks, tactics),
        Commands::Verify {
            scenario,
            seed,
            runs,
            max_ticks,
        } => cmd_verify(&scenario, seed, runs, max_ticks),
        Commands::Config { tactics } => cmd_config(tactics),
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, scenario = %name, "Failed to load scenario");
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_tactics(path: Option<PathBuf>) -> TacticsConfig {
    let Some(path) = path else {
        return TacticsConfig::default();
    };
    match TacticsConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load tactics config");
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run a single scenario
fn cmd_run(
    scenario: &str,
    seed: u64,
    max_ticks: Option<u64>,
    tactics: Option<PathBuf>,
    output: Option<PathBuf>,
) {
    let scenario = load_scenario(scenario);
    let mut config = RunConfig::new(seed).with_tactics(load_tactics(tactics));
    config.max_ticks = max_ticks;

    let metrics = match run_scenario(&scenario, &config) {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&metrics) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("FATAL: Failed to serialize metrics: {}", e);
            std::process::exit(1);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("FATAL: Failed to write '{}': {}", path.display(), e);
                std::process::exit(1);
            }
            eprintln!("Metrics saved to: {}", path.display());
        }
        None => println!("{json}"),
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("RUN COMPLETE: {}", scenario.name);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Outcome: {:?} after {} ticks", metrics.outcome, metrics.duration_ticks);
    eprintln!("Missions spawned: {:?}", metrics.missions_spawned);
    eprintln!("Missions removed: {:?}", metrics.missions_removed);
    eprintln!(
        "Units: {} granted, {} reclaimed, {} lost, {} hostiles killed",
        metrics.units_granted, metrics.units_reclaimed, metrics.units_lost, metrics.hostiles_killed
    );
    eprintln!("Order calls: {}", metrics.order_calls);
}

/// Run a batch
fn cmd_batch(
    scenario: String,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_ticks: Option<u64>,
    tactics: Option<PathBuf>,
) {
    tracing::info!(
        scenario = %scenario,
        count = count,
        parallel = parallel,
        seed = seed,
        output = %output.display(),
        max_ticks = ?max_ticks,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let config = BatchConfig {
        scenario,
        run_count: count,
        parallel_runs: parallel,
        output_dir: output.clone(),
        seed_start: seed,
        max_ticks,
        tactics_path: tactics,
    };

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {}", e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Runs: {}", results.runs.len());
    if !results.errors.is_empty() {
        eprintln!("Runs FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("\nOutcomes:");
    for outcome in [Outcome::Victory, Outcome::Defeat, Outcome::TimeLimit] {
        eprintln!("  {:?}: {:.1}%", outcome, summary.rate(outcome) * 100.0);
    }
    eprintln!(
        "Average: {:.0} ticks, {:.0} order calls, {:.1} lost, {:.1} killed",
        summary.avg_duration_ticks,
        summary.avg_order_calls,
        summary.avg_units_lost,
        summary.avg_hostiles_killed
    );
    eprintln!("Missions spawned: {:?}", summary.missions_spawned);
    eprintln!("Missions removed: {:?}", summary.missions_removed);
    if summary.faults > 0 {
        eprintln!("Faulted mission updates: {}", summary.faults);
    }

    for error in results.errors.iter().take(10) {
        eprintln!("  Run {} (seed {}): {}", error.run_index, error.seed, error.message);
    }
    if results.errors.len() > 10 {
        eprintln!("  ... and {} more failures", results.errors.len() - 10);
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32, max_ticks: u64) {
    tracing::info!("Verifying determinism: {} runs with seed {}", runs, seed);

    let scenario = load_scenario(scenario);
    let config = RunConfig::new(seed).with_max_ticks(max_ticks);
    match verify_determinism(&scenario, &config, runs) {
        Ok(true) => eprintln!("Determinism verified: {} identical runs", runs),
        Ok(false) => {
            eprintln!("DETERMINISM FAILURE: runs diverged");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print effective tuning values
fn cmd_config(tactics: Option<PathBuf>) {
    let config = load_tactics(tactics);
    match ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("FATAL: Failed to serialize config: {}", e);
            std::process::exit(1);
        }
    }
    eprintln!(
        "Decision divisor: {} raw ticks per decision",
        config.decision_divisor()
    );
}
