//! Single sandbox run.
//!
//! Drives one [`MissionController`] against one [`Sandbox`] for a bounded
//! number of raw ticks. The controller only runs on decision ticks as
//! decided by the [`DecisionClock`]; the sandbox steps every raw tick.

use tactics_core::config::TacticsConfig;
use tactics_core::controller::{DecisionClock, MissionController};
use tactics_core::factory::{AttackFactory, NavalFactory, ScoutFactory};
use tactics_core::world::Awareness;
use tracing::{debug, info};

use crate::metrics::{OrderHasher, Outcome, RunMetrics};
use crate::sandbox::{OrderBuffer, Sandbox, SandboxEvent};
use crate::scenario::{Scenario, ScenarioError};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Seed for the sandbox layout.
    pub seed: u64,
    /// Tick budget; `None` uses the scenario's own.
    pub max_ticks: Option<u64>,
    /// Decision layer tuning.
    pub tactics: TacticsConfig,
}

impl RunConfig {
    /// Defaults with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_ticks: None,
            tactics: TacticsConfig::default(),
        }
    }

    /// Override the tick budget.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Use a specific tactics configuration.
    pub fn with_tactics(mut self, tactics: TacticsConfig) -> Self {
        self.tactics = tactics;
        self
    }
}

/// A controller with every mission factory registered.
#[must_use]
pub fn standard_controller() -> MissionController {
    let mut controller = MissionController::new();
    controller.register_factory(Box::new(AttackFactory::new()));
    controller.register_factory(Box::new(NavalFactory::new()));
    controller.register_factory(Box::new(ScoutFactory::new()));
    controller
}

/// Run a scenario to completion or until the tick budget runs out.
pub fn run_scenario(scenario: &Scenario, config: &RunConfig) -> Result<RunMetrics, ScenarioError> {
    config.tactics.validate()?;
    let mut sandbox = Sandbox::from_scenario(scenario, config.seed)?;
    let catalog = scenario.catalog();
    let clock = DecisionClock::new(&config.tactics);
    let max_ticks = config.max_ticks.unwrap_or(scenario.max_ticks);

    let mut controller = standard_controller();
    let mut buffer = OrderBuffer::new();
    let mut hasher = OrderHasher::new();
    let mut metrics = RunMetrics::new(&scenario.name, config.seed);
    let mut outcome = Outcome::TimeLimit;

    info!(
        scenario = %scenario.name,
        seed = config.seed,
        max_ticks,
        divisor = clock.divisor(),
        "Starting run"
    );

    while sandbox.tick() < max_ticks {
        let tick = sandbox.tick();
        if clock.is_decision_tick(tick) {
            let report = {
                let ctx = sandbox.context(&catalog, &config.tactics);
                controller.on_ai_update(&ctx, &mut buffer)
            };
            metrics.record_report(&report, controller.missions().len(), |name| {
                controller.mission(name).map(|m| m.kind().to_string())
            });
            let calls = buffer.take();
            for (units, order) in &calls {
                hasher.record(tick, units, *order);
            }
            sandbox.apply_orders(calls);
        }

        if sandbox.production_due() {
            let requests = controller.requested_unit_types();
            if let Some(id) = sandbox.produce(&requests) {
                let unit_type = sandbox.get(id).map(|u| u.snapshot.unit_type);
                if let Some(unit_type) = unit_type {
                    let name = sandbox.type_name(unit_type).to_string();
                    metrics.record_unit_produced(tick, &name);
                }
            }
        }

        for event in sandbox.step() {
            match event {
                SandboxEvent::Lost { unit_type, .. } => {
                    let name = sandbox.type_name(unit_type).to_string();
                    metrics.record_unit_lost(tick, &name);
                }
                SandboxEvent::Killed { unit_type, .. } => {
                    let name = sandbox.type_name(unit_type).to_string();
                    metrics.record_hostile_killed(tick, &name);
                }
            }
        }

        if let Some(end) = sandbox.outcome() {
            debug!(tick = sandbox.tick(), outcome = ?end, "Run decided");
            outcome = end;
            break;
        }
    }

    metrics.finalize(
        sandbox.tick(),
        outcome,
        sandbox.explored_fraction(),
        hasher.finish(),
    );
    info!(
        scenario = %scenario.name,
        seed = config.seed,
        outcome = ?metrics.outcome,
        ticks = metrics.duration_ticks,
        orders = metrics.order_calls,
        "Run complete"
    );
    Ok(metrics)
}
