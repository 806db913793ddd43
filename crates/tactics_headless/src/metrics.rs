//! Run metrics collection.
//!
//! Every sandbox run produces one [`RunMetrics`] record: what the decision
//! layer did (missions, allocations, orders), what happened on the map
//! (production, losses, kills) and a hash of the full order stream used for
//! determinism checks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tactics_core::controller::TickReport;
use tactics_core::world::{Order, UnitId};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    /// Every hostile unit and structure destroyed.
    Victory,
    /// Nothing of ours left.
    Defeat,
    /// The tick budget ran out first.
    TimeLimit,
}

/// Complete metrics for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Unique run identifier.
    pub run_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Raw ticks simulated.
    pub duration_ticks: u64,
    /// How the run ended.
    pub outcome: Outcome,
    /// Ticks on which the controller ran.
    pub decision_ticks: u64,
    /// Missions spawned, by kind.
    pub missions_spawned: BTreeMap<String, u32>,
    /// Missions removed, by disband reason.
    pub missions_removed: BTreeMap<String, u32>,
    /// Most missions alive at once.
    pub peak_missions: usize,
    /// Units handed out from the idle pool.
    pub units_granted: u64,
    /// Units taken from lower-priority missions.
    pub units_reclaimed: u64,
    /// Mission updates that returned an error.
    pub faults: u64,
    /// Host order calls issued.
    pub order_calls: u64,
    /// Units produced by type name.
    pub units_produced: BTreeMap<String, u32>,
    /// Own units and structures destroyed.
    pub units_lost: u32,
    /// Hostile units and structures destroyed.
    pub hostiles_killed: u32,
    /// Explored map fraction at the end of the run.
    pub explored_fraction: f32,
    /// Hash over every issued order, in order.
    pub order_hash: u64,
    /// Timed events log.
    pub events: Vec<TimedEvent>,
}

impl RunMetrics {
    /// Create a new metrics record.
    #[must_use]
    pub fn new(scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            run_id: format!("run_{seed}"),
            scenario: scenario.into(),
            seed,
            duration_ticks: 0,
            outcome: Outcome::TimeLimit,
            decision_ticks: 0,
            missions_spawned: BTreeMap::new(),
            missions_removed: BTreeMap::new(),
            peak_missions: 0,
            units_granted: 0,
            units_reclaimed: 0,
            faults: 0,
            order_calls: 0,
            units_produced: BTreeMap::new(),
            units_lost: 0,
            hostiles_killed: 0,
            explored_fraction: 0.0,
            order_hash: OrderHasher::new().finish(),
            events: Vec::new(),
        }
    }

    /// Fold one controller tick into the totals.
    ///
    /// `kind_of` maps a spawned mission name to its kind label.
    pub fn record_report(
        &mut self,
        report: &TickReport,
        missions_alive: usize,
        kind_of: impl Fn(&str) -> Option<String>,
    ) {
        self.decision_ticks += 1;
        self.units_granted += report.granted as u64;
        self.units_reclaimed += report.reclaimed as u64;
        self.faults += report.faults as u64;
        self.order_calls += report.orders as u64;
        self.peak_missions = self.peak_missions.max(missions_alive);

        for name in &report.spawned {
            let kind = kind_of(name).unwrap_or_else(|| "unknown".to_string());
            *self.missions_spawned.entry(kind).or_default() += 1;
            self.record_event(report.tick, EventType::MissionSpawned, name);
        }
        for removal in &report.removed {
            let reason = removal
                .reason
                .map_or_else(|| "None".to_string(), |r| format!("{r:?}"));
            *self.missions_removed.entry(reason.clone()).or_default() += 1;
            self.record_event(
                report.tick,
                EventType::MissionRemoved,
                &format!("{} ({reason}, {} units released)", removal.name, removal.released),
            );
        }
    }

    /// Record a unit production.
    pub fn record_unit_produced(&mut self, tick: u64, unit_type: &str) {
        *self
            .units_produced
            .entry(unit_type.to_string())
            .or_default() += 1;
        self.record_event(tick, EventType::UnitProduced, unit_type);
    }

    /// Record an own unit death.
    pub fn record_unit_lost(&mut self, tick: u64, unit_type: &str) {
        self.units_lost += 1;
        self.record_event(tick, EventType::UnitLost, unit_type);
    }

    /// Record a hostile unit kill.
    pub fn record_hostile_killed(&mut self, tick: u64, unit_type: &str) {
        self.hostiles_killed += 1;
        self.record_event(tick, EventType::HostileKilled, unit_type);
    }

    /// Record a timed event.
    pub fn record_event(&mut self, tick: u64, event_type: EventType, details: &str) {
        self.events.push(TimedEvent {
            tick,
            event_type,
            details: details.to_string(),
        });
    }

    /// Finalize the run with its outcome.
    pub fn finalize(&mut self, duration: u64, outcome: Outcome, explored: f32, order_hash: u64) {
        self.duration_ticks = duration;
        self.outcome = outcome;
        self.explored_fraction = explored;
        self.order_hash = order_hash;
    }
}

/// A timed event during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Type of event.
    pub event_type: EventType,
    /// Event details.
    pub details: String,
}

/// Types of events that can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A mission was added.
    MissionSpawned,
    /// A mission was disbanded and removed.
    MissionRemoved,
    /// The production stub finished a unit.
    UnitProduced,
    /// One of ours died.
    UnitLost,
    /// A hostile died.
    HostileKilled,
}

/// FNV-1a over the order stream.
///
/// Stable across platforms and builds, unlike the std hasher.
#[derive(Debug, Clone, Copy)]
pub struct OrderHasher(u64);

impl OrderHasher {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Empty hash state.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    /// Mix in one order call.
    pub fn record(&mut self, tick: u64, units: &[UnitId], order: Order) {
        self.write(&tick.to_le_bytes());
        for unit in units {
            self.write(&unit.0.to_le_bytes());
        }
        match order {
            Order::Move(p) => {
                self.write(&[0]);
                self.write(&p.x.to_bits().to_le_bytes());
                self.write(&p.y.to_bits().to_le_bytes());
            }
            Order::AttackMove(p) => {
                self.write(&[1]);
                self.write(&p.x.to_bits().to_le_bytes());
                self.write(&p.y.to_bits().to_le_bytes());
            }
            Order::Attack(target) => {
                self.write(&[2]);
                self.write(&target.0.to_le_bytes());
            }
            Order::Toggle(on) => self.write(&[3, u8::from(on)]),
        }
    }

    /// Current hash value.
    #[must_use]
    pub fn finish(&self) -> u64 {
        self.0
    }
}

impl Default for OrderHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics across multiple runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_runs: u32,
    /// Runs per outcome name.
    pub outcomes: BTreeMap<String, u32>,
    /// Average run duration in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest run.
    pub min_duration_ticks: u64,
    /// Longest run.
    pub max_duration_ticks: u64,
    /// Average order calls per run.
    pub avg_order_calls: f64,
    /// Average own losses per run.
    pub avg_units_lost: f64,
    /// Average hostile kills per run.
    pub avg_hostiles_killed: f64,
    /// Missions spawned per kind, summed over runs.
    pub missions_spawned: BTreeMap<String, u32>,
    /// Mission removals per reason, summed over runs.
    pub missions_removed: BTreeMap<String, u32>,
    /// Faulted mission updates, summed over runs.
    pub faults: u64,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let count = runs.len() as f64;
        let mut summary = Self {
            total_runs: runs.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        let mut orders_sum = 0u64;
        let mut lost_sum = 0u64;
        let mut killed_sum = 0u64;
        for run in runs {
            *summary
                .outcomes
                .entry(format!("{:?}", run.outcome))
                .or_default() += 1;
            duration_sum += run.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(run.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(run.duration_ticks);
            orders_sum += run.order_calls;
            lost_sum += u64::from(run.units_lost);
            killed_sum += u64::from(run.hostiles_killed);
            summary.faults += run.faults;
            for (kind, n) in &run.missions_spawned {
                *summary.missions_spawned.entry(kind.clone()).or_default() += n;
            }
            for (reason, n) in &run.missions_removed {
                *summary.missions_removed.entry(reason.clone()).or_default() += n;
            }
        }

        summary.avg_duration_ticks = duration_sum as f64 / count;
        summary.avg_order_calls = orders_sum as f64 / count;
        summary.avg_units_lost = lost_sum as f64 / count;
        summary.avg_hostiles_killed = killed_sum as f64 / count;
        summary
    }

    /// Fraction of runs that ended with `outcome`.
    #[must_use]
    pub fn rate(&self, outcome: Outcome) -> f64 {
        let n = self
            .outcomes
            .get(&format!("{outcome:?}"))
            .copied()
            .unwrap_or(0);
        f64::from(n) / f64::from(self.total_runs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use tactics_core::controller::RemovalRecord;
    use tactics_core::mission::DisbandReason;

    use super::*;

    fn run(seed: u64, outcome: Outcome, duration: u64) -> RunMetrics {
        let mut metrics = RunMetrics::new("test", seed);
        metrics.finalize(duration, outcome, 0.5, 0);
        metrics
    }

    #[test]
    fn test_record_report_tallies() {
        let mut metrics = RunMetrics::new("test", 1);
        let report = TickReport {
            tick: 10,
            spawned: vec!["attack-1".to_string(), "scout-1".to_string()],
            removed: vec![RemovalRecord {
                name: "scout-1".to_string(),
                reason: Some(DisbandReason::Completed),
                released: 1,
            }],
            granted: 3,
            reclaimed: 1,
            faults: 0,
            orders: 4,
        };
        metrics.record_report(&report, 2, |name| {
            name.split('-').next().map(str::to_string)
        });

        assert_eq!(metrics.decision_ticks, 1);
        assert_eq!(metrics.missions_spawned["attack"], 1);
        assert_eq!(metrics.missions_spawned["scout"], 1);
        assert_eq!(metrics.missions_removed["Completed"], 1);
        assert_eq!(metrics.units_granted, 3);
        assert_eq!(metrics.order_calls, 4);
        assert_eq!(metrics.peak_missions, 2);
        assert_eq!(metrics.events.len(), 3);
    }

    #[test]
    fn test_order_hash_is_order_sensitive() {
        let a = [UnitId(1)];
        let b = [UnitId(2)];
        let mut first = OrderHasher::new();
        first.record(5, &a, Order::Move(Vec2::new(1.0, 2.0)));
        first.record(5, &b, Order::Toggle(true));
        let mut second = OrderHasher::new();
        second.record(5, &b, Order::Toggle(true));
        second.record(5, &a, Order::Move(Vec2::new(1.0, 2.0)));
        assert_ne!(first.finish(), second.finish());

        let mut again = OrderHasher::new();
        again.record(5, &a, Order::Move(Vec2::new(1.0, 2.0)));
        again.record(5, &b, Order::Toggle(true));
        assert_eq!(first.finish(), again.finish());
    }

    #[test]
    fn test_batch_summary() {
        let runs = vec![
            run(0, Outcome::Victory, 1000),
            run(1, Outcome::Victory, 3000),
            run(2, Outcome::TimeLimit, 5000),
        ];
        let summary = BatchSummary::from_runs(&runs);
        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.min_duration_ticks, 1000);
        assert_eq!(summary.max_duration_ticks, 5000);
        assert!((summary.avg_duration_ticks - 3000.0).abs() < 1e-9);
        assert!((summary.rate(Outcome::Victory) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.rate(Outcome::Defeat), 0.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_runs(&[]);
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.rate(Outcome::Victory), 0.0);
    }
}
