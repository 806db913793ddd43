//! Per-tick, per-unit de-duplicating order buffer.
//!
//! Squads push intents while missions update; the controller flushes once at
//! the end of the decision tick. At most one order per unit survives a tick:
//! a later intent replaces an earlier one, and an exact repeat of the
//! buffered intent is dropped. Units that end up with identical orders are
//! issued in a single host call.
//!
//! Nothing is remembered across ticks; suppressing repeats of last tick's
//! order is the issuing squad's job.

use std::collections::BTreeMap;

use tracing::trace;

use crate::world::{Order, OrderSink, UnitId};

/// Result of pushing one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// First intent for this unit this tick.
    Buffered,
    /// Replaced a different intent buffered earlier this tick.
    Replaced,
    /// Same as the intent already buffered; dropped.
    Duplicate,
}

/// Order buffer for one decision tick.
#[derive(Debug, Default)]
pub struct ActionBatcher {
    pending: BTreeMap<UnitId, Order>,
    duplicates: u64,
}

impl ActionBatcher {
    /// Create an empty batcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an order for a unit.
    pub fn push(&mut self, unit: UnitId, order: Order) -> PushOutcome {
        match self.pending.insert(unit, order) {
            None => PushOutcome::Buffered,
            Some(previous) if previous == order => {
                self.duplicates += 1;
                PushOutcome::Duplicate
            }
            Some(_) => PushOutcome::Replaced,
        }
    }

    /// Order currently buffered for a unit.
    #[must_use]
    pub fn pending(&self, unit: UnitId) -> Option<Order> {
        self.pending.get(&unit).copied()
    }

    /// Drop anything buffered for a unit (it changed hands mid-tick).
    pub fn cancel(&mut self, unit: UnitId) {
        self.pending.remove(&unit);
    }

    /// Number of units with a buffered order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Duplicates dropped since creation.
    #[must_use]
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates
    }

    /// Emit every buffered order and clear the buffer.
    ///
    /// Returns the number of unit orders emitted.
    pub fn flush(&mut self, sink: &mut dyn OrderSink) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let emitted = pending.len();

        // Group units sharing an identical order, in unit id order.
        let mut groups: Vec<(Order, Vec<UnitId>)> = Vec::new();
        for (unit, order) in pending {
            match groups.iter_mut().find(|(o, _)| *o == order) {
                Some((_, units)) => units.push(unit),
                None => groups.push((order, vec![unit])),
            }
        }

        for (order, units) in &groups {
            trace!(?order, units = units.len(), "Issuing order");
            sink.issue(units, *order);
        }
        emitted
    }
}
