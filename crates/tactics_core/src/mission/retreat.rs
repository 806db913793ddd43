//! Retreat task: walk survivors back to the rally point.

use glam::Vec2;
use tracing::info;

use crate::batcher::ActionBatcher;
use crate::error::Result;
use crate::squad::{Squad, SquadState};
use crate::world::TickContext;

use super::{elapsed, DisbandReason, MissionAction, MissionCore};

/// Retreat state. Locked from creation.
#[derive(Debug, Clone)]
pub struct RetreatTask {
    rally: Vec2,
    squad: Squad,
    started: Option<u64>,
}

impl RetreatTask {
    /// Withdraw to `rally`.
    #[must_use]
    pub fn new(rally: Vec2) -> Self {
        let mut squad = Squad::new(rally, SquadState::Retreating);
        squad.retreat_to(rally);
        Self {
            rally,
            squad,
            started: None,
        }
    }

    /// Withdrawal point.
    #[must_use]
    pub fn rally(&self) -> Vec2 {
        self.rally
    }

    /// Embedded squad.
    #[must_use]
    pub fn squad(&self) -> &Squad {
        &self.squad
    }

    pub(super) fn squad_mut(&mut self) -> &mut Squad {
        &mut self.squad
    }

    pub(super) fn update(
        &mut self,
        core: &mut MissionCore,
        ctx: &TickContext<'_>,
        batcher: &mut ActionBatcher,
    ) -> Result<MissionAction> {
        let config = &ctx.config.retreat;
        let started = *self.started.get_or_insert(ctx.tick);
        let report = self.squad.update(ctx, &core.unit_list(), batcher);
        let Some(center) = report.centroid else {
            return Ok(MissionAction::Disband(Some(DisbandReason::UnitsLost)));
        };
        if center.distance(ctx.clamp(self.rally)) <= config.arrival_radius {
            info!(mission = %core.name(), tick = ctx.tick, units = report.alive, "Retreat complete");
            return Ok(MissionAction::Disband(Some(DisbandReason::Completed)));
        }
        if elapsed(ctx.tick, started) >= config.timeout {
            info!(mission = %core.name(), tick = ctx.tick, "Retreat timed out");
            return Ok(MissionAction::Disband(Some(DisbandReason::Timeout)));
        }
        Ok(MissionAction::Noop)
    }
}
