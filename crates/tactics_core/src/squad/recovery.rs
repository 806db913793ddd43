//! Escalating stuck recovery.
//!
//! Each attempt projects the search centre further from the blocked position
//! toward the destination. The first attempt takes the nearest traversable
//! cell around that centre; later attempts scan a widening area and take the
//! most open cell, preferring cells surrounded by the same terrain and
//! penalising distance from the original destination.

use glam::Vec2;

use crate::math::{step_towards, Tile};
use crate::world::{TickContext, UnitSnapshot};

/// Pick an escape point for a stuck unit on its `attempt`-th try (1-based).
#[must_use]
pub fn recovery_point(
    ctx: &TickContext<'_>,
    unit: &UnitSnapshot,
    destination: Vec2,
    attempt: u32,
) -> Option<Vec2> {
    let config = &ctx.config.squad;
    let attempt = attempt.max(1);
    let blocked = Tile::containing(unit.position);
    let projected = ctx.clamp(step_towards(
        unit.position,
        destination,
        config.recovery_step * attempt as f32,
    ));
    let center = Tile::containing(projected);
    let usable = |tile: Tile| tile != blocked && ctx.is_traversable(tile, unit.domain);

    if attempt == 1 {
        let radius = config.recovery_radius.max(1);
        return (0..=radius)
            .flat_map(|r| center.ring(r))
            .find(|t| usable(*t))
            .map(Tile::center);
    }

    let radius = config.recovery_radius + config.recovery_radius_growth * (attempt as i32 - 2);
    (0..=radius.max(1))
        .flat_map(|r| center.ring(r))
        .filter(|t| usable(*t))
        .map(|tile| (tile, open_area_score(ctx, tile, destination)))
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(tile, _)| tile.center())
}

/// Same-terrain neighbour count minus a distance penalty.
fn open_area_score(ctx: &TickContext<'_>, tile: Tile, destination: Vec2) -> f32 {
    let terrain = ctx.world.terrain(tile);
    let same = tile
        .neighbors()
        .filter(|n| ctx.world.bounds().contains(*n) && ctx.world.terrain(*n) == terrain)
        .count();
    same as f32 - ctx.config.squad.recovery_target_penalty * tile.center().distance(destination)
}
