//! Geometry helpers shared by squads and missions.
//!
//! Positions are `glam::Vec2` in world units where one world unit is one
//! map tile. Tiles are addressed by integer [`Tile`] coordinates and a
//! position `p` lies in tile `(floor(p.x), floor(p.y))`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Tile {
    /// Create a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn containing(point: Vec2) -> Self {
        Self::new(point.x.floor() as i32, point.y.floor() as i32)
    }

    /// World position at the centre of this tile.
    #[must_use]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }

    /// The eight surrounding tiles.
    pub fn neighbors(self) -> impl Iterator<Item = Tile> {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        OFFSETS
            .into_iter()
            .map(move |(dx, dy)| Tile::new(self.x + dx, self.y + dy))
    }

    /// Tiles at exactly Chebyshev distance `radius` from this one.
    ///
    /// Radius 0 yields the tile itself.
    pub fn ring(self, radius: i32) -> impl Iterator<Item = Tile> {
        let r = radius.max(0);
        (-r..=r).flat_map(move |dy| {
            (-r..=r).filter_map(move |dx| {
                (dx.abs() == r || dy.abs() == r).then_some(Tile::new(self.x + dx, self.y + dy))
            })
        })
    }
}

/// Map extents in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl MapBounds {
    /// Create bounds for a `width` x `height` map.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a tile lies on the map.
    #[must_use]
    pub fn contains(self, tile: Tile) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }

    /// Clamp a world position onto the map.
    ///
    /// The result always lies strictly inside the last tile so that
    /// [`Tile::containing`] of it is on the map.
    #[must_use]
    pub fn clamp(self, point: Vec2) -> Vec2 {
        let max_x = (self.width as f32 - 0.01).max(0.0);
        let max_y = (self.height as f32 - 0.01).max(0.0);
        Vec2::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y))
    }

    /// Centre of the map.
    #[must_use]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    /// Total number of tiles.
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Mean of a set of points, `None` when empty.
#[must_use]
pub fn centroid(points: &[Vec2]) -> Option<Vec2> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
    Some(sum / points.len() as f32)
}

/// Distance from `center` to the farthest point, zero when empty.
#[must_use]
pub fn max_distance(center: Vec2, points: &[Vec2]) -> f32 {
    points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0, f32::max)
}

/// Point `distance` units from `from` along the direction to `to`.
///
/// Returns `from` unchanged when the two points coincide.
#[must_use]
pub fn step_towards(from: Vec2, to: Vec2, distance: f32) -> Vec2 {
    let dir = (to - from).normalize_or_zero();
    from + dir * distance
}

/// Unit vector for an angle measured in radians.
#[must_use]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_of_square() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        assert_eq!(centroid(&pts), Some(Vec2::new(1.0, 1.0)));
        assert_eq!(centroid(&[]), None);
    }

    #[test]
    fn test_max_distance() {
        let pts = [Vec2::new(3.0, 4.0), Vec2::new(1.0, 0.0)];
        assert!((max_distance(Vec2::ZERO, &pts) - 5.0).abs() < 1e-6);
        assert_eq!(max_distance(Vec2::ZERO, &[]), 0.0);
    }

    #[test]
    fn test_clamp_keeps_point_on_map() {
        let bounds = MapBounds::new(64, 32);
        let clamped = bounds.clamp(Vec2::new(-5.0, 100.0));
        assert_eq!(clamped.x, 0.0);
        assert!(bounds.contains(Tile::containing(clamped)));
    }

    #[test]
    fn test_ring_sizes() {
        let origin = Tile::new(10, 10);
        assert_eq!(origin.ring(0).count(), 1);
        assert_eq!(origin.ring(1).count(), 8);
        assert_eq!(origin.ring(2).count(), 16);
    }

    #[test]
    fn test_step_towards_coincident_points() {
        let p = Vec2::new(4.0, 4.0);
        assert_eq!(step_towards(p, p, 3.0), p);
        let q = step_towards(Vec2::ZERO, Vec2::new(10.0, 0.0), 3.0);
        assert!((q.x - 3.0).abs() < 1e-6);
    }
}
