//! Per-unit transient state kept by a squad.

use std::collections::VecDeque;

use glam::Vec2;

use crate::config::SquadConfig;

/// Position history, stuck-recovery counters and combat recency of one unit.
///
/// Lives in the squad's arena keyed by unit id and is evicted as soon as the
/// unit leaves the squad.
#[derive(Debug, Clone)]
pub struct UnitTrack {
    samples: VecDeque<Vec2>,
    last_sample: Option<u64>,
    joined: u64,
    /// Recovery attempts since the unit last moved freely.
    pub stuck_attempts: u32,
    /// Recovery order is held until this tick.
    pub recovering_until: u64,
    /// Last tick the unit was ordered to attack something.
    pub last_engaged: Option<u64>,
    /// Whether the special ability has been switched on during a retreat.
    pub toggled: bool,
}

impl UnitTrack {
    /// Fresh track for a unit joining at `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            last_sample: None,
            joined: tick,
            stuck_attempts: 0,
            recovering_until: 0,
            last_engaged: None,
            toggled: false,
        }
    }

    /// Record a position sample if the sampling interval has elapsed.
    pub fn sample(&mut self, position: Vec2, tick: u64, config: &SquadConfig) {
        let due = self
            .last_sample
            .map_or(true, |t| tick.saturating_sub(t) >= config.stuck_sample_interval);
        if !due {
            return;
        }
        self.samples.push_back(position);
        while self.samples.len() > config.stuck_samples {
            self.samples.pop_front();
        }
        self.last_sample = Some(tick);
    }

    /// Recorded samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &Vec2> {
        self.samples.iter()
    }

    /// Forget the position history (after a recovery order).
    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    /// Whether a full window of samples shows no pairwise displacement above
    /// the movement threshold.
    #[must_use]
    pub fn is_stationary(&self, config: &SquadConfig) -> bool {
        if self.samples.len() < config.stuck_samples {
            return false;
        }
        let samples: Vec<Vec2> = self.samples.iter().copied().collect();
        samples.iter().enumerate().all(|(i, a)| {
            samples[i + 1..]
                .iter()
                .all(|b| a.distance(*b) < config.stuck_threshold)
        })
    }

    /// Whether a full window exists and shows movement.
    #[must_use]
    pub fn is_moving(&self, config: &SquadConfig) -> bool {
        self.samples.len() >= config.stuck_samples && !self.is_stationary(config)
    }

    /// Most recent of joining and engaging.
    #[must_use]
    pub fn last_active(&self) -> u64 {
        self.last_engaged.map_or(self.joined, |t| t.max(self.joined))
    }

    /// Engaged within `window` ticks of `tick`.
    #[must_use]
    pub fn engaged_recently(&self, tick: u64, window: u64) -> bool {
        self.last_engaged
            .is_some_and(|t| tick.saturating_sub(t) <= window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_respects_interval_and_window() {
        let config = SquadConfig::default();
        let mut track = UnitTrack::new(0);
        track.sample(Vec2::ZERO, 0, &config);
        track.sample(Vec2::ONE, 30, &config);
        assert_eq!(track.samples().count(), 1);
        for i in 1..=4 {
            track.sample(Vec2::splat(i as f32), i * 60, &config);
        }
        assert_eq!(track.samples().count(), 3);
        assert_eq!(track.samples().next(), Some(&Vec2::splat(2.0)));
    }

    #[test]
    fn test_stationary_needs_full_window() {
        let config = SquadConfig::default();
        let mut track = UnitTrack::new(0);
        track.sample(Vec2::ZERO, 0, &config);
        track.sample(Vec2::new(0.1, 0.0), 60, &config);
        assert!(!track.is_stationary(&config));
        track.sample(Vec2::new(0.2, 0.1), 120, &config);
        assert!(track.is_stationary(&config));
        track.sample(Vec2::new(2.0, 0.0), 180, &config);
        assert!(track.is_moving(&config));
    }

    #[test]
    fn test_engagement_recency() {
        let mut track = UnitTrack::new(10);
        assert_eq!(track.last_active(), 10);
        track.last_engaged = Some(100);
        assert!(track.engaged_recently(150, 90));
        assert!(!track.engaged_recently(191, 90));
        assert_eq!(track.last_active(), 100);
    }
}
