use serde::{Deserialize, Serialize};

use super::{RewardShaper, StepEvent};
use crate::liveness::LivenessReport;

/// Racing state inferred from actions and coverage/liveness signals; the
/// target never reports it directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RacingEstimate {
    pub speed: f64,
    pub steering: f64,
    pub distance_from_center: f64,
    pub progress: f64,
    pub collision: bool,
    pub off_track: bool,
    pub lap_completed: bool,
}

/// Rebuilds a [`RacingEstimate`] every step from the previous one.
#[derive(Clone, Debug, Default)]
pub struct RacingEstimator {
    previous: Option<RacingEstimate>,
    last_unique_states: Option<usize>,
    speed: f64,
    progress: f64,
}

impl RacingEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn last(&self) -> Option<RacingEstimate> {
        self.previous
    }

    pub fn update(
        &mut self,
        action: [f32; 2],
        unique_states: usize,
        liveness: LivenessReport,
    ) -> RacingEstimate {
        let steering = f64::from(action[0]).clamp(-1.0, 1.0);
        let throttle = f64::from(action[1]).clamp(-1.0, 1.0);

        if throttle > 0.0 {
            self.speed = (self.speed + 0.1 * throttle).min(1.0);
        } else if throttle < 0.0 {
            self.speed = (self.speed + 0.2 * throttle).max(0.0);
        }
        self.speed *= 0.95;

        // The first step of an episode only sets the coverage baseline.
        let baseline = self.last_unique_states.unwrap_or(unique_states);
        self.progress += 0.01 * unique_states.saturating_sub(baseline) as f64;
        self.last_unique_states = Some(unique_states);

        let lap_completed = self
            .previous
            .is_some_and(|prev| prev.progress > 50.0 && self.progress > 100.0);

        let estimate = RacingEstimate {
            speed: self.speed,
            steering,
            distance_from_center: steering.abs() * 0.5,
            progress: self.progress,
            collision: liveness.is_crash,
            off_track: liveness.is_freeze,
            lap_completed,
        };
        self.previous = Some(estimate);
        estimate
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RacingRewardConfig {
    pub progress_weight: f64,
    pub no_progress_penalty: f64,
    pub speed_weight: f64,
    pub center_weight: f64,
    pub oscillation_weight: f64,
    pub off_track_penalty: f64,
    pub collision_base: f64,
    pub collision_per_episode: f64,
    pub collision_cap: f64,
    pub lap_bonus: f64,
    /// Applied once more than `stuck_after` consecutive steps run below
    /// half speed. Zero disables it.
    pub stuck_penalty: f64,
    pub stuck_after: u32,
}

impl Default for RacingRewardConfig {
    fn default() -> Self {
        Self {
            progress_weight: 8.0,
            no_progress_penalty: 5.0,
            speed_weight: 0.1,
            center_weight: 2.0,
            oscillation_weight: 2.0,
            off_track_penalty: 80.0,
            collision_base: 50.0,
            collision_per_episode: 2.0,
            collision_cap: 200.0,
            lap_bonus: 250.0,
            stuck_penalty: 0.0,
            stuck_after: 10,
        }
    }
}

/// Progress-first shaping for continuous control.
#[derive(Clone, Debug, Default)]
pub struct RacingRewardShaper {
    config: RacingRewardConfig,
    prior: Option<RacingEstimate>,
    episode: u64,
    low_speed_steps: u32,
}

impl RacingRewardShaper {
    pub fn new(config: RacingRewardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn prior(&self) -> Option<RacingEstimate> {
        self.prior
    }

    fn collision_penalty(&self) -> f64 {
        let cfg = &self.config;
        (cfg.collision_base + cfg.collision_per_episode * self.episode as f64).min(cfg.collision_cap)
    }
}

impl RewardShaper for RacingRewardShaper {
    fn score(&mut self, event: &StepEvent) -> f64 {
        let cfg = self.config;
        let current = event.racing.unwrap_or_default();

        if current.speed < 0.5 {
            self.low_speed_steps = self.low_speed_steps.saturating_add(1);
        } else {
            self.low_speed_steps = 0;
        }

        if current.off_track {
            tracing::warn!(penalty = cfg.off_track_penalty, "off-track detected");
            return -cfg.off_track_penalty;
        }
        if current.collision {
            let penalty = self.collision_penalty();
            tracing::warn!(episode = self.episode, penalty, "collision detected");
            return -penalty;
        }

        let prior = self.prior.unwrap_or(current);
        let progress_delta = current.progress - prior.progress;

        let mut reward = cfg.progress_weight * progress_delta;
        if progress_delta <= 0.0 {
            reward -= cfg.no_progress_penalty;
        }

        let safe_speed = if current.steering.abs() > 0.3 { 0.5 } else { 1.0 };
        reward += cfg.speed_weight * current.speed.min(safe_speed);
        reward -= cfg.center_weight * current.distance_from_center.abs();
        reward -= cfg.oscillation_weight * (current.steering - prior.steering).abs();

        if self.low_speed_steps > cfg.stuck_after {
            reward -= cfg.stuck_penalty;
        }

        if current.lap_completed {
            reward += cfg.lap_bonus;
            tracing::info!(bonus = cfg.lap_bonus, "lap completed");
        }

        self.prior = Some(current);
        tracing::debug!(
            reward,
            progress_delta,
            speed = current.speed,
            steering = current.steering,
            "racing reward"
        );
        reward
    }

    fn reset(&mut self, episode: u64) {
        self.prior = None;
        self.episode = episode;
        self.low_speed_steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(estimate: RacingEstimate) -> StepEvent {
        StepEvent {
            racing: Some(estimate),
            ..StepEvent::default()
        }
    }

    #[test]
    fn off_track_short_circuits() {
        let mut shaper = RacingRewardShaper::default();
        let estimate = RacingEstimate {
            off_track: true,
            collision: true,
            lap_completed: true,
            progress: 500.0,
            ..RacingEstimate::default()
        };
        assert_eq!(shaper.score(&event(estimate)), -80.0);
        assert_eq!(shaper.prior(), None);
    }

    #[test]
    fn collision_penalty_escalates_and_caps() {
        let mut shaper = RacingRewardShaper::default();
        let crash = event(RacingEstimate {
            collision: true,
            ..RacingEstimate::default()
        });

        shaper.reset(25);
        assert_eq!(shaper.score(&crash), -100.0);
        shaper.reset(0);
        assert_eq!(shaper.score(&crash), -50.0);
        shaper.reset(1_000);
        assert_eq!(shaper.score(&crash), -200.0);
        assert_eq!(shaper.prior(), None);
    }

    #[test]
    fn first_step_uses_itself_as_prior() {
        let mut shaper = RacingRewardShaper::default();
        let estimate = RacingEstimate {
            speed: 0.4,
            steering: 0.0,
            progress: 3.0,
            ..RacingEstimate::default()
        };
        // No progress (-5) plus speed term 0.1 * 0.4.
        let reward = shaper.score(&event(estimate));
        assert!((reward - (-5.0 + 0.04)).abs() < 1e-9);
        assert_eq!(shaper.prior(), Some(estimate));
    }

    #[test]
    fn progress_dominates_and_oscillation_is_penalized() {
        let mut shaper = RacingRewardShaper::default();
        shaper.score(&event(RacingEstimate::default()));

        let next = RacingEstimate {
            speed: 1.0,
            steering: 0.4,
            distance_from_center: 0.2,
            progress: 1.0,
            ..RacingEstimate::default()
        };
        // 8*1 + 0.1*min(1, 0.5) - 2*0.2 - 2*0.4
        let expected = 8.0 + 0.05 - 0.4 - 0.8;
        assert!((shaper.score(&event(next)) - expected).abs() < 1e-9);
    }

    #[test]
    fn lap_bonus_is_added_on_top() {
        let mut shaper = RacingRewardShaper::default();
        shaper.score(&event(RacingEstimate {
            progress: 99.0,
            ..RacingEstimate::default()
        }));
        let lap = RacingEstimate {
            progress: 101.0,
            lap_completed: true,
            ..RacingEstimate::default()
        };
        assert!((shaper.score(&event(lap)) - (16.0 + 250.0)).abs() < 1e-9);
    }

    #[test]
    fn stuck_penalty_applies_after_threshold_when_configured() {
        let mut shaper = RacingRewardShaper::new(RacingRewardConfig {
            stuck_penalty: 0.5,
            ..RacingRewardConfig::default()
        });
        let idle = event(RacingEstimate::default());
        let rewards: Vec<f64> = (0..12).map(|_| shaper.score(&idle)).collect();
        assert_eq!(rewards[9], -5.0);
        assert_eq!(rewards[10], -5.5);

        let mut default = RacingRewardShaper::default();
        let rewards: Vec<f64> = (0..12).map(|_| default.score(&idle)).collect();
        assert_eq!(rewards[11], -5.0);
    }

    #[test]
    fn missing_estimate_counts_as_zero() {
        let mut shaper = RacingRewardShaper::default();
        assert_eq!(shaper.score(&StepEvent::default()), -5.0);
    }

    #[test]
    fn estimator_models_speed_and_progress() {
        let mut estimator = RacingEstimator::new();
        let alive = LivenessReport::default();

        let first = estimator.update([0.0, 1.0], 10, alive);
        assert!((first.speed - 0.095).abs() < 1e-9);
        assert_eq!(first.progress, 0.0);

        let second = estimator.update([0.6, 1.0], 15, alive);
        assert!((second.progress - 0.05).abs() < 1e-9);
        assert!((second.distance_from_center - 0.3).abs() < 1e-6);

        let braked = estimator.update([0.0, -1.0], 15, alive);
        assert_eq!(braked.speed, 0.0);
    }

    #[test]
    fn estimator_maps_liveness_and_laps() {
        let mut estimator = RacingEstimator::new();
        let report = LivenessReport {
            is_crash: true,
            is_freeze: false,
        };
        let estimate = estimator.update([0.0, 0.0], 0, report);
        assert!(estimate.collision);
        assert!(!estimate.off_track);

        estimator.update([0.0, 0.0], 6_000, LivenessReport::default());
        let lap = estimator.update([0.0, 0.0], 11_000, LivenessReport::default());
        assert!(lap.progress > 100.0);
        assert!(lap.lap_completed);

        estimator.reset();
        assert_eq!(estimator.last(), None);
    }
}
