use serde::{Deserialize, Serialize};

use super::{RewardShaper, StepEvent};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericWeights {
    pub crash: f64,
    pub freeze: f64,
    pub new_state: f64,
    pub rare_state: f64,
    pub death: f64,
    pub idle: f64,
}

impl Default for GenericWeights {
    fn default() -> Self {
        Self {
            crash: 10.0,
            freeze: 5.0,
            new_state: 1.0,
            rare_state: 2.0,
            death: -1.0,
            idle: -0.1,
        }
    }
}

/// Weighted sum of independent event flags.
#[derive(Clone, Debug, Default)]
pub struct GenericRewardShaper {
    weights: GenericWeights,
}

impl GenericRewardShaper {
    pub fn new(weights: GenericWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> GenericWeights {
        self.weights
    }
}

impl RewardShaper for GenericRewardShaper {
    fn score(&mut self, event: &StepEvent) -> f64 {
        let w = &self.weights;
        [
            (event.is_crash, w.crash),
            (event.is_freeze, w.freeze),
            (event.is_new, w.new_state),
            (event.is_rare, w.rare_state),
            (event.is_death, w.death),
            (event.is_idle, w.idle),
        ]
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, weight)| weight)
        .sum()
    }

    fn reset(&mut self, _episode: u64) {}
}
