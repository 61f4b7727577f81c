//! Step scoring. Both strategies consume the same [`StepEvent`] and never
//! fail; absent fields count as false or zero.

mod generic;
mod racing;

use serde::Serialize;

pub use generic::{GenericRewardShaper, GenericWeights};
pub use racing::{RacingEstimate, RacingEstimator, RacingRewardConfig, RacingRewardShaper};

/// Everything the episode observed in one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StepEvent {
    pub is_new: bool,
    pub is_rare: bool,
    pub is_crash: bool,
    pub is_freeze: bool,
    /// Game-over detection is not wired to any signal yet; always false.
    pub is_death: bool,
    /// Action introspection is not wired to any signal yet; always false.
    pub is_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub racing: Option<RacingEstimate>,
}

pub trait RewardShaper: Send {
    fn score(&mut self, event: &StepEvent) -> f64;

    /// Forget per-episode state. `episode` is the zero-based index of the
    /// episode about to start.
    fn reset(&mut self, episode: u64);
}
