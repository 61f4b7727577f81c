//! The learning side of a session. The core never implements an update rule;
//! it only drives whatever [`Policy`] the [`PolicyFactory`] hands it.

mod explorer;

use std::path::Path;

use crate::encoder::Observation;
use crate::episode::{Action, Environment, StepOutcome};
use crate::error::PolicyError;
use crate::genre::{ActionSpace, Algorithm};

pub use explorer::{ExplorerFactory, RandomExplorer};

/// What the per-step hook sees.
pub struct StepContext<'a> {
    /// 1-based count of steps taken in this `train` call.
    pub step: u64,
    pub total_steps: u64,
    /// 1-based index of the running episode.
    pub episode: u64,
    pub outcome: &'a StepOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookSignal {
    Continue,
    Stop,
}

/// Called once per environment step during training.
pub trait StepHook {
    fn on_step(&mut self, ctx: &StepContext<'_>) -> HookSignal;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainOutcome {
    pub steps: u64,
    pub episodes: u64,
    /// The hook asked to stop before `total_steps` were taken.
    pub interrupted: bool,
}

pub trait Policy: Send {
    fn name(&self) -> &str;

    fn act(&mut self, observation: &Observation) -> Action;

    fn train(
        &mut self,
        env: &mut dyn Environment,
        total_steps: u64,
        hook: &mut dyn StepHook,
    ) -> Result<TrainOutcome, PolicyError>;

    fn save(&self, path: &Path) -> Result<(), PolicyError>;

    fn load(&mut self, path: &Path) -> Result<(), PolicyError>;
}

/// Builds the policy for a session. `algorithm` comes from the genre table;
/// implementations may substitute their own.
pub trait PolicyFactory: Send + Sync {
    fn build(
        &self,
        algorithm: Algorithm,
        action_space: ActionSpace,
    ) -> Result<Box<dyn Policy>, PolicyError>;
}
