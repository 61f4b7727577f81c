use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{HookSignal, Policy, PolicyFactory, StepContext, StepHook, TrainOutcome};
use crate::encoder::Observation;
use crate::episode::{Action, Environment};
use crate::error::PolicyError;
use crate::genre::{ActionSpace, Algorithm};

/// Probability of repeating the previous action instead of sampling.
pub const STICKY_ACTION_PROBABILITY: f64 = 0.25;

#[derive(Debug, Serialize, Deserialize)]
struct ExplorerCheckpoint {
    policy: String,
    seed: u64,
    steps_taken: u64,
}

/// Uniform random exploration with sticky actions.
pub struct RandomExplorer {
    action_space: ActionSpace,
    seed: u64,
    rng: SmallRng,
    steps_taken: u64,
    last: Option<Action>,
}

impl RandomExplorer {
    pub const NAME: &'static str = "random-explorer";

    pub fn new(action_space: ActionSpace, seed: u64) -> Self {
        Self {
            action_space,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            steps_taken: 0,
            last: None,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    fn sample(&mut self) -> Action {
        match self.action_space {
            ActionSpace::Discrete(n) => Action::Discrete(self.rng.random_range(0..n.max(1))),
            ActionSpace::Continuous { .. } => Action::Continuous([
                self.rng.random_range(-1.0..=1.0),
                self.rng.random_range(-1.0..=1.0),
            ]),
        }
    }
}

impl Policy for RandomExplorer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn act(&mut self, _observation: &Observation) -> Action {
        let action = match self.last {
            Some(previous) if self.rng.random_bool(STICKY_ACTION_PROBABILITY) => previous,
            _ => self.sample(),
        };
        self.last = Some(action);
        action
    }

    fn train(
        &mut self,
        env: &mut dyn Environment,
        total_steps: u64,
        hook: &mut dyn StepHook,
    ) -> Result<TrainOutcome, PolicyError> {
        let mut observation = env.reset()?;
        let mut outcome = TrainOutcome {
            steps: 0,
            episodes: 1,
            interrupted: false,
        };

        while outcome.steps < total_steps {
            let action = self.act(&observation);
            let step = env.step(&action)?;
            outcome.steps += 1;
            self.steps_taken += 1;

            let signal = hook.on_step(&StepContext {
                step: outcome.steps,
                total_steps,
                episode: outcome.episodes,
                outcome: &step,
            });
            if signal == HookSignal::Stop {
                outcome.interrupted = true;
                break;
            }

            if step.terminated || step.truncated {
                observation = env.reset()?;
                outcome.episodes += 1;
                self.last = None;
            } else {
                observation = step.observation;
            }
        }

        Ok(outcome)
    }

    fn save(&self, path: &Path) -> Result<(), PolicyError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                PolicyError::Persistence(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let checkpoint = ExplorerCheckpoint {
            policy: Self::NAME.to_string(),
            seed: self.seed,
            steps_taken: self.steps_taken,
        };
        let body = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|err| PolicyError::Persistence(format!("failed to encode checkpoint: {err}")))?;
        fs::write(path, body).map_err(|err| {
            PolicyError::Persistence(format!("failed to write {}: {err}", path.display()))
        })
    }

    fn load(&mut self, path: &Path) -> Result<(), PolicyError> {
        let body = fs::read(path).map_err(|err| {
            PolicyError::Persistence(format!("failed to read {}: {err}", path.display()))
        })?;
        let checkpoint: ExplorerCheckpoint = serde_json::from_slice(&body)
            .map_err(|err| PolicyError::Persistence(format!("invalid checkpoint: {err}")))?;
        if checkpoint.policy != Self::NAME {
            return Err(PolicyError::Persistence(format!(
                "checkpoint belongs to policy {}",
                checkpoint.policy
            )));
        }

        self.seed = checkpoint.seed;
        self.steps_taken = checkpoint.steps_taken;
        self.rng = SmallRng::seed_from_u64(checkpoint.seed.wrapping_add(checkpoint.steps_taken));
        self.last = None;
        Ok(())
    }
}

/// Builds a [`RandomExplorer`] for every algorithm.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplorerFactory {
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
}

impl PolicyFactory for ExplorerFactory {
    fn build(
        &self,
        algorithm: Algorithm,
        action_space: ActionSpace,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        if let ActionSpace::Discrete(0) = action_space {
            return Err(PolicyError::UnsupportedActionSpace(
                "discrete space with no actions".to_string(),
            ));
        }
        let seed = self.seed.unwrap_or_else(rand::random);
        tracing::debug!(%algorithm, seed, "building exploration policy");
        Ok(Box::new(RandomExplorer::new(action_space, seed)))
    }
}
