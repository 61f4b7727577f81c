use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coverage::{CoverageTracker, CoverageUpdate};
use crate::encoder::{EncoderConfig, Observation, StateEncoder};
use crate::error::HarnessError;
use crate::fingerprint::fingerprint;
use crate::frame::{capture_or_log, FrameSource};
use crate::genre::{ActionSpace, Genre};
use crate::input::{ActionMap, ContinuousConfig, DeliveryChain, InputInjector};
use crate::liveness::{LivenessMonitor, LivenessReport, ProcessProbe, DEFAULT_FREEZE_THRESHOLD};
use crate::reward::{
    GenericRewardShaper, GenericWeights, RacingEstimate, RacingEstimator, RacingRewardConfig,
    RacingRewardShaper, RewardShaper, StepEvent,
};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Discrete(usize),
    /// (steering, throttle), each in `[-1, 1]`.
    Continuous([f32; 2]),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discrete(_) => "discrete",
            Self::Continuous(_) => "continuous",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StepInfo {
    pub coverage: CoverageUpdate,
    pub unique_states: usize,
    pub liveness: LivenessReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub racing: Option<RacingEstimate>,
}

#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// The reset/step contract a policy trains against.
pub trait Environment {
    fn action_space(&self) -> ActionSpace;

    fn reset(&mut self) -> Result<Observation, HarnessError>;

    fn step(&mut self, action: &Action) -> Result<StepOutcome, HarnessError>;

    /// Distinct visual states seen so far in this session.
    fn unique_states(&self) -> usize;

    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    pub encoder: EncoderConfig,
    pub settle_delay: Duration,
    pub freeze_threshold: Duration,
    pub continuous: ContinuousConfig,
    pub generic_weights: GenericWeights,
    pub racing_reward: RacingRewardConfig,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            freeze_threshold: DEFAULT_FREEZE_THRESHOLD,
            continuous: ContinuousConfig::default(),
            generic_weights: GenericWeights::default(),
            racing_reward: RacingRewardConfig::default(),
        }
    }
}

/// The I/O backends an episode drives.
pub struct EpisodeIo {
    pub frames: Box<dyn FrameSource>,
    pub delivery: DeliveryChain,
    pub probe: Box<dyn ProcessProbe>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Stepping,
    Closed,
}

/// Per-step orchestrator: inject, settle, capture, encode, classify, score.
pub struct Episode {
    genre: Genre,
    action_space: ActionSpace,
    action_map: ActionMap,
    settle_delay: Duration,
    frames: Box<dyn FrameSource>,
    probe: Box<dyn ProcessProbe>,
    injector: InputInjector,
    encoder: StateEncoder,
    coverage: CoverageTracker,
    liveness: LivenessMonitor,
    shaper: Box<dyn RewardShaper>,
    racing: Option<RacingEstimator>,
    episodes_started: u64,
    phase: Phase,
}

impl Episode {
    pub fn new(genre: Genre, config: EpisodeConfig, io: EpisodeIo) -> Self {
        let (shaper, racing): (Box<dyn RewardShaper>, _) = if genre.is_continuous() {
            (
                Box::new(RacingRewardShaper::new(config.racing_reward)),
                Some(RacingEstimator::new()),
            )
        } else {
            (Box::new(GenericRewardShaper::new(config.generic_weights)), None)
        };

        Self {
            genre,
            action_space: genre.action_space(),
            action_map: genre.action_map(),
            settle_delay: config.settle_delay,
            frames: io.frames,
            probe: io.probe,
            injector: InputInjector::new(io.delivery, config.continuous),
            encoder: StateEncoder::new(config.encoder),
            coverage: CoverageTracker::new(),
            liveness: LivenessMonitor::new(config.freeze_threshold),
            shaper,
            racing,
            episodes_started: 0,
            phase: Phase::Created,
        }
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn episodes_started(&self) -> u64 {
        self.episodes_started
    }

    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    pub fn held_keys(&self) -> usize {
        self.injector.held_keys().len()
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    fn inject(&mut self, action: &Action) -> Result<(), HarnessError> {
        match (self.action_space, action) {
            (ActionSpace::Discrete(n), Action::Discrete(index)) => {
                if *index >= n {
                    return Err(HarnessError::ActionContract {
                        expected: "discrete index within the action space",
                        got: "out-of-range index",
                    });
                }
                self.injector.apply_discrete(&self.action_map, *index);
            }
            (ActionSpace::Continuous { .. }, Action::Continuous(vector)) => {
                self.injector.apply_continuous(*vector);
            }
            (space, action) => {
                return Err(HarnessError::ActionContract {
                    expected: space.kind(),
                    got: action.kind(),
                });
            }
        }
        Ok(())
    }
}

impl Environment for Episode {
    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn reset(&mut self) -> Result<Observation, HarnessError> {
        if self.phase == Phase::Closed {
            return Err(HarnessError::EpisodeState("episode is closed"));
        }

        self.injector.reset();
        self.encoder.reset();
        self.liveness.reset();
        self.shaper.reset(self.episodes_started);
        if let Some(racing) = self.racing.as_mut() {
            racing.reset();
        }
        self.episodes_started += 1;
        self.phase = Phase::Stepping;

        let frame = capture_or_log(self.frames.as_mut());
        tracing::debug!(
            genre = %self.genre,
            episode = self.episodes_started,
            seeded = frame.is_some(),
            "episode reset"
        );
        Ok(self.encoder.encode(frame.as_ref()))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome, HarnessError> {
        match self.phase {
            Phase::Created => return Err(HarnessError::EpisodeState("reset before the first step")),
            Phase::Closed => return Err(HarnessError::EpisodeState("episode is closed")),
            Phase::Stepping => {}
        }

        self.inject(action)?;
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }

        let frame = capture_or_log(self.frames.as_mut());
        let observation = self.encoder.encode(frame.as_ref());

        let alive = self.probe.is_alive();
        let (coverage, liveness) = match frame.as_ref().map(fingerprint) {
            Some(fp) => (self.coverage.visit(fp), self.liveness.check(fp, alive)),
            None => (
                CoverageUpdate::default(),
                LivenessReport {
                    is_crash: !alive,
                    is_freeze: false,
                },
            ),
        };
        let unique_states = self.coverage.unique_states();

        let racing = match (self.racing.as_mut(), action) {
            (Some(estimator), Action::Continuous(vector)) => {
                Some(estimator.update(*vector, unique_states, liveness))
            }
            _ => None,
        };

        let event = StepEvent {
            is_new: coverage.is_new,
            is_rare: coverage.is_rare,
            is_crash: liveness.is_crash,
            is_freeze: liveness.is_freeze,
            is_death: false,
            is_idle: false,
            racing,
        };
        let reward = self.shaper.score(&event);

        let terminated = liveness.is_crash
            || liveness.is_freeze
            || racing.is_some_and(|estimate| estimate.collision || estimate.off_track);
        if terminated {
            tracing::info!(
                genre = %self.genre,
                crash = liveness.is_crash,
                freeze = liveness.is_freeze,
                "episode terminated"
            );
        }
        tracing::debug!(reward, is_new = coverage.is_new, unique_states, "step");

        Ok(StepOutcome {
            observation,
            reward,
            terminated,
            truncated: false,
            info: StepInfo {
                coverage,
                unique_states,
                liveness,
                racing,
            },
        })
    }

    fn unique_states(&self) -> usize {
        self.coverage.unique_states()
    }

    /// Release every held input and the capture resource. Idempotent.
    fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.injector.reset();
        self.frames.close();
        self.phase = Phase::Closed;
        tracing::debug!(genre = %self.genre, "episode closed");
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        self.close();
    }
}
