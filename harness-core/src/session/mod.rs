//! Lifecycle of one testing run: at most one background worker drives an
//! environment through the policy while callers start, stop and poll it.

mod cancel;
mod history;
mod metrics;

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::{EnvironmentFactory, TargetWindow};
use crate::episode::EpisodeConfig;
use crate::error::{HarnessError, SessionError};
use crate::genre::{Algorithm, Genre};
use crate::policy::{HookSignal, Policy, PolicyFactory, StepContext, StepHook, TrainOutcome};

pub use cancel::CancelToken;
pub use history::{HistorySink, MemoryHistory, RecordedMetrics, SessionRecord};
pub use metrics::{MetricsHub, MetricsSnapshot, SessionStatus};

pub const DEFAULT_TOTAL_STEPS: u64 = 100_000;
pub const DEFAULT_METRICS_INTERVAL: u64 = 10;
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const REWARD_WINDOW: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub episode: EpisodeConfig,
    pub total_steps: u64,
    /// Publish metrics every this many steps.
    pub metrics_interval: u64,
    pub stop_timeout: Duration,
    /// Policy checkpoints land here; `None` skips them.
    pub models_dir: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            episode: EpisodeConfig::default(),
            total_steps: DEFAULT_TOTAL_STEPS,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            models_dir: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartAck {
    pub session_id: Uuid,
    pub genre: Genre,
    pub algorithm: Algorithm,
}

impl StartAck {
    pub fn message(&self) -> String {
        format!(
            "started {} testing session with {}",
            self.genre, self.algorithm
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAck {
    Stopped,
    /// The stop timeout elapsed; the worker will still exit on its own.
    StillFinishing,
}

impl StopAck {
    pub fn message(self) -> &'static str {
        match self {
            Self::Stopped => "testing session stopped",
            Self::StillFinishing => "stop requested; worker is still finishing",
        }
    }
}

struct ActiveSession {
    id: Uuid,
    genre: Genre,
    cancel: CancelToken,
    finished: watch::Receiver<bool>,
}

#[derive(Default)]
struct SessionSlot {
    active: Option<ActiveSession>,
}

struct Shared {
    slot: Mutex<SessionSlot>,
    metrics: MetricsHub,
    history: Arc<dyn HistorySink>,
    environments: Arc<dyn EnvironmentFactory>,
    policies: Arc<dyn PolicyFactory>,
    settings: SessionSettings,
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the single testing run. Cheap to clone; every clone drives the same
/// session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        settings: SessionSettings,
        environments: Arc<dyn EnvironmentFactory>,
        policies: Arc<dyn PolicyFactory>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(SessionSlot::default()),
                metrics: MetricsHub::new(),
                history,
                environments,
                policies,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn metrics_hub(&self) -> MetricsHub {
        self.shared.metrics.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock_slot().active.is_some()
    }

    pub fn current_genre(&self) -> Option<Genre> {
        self.shared
            .lock_slot()
            .active
            .as_ref()
            .map(|active| active.genre)
    }

    /// Launch a worker for `genre` and return without waiting for it.
    ///
    /// Must be called from within a tokio runtime; outside one it fails with
    /// `RuntimeUnavailable` and leaves the controller idle.
    pub fn start(&self, genre: &str, target: Option<TargetWindow>) -> Result<StartAck, SessionError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SessionError::RuntimeUnavailable)?;
        let mut slot = self.shared.lock_slot();
        if slot.active.is_some() {
            return Err(SessionError::SessionAlreadyRunning);
        }
        let genre: Genre = genre.parse()?;
        let algorithm = genre.algorithm();

        let id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);

        self.shared.metrics.begin(genre, algorithm.as_str());
        slot.active = Some(ActiveSession {
            id,
            genre,
            cancel: cancel.clone(),
            finished: finished_rx,
        });

        let job = WorkerJob {
            shared: self.shared.clone(),
            id,
            genre,
            target,
            cancel,
            started_at: Instant::now(),
            started_unix_s: history::now_unix_s(),
        };
        runtime.spawn_blocking(move || job.run(finished_tx));
        drop(slot);

        tracing::info!(
            session_id = %id,
            genre = %genre,
            algorithm = %algorithm,
            target = ?target,
            "testing session started"
        );
        Ok(StartAck {
            session_id: id,
            genre,
            algorithm,
        })
    }

    /// Request cancellation and wait up to the stop timeout for the worker.
    pub async fn stop(&self) -> Result<StopAck, SessionError> {
        let (id, mut finished) = {
            let slot = self.shared.lock_slot();
            let active = slot.active.as_ref().ok_or(SessionError::SessionNotRunning)?;
            active.cancel.cancel();
            (active.id, active.finished.clone())
        };
        tracing::info!(session_id = %id, "stop requested");

        let timeout = self.shared.settings.stop_timeout;
        // A closed channel also means the worker is gone.
        let finished_in_time = tokio::time::timeout(timeout, finished.wait_for(|done| *done))
            .await
            .is_ok();
        if finished_in_time {
            return Ok(StopAck::Stopped);
        }
        tracing::warn!(
            session_id = %id,
            timeout_secs = timeout.as_secs_f64(),
            "worker did not finish before the stop timeout"
        );
        Ok(StopAck::StillFinishing)
    }

    /// Return a terminal status to `Idle`.
    pub fn reset_status(&self) -> Result<SessionStatus, SessionError> {
        let slot = self.shared.lock_slot();
        if slot.active.is_some() {
            return Err(SessionError::SessionAlreadyRunning);
        }
        self.shared.metrics.reset_to_idle();
        Ok(self.shared.metrics.status())
    }
}

/// Clears the slot and signals completion on every exit path of a worker.
struct FinishGuard {
    shared: Arc<Shared>,
    id: Uuid,
    finished: watch::Sender<bool>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!(session_id = %self.id, "session worker panicked");
            self.shared.metrics.fail("session worker panicked");
        }
        {
            let mut slot = self.shared.lock_slot();
            if slot.active.as_ref().is_some_and(|active| active.id == self.id) {
                slot.active = None;
            }
        }
        self.finished.send_replace(true);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

struct WorkerJob {
    shared: Arc<Shared>,
    id: Uuid,
    genre: Genre,
    target: Option<TargetWindow>,
    cancel: CancelToken,
    started_at: Instant,
    started_unix_s: u64,
}

impl WorkerJob {
    fn run(self, finished: watch::Sender<bool>) {
        let _guard = FinishGuard {
            shared: self.shared.clone(),
            id: self.id,
            finished,
        };
        let algorithm = self.genre.algorithm();
        let mut hook = SessionHook::new(
            self.shared.metrics.clone(),
            self.cancel.clone(),
            self.shared.settings.metrics_interval,
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive(algorithm, &mut hook)))
            .unwrap_or_else(|payload| {
                Err(HarnessError::Training(format!(
                    "session worker panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        hook.publish();

        let (status, notes) = match &result {
            Ok((outcome, policy)) if self.cancel.is_cancelled() => (
                SessionStatus::Stopped,
                format!(
                    "stopped by request after {} steps ({} episodes, policy {})",
                    outcome.steps,
                    outcome.episodes,
                    policy.name()
                ),
            ),
            Ok((outcome, policy)) => (
                SessionStatus::Completed,
                format!(
                    "completed {} steps ({} episodes, policy {})",
                    outcome.steps,
                    outcome.episodes,
                    policy.name()
                ),
            ),
            Err(err) => (SessionStatus::Error, err.to_string()),
        };

        match &result {
            Ok((_, policy)) => {
                self.save_checkpoint(algorithm, policy.as_ref());
                self.shared.metrics.set_status(status);
            }
            Err(err) => {
                tracing::error!(session_id = %self.id, genre = %self.genre, "session failed: {err}");
                self.shared.metrics.fail(err.to_string());
            }
        }

        let record = SessionRecord {
            id: self.id,
            timestamp: self.started_unix_s,
            genre: self.genre,
            algorithm: algorithm.as_str().to_string(),
            status,
            duration_seconds: self.started_at.elapsed().as_secs_f64(),
            metrics: RecordedMetrics {
                coverage: hook.coverage,
                crashes: hook.crashes,
                total_steps: hook.total_steps,
                reward_mean: hook.reward_mean(),
                episodes: result
                    .as_ref()
                    .map(|(outcome, _)| outcome.episodes)
                    .unwrap_or(hook.episodes),
            },
            notes: Some(notes),
        };
        if let Err(err) = self.shared.history.record(&record) {
            tracing::error!(session_id = %self.id, "failed to persist session history: {err}");
        }

        tracing::info!(
            session_id = %self.id,
            genre = %self.genre,
            status = %status,
            total_steps = hook.total_steps,
            coverage = hook.coverage,
            crashes = hook.crashes,
            duration_secs = record.duration_seconds,
            "testing session finished"
        );
    }

    /// Build the environment and policy, then train. The environment is
    /// closed before this returns, whatever the outcome.
    fn drive(
        &self,
        algorithm: Algorithm,
        hook: &mut SessionHook,
    ) -> Result<(TrainOutcome, Box<dyn Policy>), HarnessError> {
        let settings = &self.shared.settings;
        let mut env = self
            .shared
            .environments
            .create(self.genre, self.target, &settings.episode)?;

        let mut policy = match self
            .shared
            .policies
            .build(algorithm, env.action_space())
        {
            Ok(policy) => policy,
            Err(err) => {
                env.close();
                return Err(HarnessError::PolicyInit(err.to_string()));
            }
        };

        self.shared.metrics.set_status(SessionStatus::Running);
        tracing::info!(session_id = %self.id, policy = policy.name(), "training started");

        let trained = policy.train(env.as_mut(), settings.total_steps, hook);
        env.close();
        let outcome = trained.map_err(|err| HarnessError::Training(err.to_string()))?;
        Ok((outcome, policy))
    }

    fn save_checkpoint(&self, algorithm: Algorithm, policy: &dyn Policy) {
        let Some(dir) = self.shared.settings.models_dir.as_ref() else {
            return;
        };
        let path = dir.join(format!("{}_{}.json", self.genre, algorithm));
        match policy.save(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "policy checkpoint saved"),
            Err(err) => tracing::warn!(path = %path.display(), "failed to save policy checkpoint: {err}"),
        }
    }
}

/// Per-step bookkeeping: cancellation, counters and periodic publishing.
struct SessionHook {
    metrics: MetricsHub,
    cancel: CancelToken,
    interval: u64,
    total_steps: u64,
    crashes: u64,
    coverage: usize,
    episodes: u64,
    rewards: VecDeque<f64>,
    fps: f64,
    window_started: Instant,
    window_steps: u64,
}

impl SessionHook {
    fn new(metrics: MetricsHub, cancel: CancelToken, interval: u64) -> Self {
        Self {
            metrics,
            cancel,
            interval: interval.max(1),
            total_steps: 0,
            crashes: 0,
            coverage: 0,
            episodes: 0,
            rewards: VecDeque::with_capacity(REWARD_WINDOW),
            fps: 0.0,
            window_started: Instant::now(),
            window_steps: 0,
        }
    }

    fn reward_mean(&self) -> f64 {
        if self.rewards.is_empty() {
            0.0
        } else {
            self.rewards.iter().sum::<f64>() / self.rewards.len() as f64
        }
    }

    fn publish(&mut self) {
        let elapsed = self.window_started.elapsed().as_secs_f64();
        if self.window_steps > 0 && elapsed > 0.0 {
            self.fps = self.window_steps as f64 / elapsed;
        }
        self.window_started = Instant::now();
        self.window_steps = 0;

        let (coverage, crashes, total_steps, fps) =
            (self.coverage, self.crashes, self.total_steps, self.fps);
        let reward_mean = self.reward_mean();
        self.metrics.update(|m| {
            m.coverage = coverage;
            m.crashes = crashes;
            m.total_steps = total_steps;
            m.fps = fps;
            m.reward_mean = reward_mean;
        });
    }
}

impl StepHook for SessionHook {
    fn on_step(&mut self, ctx: &StepContext<'_>) -> HookSignal {
        self.total_steps += 1;
        self.window_steps += 1;
        self.episodes = ctx.episode;
        self.coverage = ctx.outcome.info.unique_states;
        if ctx.outcome.info.liveness.is_crash {
            self.crashes += 1;
        }
        if self.rewards.len() == REWARD_WINDOW {
            self.rewards.pop_front();
        }
        self.rewards.push_back(ctx.outcome.reward);

        if self.cancel.is_cancelled() {
            self.cancel.acknowledge();
            self.publish();
            return HookSignal::Stop;
        }
        if self.total_steps % self.interval == 0 {
            self.publish();
        }
        HookSignal::Continue
    }
}
