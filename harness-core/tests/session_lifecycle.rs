use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use harness_core::backend::UnavailableBackend;
use harness_core::encoder::{EncoderConfig, Observation};
use harness_core::error::{CaptureError, DeliveryError};
use harness_core::frame::{Frame, FrameSource};
use harness_core::input::{DeliveryChain, DeliveryStrategy, KeyDirection, VirtualKey};
use harness_core::liveness::AssumeAlive;
use harness_core::policy::{StepHook, TrainOutcome};
use harness_core::session::MemoryHistory;
use harness_core::{
    Action, ActionSpace, Algorithm, Environment, EnvironmentFactory, Episode, EpisodeConfig,
    EpisodeIo, ExplorerFactory, Genre, HarnessError, Policy, PolicyError, PolicyFactory,
    SessionController, SessionError, SessionSettings, SessionStatus, StopAck, TargetWindow,
};
use image::{Rgb, RgbImage};

/// Each capture lights the cells of an 8x8 grid that match a step counter.
struct CountingScreen {
    counter: u64,
}

impl FrameSource for CountingScreen {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.counter += 1;
        let n = self.counter;
        Ok(Frame::new(RgbImage::from_fn(8, 8, |x, y| {
            if (n >> ((y * 8 + x) % 16)) & 1 == 1 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })))
    }
}

struct Discard;

impl DeliveryStrategy for Discard {
    fn name(&self) -> &'static str {
        "discard"
    }

    fn deliver(&mut self, _key: VirtualKey, _dir: KeyDirection) -> Result<(), DeliveryError> {
        Ok(())
    }
}

struct FakeDesktop {
    created: AtomicU64,
}

impl FakeDesktop {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            created: AtomicU64::new(0),
        })
    }
}

impl EnvironmentFactory for FakeDesktop {
    fn create(
        &self,
        genre: Genre,
        _target: Option<TargetWindow>,
        config: &EpisodeConfig,
    ) -> Result<Box<dyn Environment>, HarnessError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Episode::new(
            genre,
            *config,
            EpisodeIo {
                frames: Box::new(CountingScreen { counter: 0 }),
                delivery: DeliveryChain::new(vec![Box::new(Discard)]),
                probe: Box::new(AssumeAlive),
            },
        )))
    }
}

/// Takes a few steps and then panics inside `train`.
struct Panicking;

impl Policy for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn act(&mut self, _observation: &Observation) -> Action {
        Action::Discrete(0)
    }

    fn train(
        &mut self,
        env: &mut dyn Environment,
        _total_steps: u64,
        _hook: &mut dyn StepHook,
    ) -> Result<TrainOutcome, PolicyError> {
        env.reset()?;
        env.step(&Action::Discrete(0))?;
        panic!("replay buffer exploded");
    }

    fn save(&self, _path: &Path) -> Result<(), PolicyError> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> Result<(), PolicyError> {
        Ok(())
    }
}

struct PanickingFactory;

impl PolicyFactory for PanickingFactory {
    fn build(
        &self,
        _algorithm: Algorithm,
        _action_space: ActionSpace,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        Ok(Box::new(Panicking))
    }
}

fn settings(total_steps: u64) -> SessionSettings {
    SessionSettings {
        episode: EpisodeConfig {
            encoder: EncoderConfig {
                width: 8,
                height: 8,
                stack: 2,
            },
            settle_delay: Duration::from_millis(1),
            ..EpisodeConfig::default()
        },
        total_steps,
        metrics_interval: 5,
        stop_timeout: Duration::from_secs(10),
        models_dir: None,
    }
}

fn controller(
    settings: SessionSettings,
    environments: Arc<dyn EnvironmentFactory>,
) -> (SessionController, Arc<MemoryHistory>) {
    let history = Arc::new(MemoryHistory::new());
    let controller = SessionController::new(
        settings,
        environments,
        Arc::new(ExplorerFactory { seed: Some(7) }),
        history.clone(),
    );
    (controller, history)
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn start_run_stop_records_history() {
    let (controller, history) = controller(settings(u64::MAX), FakeDesktop::new());
    assert_eq!(controller.metrics().status, SessionStatus::Idle);

    let started = Instant::now();
    let ack = controller.start("platformer", None).unwrap();
    assert_eq!(ack.algorithm.as_str(), "DQN");
    assert!(matches!(
        controller.metrics().status,
        SessionStatus::Initializing | SessionStatus::Running
    ));
    assert_eq!(controller.current_genre(), Some(Genre::Platformer));

    wait_for("running with steps", || {
        let metrics = controller.metrics();
        metrics.status == SessionStatus::Running && metrics.total_steps >= 5
    })
    .await;

    let stop_called = Instant::now();
    assert_eq!(controller.stop().await, Ok(StopAck::Stopped));
    assert!(stop_called.elapsed() < Duration::from_secs(1));
    let elapsed = started.elapsed().as_secs_f64();

    assert!(!controller.is_running());
    assert_eq!(controller.current_genre(), None);
    let metrics = controller.metrics();
    assert_eq!(metrics.status, SessionStatus::Stopped);
    assert!(metrics.coverage > 0);

    let records = history.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, ack.session_id);
    assert_eq!(record.status, SessionStatus::Stopped);
    assert_eq!(record.genre, Genre::Platformer);
    assert_eq!(record.algorithm, "DQN");
    assert!(record.duration_seconds > 0.0);
    assert!(record.duration_seconds <= elapsed + 0.05);
    assert!(record.metrics.total_steps >= 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn only_one_session_at_a_time() {
    let desktop = FakeDesktop::new();
    let (controller, _history) = controller(settings(u64::MAX), desktop.clone());

    assert_eq!(controller.stop().await, Err(SessionError::SessionNotRunning));

    controller.start("fps", None).unwrap();
    assert_eq!(
        controller.start("racing", None),
        Err(SessionError::SessionAlreadyRunning)
    );
    assert_eq!(
        controller.reset_status(),
        Err(SessionError::SessionAlreadyRunning)
    );

    assert_eq!(controller.stop().await, Ok(StopAck::Stopped));
    controller.start("racing", None).unwrap();
    assert!(controller.is_running());
    assert_eq!(controller.stop().await, Ok(StopAck::Stopped));

    assert_eq!(desktop.created.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_genre_is_rejected_without_side_effects() {
    let desktop = FakeDesktop::new();
    let (controller, history) = controller(settings(10), desktop.clone());

    let err = controller.start("chess", None).unwrap_err();
    assert_eq!(err.code(), "invalid_genre");
    assert!(!controller.is_running());
    assert_eq!(controller.metrics().status, SessionStatus::Idle);
    assert!(history.records().is_empty());
    assert_eq!(desktop.created.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn finished_run_completes_and_saves_a_checkpoint() {
    let models = tempfile::tempdir().unwrap();
    let mut settings = settings(20);
    settings.models_dir = Some(models.path().to_path_buf());
    let (controller, history) = controller(settings, FakeDesktop::new());

    controller.start("rpg", None).unwrap();
    wait_for("worker exit", || !controller.is_running()).await;

    let metrics = controller.metrics();
    assert_eq!(metrics.status, SessionStatus::Completed);
    assert_eq!(metrics.total_steps, 20);
    assert_eq!(metrics.current_algorithm.as_deref(), Some("HRL"));

    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Completed);
    assert_eq!(records[0].metrics.total_steps, 20);
    assert!(models.path().join("rpg_HRL.json").exists());

    assert_eq!(controller.reset_status(), Ok(SessionStatus::Idle));
}

#[tokio::test(flavor = "multi_thread")]
async fn init_failure_ends_in_error_and_is_recorded() {
    let (controller, history) = controller(settings(10), Arc::new(UnavailableBackend));

    controller.start("racing", None).unwrap();
    wait_for("worker exit", || !controller.is_running()).await;

    let metrics = controller.metrics();
    assert_eq!(metrics.status, SessionStatus::Error);
    assert!(metrics
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("desktop support"));

    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Error);
    assert!(records[0].notes.as_deref().unwrap_or_default().contains("initialize"));

    assert_eq!(controller.reset_status(), Ok(SessionStatus::Idle));
    assert_eq!(controller.metrics().error, None);

    controller.start("racing", None).unwrap();
    wait_for("worker exit", || !controller.is_running()).await;
    assert_eq!(history.records().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_worker_gets_a_soft_stop_acknowledgement() {
    let mut settings = settings(u64::MAX);
    settings.episode.settle_delay = Duration::from_millis(400);
    settings.stop_timeout = Duration::from_millis(20);
    let (controller, history) = controller(settings, FakeDesktop::new());

    controller.start("platformer", None).unwrap();
    wait_for("running", || controller.metrics().status == SessionStatus::Running).await;

    assert_eq!(controller.stop().await, Ok(StopAck::StillFinishing));
    wait_for("worker exit", || !controller.is_running()).await;
    assert_eq!(controller.metrics().status, SessionStatus::Stopped);
    assert_eq!(history.records().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_policy_ends_in_error_and_is_recorded() {
    let history = Arc::new(MemoryHistory::new());
    let controller = SessionController::new(
        settings(100),
        FakeDesktop::new(),
        Arc::new(PanickingFactory),
        history.clone(),
    );

    controller.start("platformer", None).unwrap();
    wait_for("worker exit", || !controller.is_running()).await;

    let metrics = controller.metrics();
    assert_eq!(metrics.status, SessionStatus::Error);
    assert!(metrics
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("replay buffer exploded"));

    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Error);
    assert_eq!(records[0].algorithm, "DQN");
    assert!(records[0].notes.as_deref().unwrap_or_default().contains("panicked"));

    assert_eq!(controller.reset_status(), Ok(SessionStatus::Idle));
    controller.start("platformer", None).unwrap();
    wait_for("worker exit", || !controller.is_running()).await;
    assert_eq!(history.records().len(), 2);
}

#[test]
fn start_outside_a_runtime_leaves_the_controller_idle() {
    let desktop = FakeDesktop::new();
    let (controller, history) = controller(settings(10), desktop.clone());

    assert_eq!(
        controller.start("platformer", None),
        Err(SessionError::RuntimeUnavailable)
    );
    assert!(!controller.is_running());
    assert_eq!(controller.current_genre(), None);
    assert_eq!(controller.metrics().status, SessionStatus::Idle);
    assert!(history.records().is_empty());
    assert_eq!(desktop.created.load(Ordering::SeqCst), 0);
}
