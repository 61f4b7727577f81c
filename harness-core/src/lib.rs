pub mod backend;
pub mod coverage;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod encoder;
pub mod episode;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod genre;
pub mod input;
pub mod liveness;
pub mod policy;
pub mod reward;
pub mod session;

pub use backend::{default_factory, EnvironmentFactory, TargetWindow};
pub use episode::{Action, Environment, Episode, EpisodeConfig, EpisodeIo, StepInfo, StepOutcome};
pub use error::{CaptureError, DeliveryError, HarnessError, PolicyError, SessionError};
pub use genre::{ActionSpace, Algorithm, Genre};
pub use policy::{ExplorerFactory, Policy, PolicyFactory};
pub use session::{
    HistorySink, MetricsSnapshot, RecordedMetrics, SessionController, SessionRecord,
    SessionSettings, SessionStatus, StartAck, StopAck,
};
