use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::episode::{Environment, EpisodeConfig};
use crate::error::HarnessError;
use crate::frame::CaptureRegion;
use crate::genre::Genre;

/// Native handle of the window under test (`HWND` on Windows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetWindow(pub isize);

impl fmt::Display for TargetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Builds the environment for one session. Called on the worker thread, so
/// the environment itself does not need to be `Send`.
pub trait EnvironmentFactory: Send + Sync {
    fn create(
        &self,
        genre: Genre,
        target: Option<TargetWindow>,
        config: &EpisodeConfig,
    ) -> Result<Box<dyn Environment>, HarnessError>;
}

/// Stand-in used when the crate is built without the `desktop` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableBackend;

impl EnvironmentFactory for UnavailableBackend {
    fn create(
        &self,
        _genre: Genre,
        _target: Option<TargetWindow>,
        _config: &EpisodeConfig,
    ) -> Result<Box<dyn Environment>, HarnessError> {
        Err(HarnessError::EnvironmentInit(
            "built without desktop support (enable the `desktop` feature)".to_string(),
        ))
    }
}

/// The real screen/input backend when available.
#[cfg(feature = "desktop")]
pub fn default_factory(region: CaptureRegion) -> Arc<dyn EnvironmentFactory> {
    Arc::new(crate::desktop::DesktopBackend::new(region))
}

#[cfg(not(feature = "desktop"))]
pub fn default_factory(region: CaptureRegion) -> Arc<dyn EnvironmentFactory> {
    tracing::warn!(
        ?region,
        "desktop backends not compiled in; sessions will fail to initialize"
    );
    Arc::new(UnavailableBackend)
}
