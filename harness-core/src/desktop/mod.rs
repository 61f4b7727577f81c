//! Real screen and keyboard backends.

mod capture;
mod synth;
mod window;

pub use capture::ScreenCapture;
pub use synth::SynthesizedInput;
#[cfg(windows)]
pub use window::WindowMessages;
pub use window::{focus_window, WindowProbe};

use crate::backend::{EnvironmentFactory, TargetWindow};
use crate::episode::{Environment, Episode, EpisodeConfig, EpisodeIo};
use crate::error::HarnessError;
use crate::frame::CaptureRegion;
use crate::genre::Genre;
use crate::input::{DeliveryChain, DeliveryStrategy};
use crate::liveness::{AssumeAlive, ProcessProbe};

/// Builds episodes that watch a monitor region and type into the desktop.
#[derive(Clone, Copy, Debug)]
pub struct DesktopBackend {
    region: CaptureRegion,
}

impl DesktopBackend {
    pub fn new(region: CaptureRegion) -> Self {
        Self { region }
    }

    fn delivery(target: Option<TargetWindow>) -> Result<DeliveryChain, HarnessError> {
        let mut chain = DeliveryChain::default();

        #[cfg(windows)]
        if let Some(window) = target {
            chain.push(Box::new(WindowMessages::new(window)));
        }
        #[cfg(not(windows))]
        if target.is_some() {
            tracing::debug!("window messages are only supported on Windows; using synthesized input");
        }

        match SynthesizedInput::new() {
            Ok(synth) => chain.push(Box::new(synth) as Box<dyn DeliveryStrategy>),
            Err(err) if !chain.is_empty() => tracing::warn!("{err}; relying on window messages"),
            Err(err) => return Err(err),
        }
        Ok(chain)
    }
}

impl EnvironmentFactory for DesktopBackend {
    fn create(
        &self,
        genre: Genre,
        target: Option<TargetWindow>,
        config: &EpisodeConfig,
    ) -> Result<Box<dyn Environment>, HarnessError> {
        let frames = ScreenCapture::open(self.region)?;
        let delivery = Self::delivery(target)?;
        let probe: Box<dyn ProcessProbe> = match target {
            Some(window) => {
                focus_window(window);
                Box::new(WindowProbe::new(window))
            }
            None => Box::new(AssumeAlive),
        };

        tracing::info!(
            genre = %genre,
            target = ?target,
            strategies = delivery.len(),
            "desktop environment ready"
        );
        Ok(Box::new(Episode::new(
            genre,
            *config,
            EpisodeIo {
                frames: Box::new(frames),
                delivery,
                probe,
            },
        )))
    }
}
