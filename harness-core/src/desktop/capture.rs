use image::{imageops, DynamicImage, RgbaImage};
use xcap::Monitor;

use crate::error::{CaptureError, HarnessError};
use crate::frame::{CaptureRegion, Frame, FrameSource};

/// Grabs a fixed rectangle of one monitor.
pub struct ScreenCapture {
    monitor: Option<Monitor>,
    region: CaptureRegion,
}

impl ScreenCapture {
    pub fn open(region: CaptureRegion) -> Result<Self, HarnessError> {
        let monitors = Monitor::all()
            .map_err(|err| HarnessError::EnvironmentInit(format!("failed to list monitors: {err}")))?;
        let count = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(region.monitor.saturating_sub(1))
            .ok_or_else(|| {
                HarnessError::EnvironmentInit(format!(
                    "monitor {} not found ({count} available)",
                    region.monitor
                ))
            })?;

        tracing::info!(
            monitor = monitor.name(),
            top = region.top,
            left = region.left,
            width = region.width,
            height = region.height,
            "screen capture ready"
        );
        Ok(Self {
            monitor: Some(monitor),
            region,
        })
    }
}

impl FrameSource for ScreenCapture {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let monitor = self
            .monitor
            .as_ref()
            .ok_or_else(|| CaptureError("capture resource released".to_string()))?;
        let shot = monitor
            .capture_image()
            .map_err(|err| CaptureError(err.to_string()))?;

        let (width, height) = (shot.width(), shot.height());
        let full = RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or_else(|| CaptureError("capture buffer has the wrong size".to_string()))?;

        let left = self.region.left.max(0) as u32;
        let top = self.region.top.max(0) as u32;
        if left >= width || top >= height {
            return Err(CaptureError(format!(
                "region origin ({left}, {top}) is outside the {width}x{height} monitor"
            )));
        }
        let crop_width = self.region.width.min(width - left);
        let crop_height = self.region.height.min(height - top);
        let cropped = imageops::crop_imm(&full, left, top, crop_width, crop_height).to_image();

        Ok(Frame::new(DynamicImage::ImageRgba8(cropped).into_rgb8()))
    }

    fn close(&mut self) {
        self.monitor = None;
    }
}
