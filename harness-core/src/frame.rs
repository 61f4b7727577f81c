use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// One captured screen region. Owned by the step that captured it.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Zero-sized frames carry no visual state and are treated as a failed capture.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Screen rectangle to capture, relative to the selected monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
    /// 1-based monitor index (1 = primary).
    pub monitor: usize,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            top: 0,
            left: 0,
            width: 1920,
            height: 1080,
            monitor: 1,
        }
    }
}

/// Blocking screen grabber. Runs on the session worker thread only.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError>;

    /// Release the capture resource. Called once from `Episode::close`.
    fn close(&mut self) {}
}

/// Capture once, absorbing failures into `None` the way the step loop expects.
pub(crate) fn capture_or_log(source: &mut dyn FrameSource) -> Option<Frame> {
    match source.capture() {
        Ok(frame) if frame.is_empty() => {
            tracing::warn!("screen capture returned an empty frame");
            None
        }
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::warn!("{err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl FrameSource for Failing {
        fn capture(&mut self) -> Result<Frame, CaptureError> {
            Err(CaptureError("display gone".to_string()))
        }
    }

    struct Empty;

    impl FrameSource for Empty {
        fn capture(&mut self) -> Result<Frame, CaptureError> {
            Ok(Frame::new(RgbImage::new(0, 0)))
        }
    }

    #[test]
    fn failed_and_empty_captures_degrade_to_none() {
        assert!(capture_or_log(&mut Failing).is_none());
        assert!(capture_or_log(&mut Empty).is_none());
    }

    #[test]
    fn default_region_is_primary_full_hd() {
        let region = CaptureRegion::default();
        assert_eq!((region.width, region.height, region.monitor), (1920, 1080, 1));
    }
}
