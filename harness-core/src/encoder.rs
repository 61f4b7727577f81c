use std::collections::VecDeque;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    /// Number of stacked frames (K).
    pub stack: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 84,
            height: 84,
            stack: 4,
        }
    }
}

/// Channel-last `(height, width, stack)` tensor with values in `[0, 1]`.
/// Channel 0 holds the oldest frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub height: usize,
    pub width: usize,
    pub depth: usize,
    pub data: Vec<f32>,
}

impl Observation {
    pub fn zeros(height: usize, width: usize, depth: usize) -> Self {
        Self {
            height,
            width,
            depth,
            data: vec![0.0; height * width * depth],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.depth)
    }

    pub fn at(&self, y: usize, x: usize, channel: usize) -> f32 {
        self.data[(y * self.width + x) * self.depth + channel]
    }
}

/// Grayscale, resize, normalize, then push into a ring of the last K frames.
pub struct StateEncoder {
    config: EncoderConfig,
    frames: VecDeque<Vec<f32>>,
}

impl StateEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        let stack = config.stack.max(1);
        Self {
            config: EncoderConfig { stack, ..config },
            frames: VecDeque::with_capacity(stack),
        }
    }

    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Encode one capture. A missing frame yields an all-zero observation and
    /// leaves the stack untouched.
    pub fn encode(&mut self, frame: Option<&Frame>) -> Observation {
        let Some(frame) = frame else {
            return self.blank();
        };

        let gray = imageops::grayscale(frame.image());
        let resized = imageops::resize(
            &gray,
            self.config.width,
            self.config.height,
            FilterType::Triangle,
        );
        let plane: Vec<f32> = resized
            .pixels()
            .map(|pixel| f32::from(pixel.0[0]) / 255.0)
            .collect();

        if self.frames.is_empty() {
            // First frame after a reset fills the whole stack.
            for _ in 0..self.config.stack {
                self.frames.push_back(plane.clone());
            }
        } else {
            if self.frames.len() == self.config.stack {
                self.frames.pop_front();
            }
            self.frames.push_back(plane);
        }

        self.stacked()
    }

    pub fn blank(&self) -> Observation {
        Observation::zeros(
            self.config.height as usize,
            self.config.width as usize,
            self.config.stack,
        )
    }

    fn stacked(&self) -> Observation {
        let mut obs = self.blank();
        let depth = obs.depth;
        for (channel, plane) in self.frames.iter().enumerate() {
            for (pixel, value) in plane.iter().enumerate() {
                obs.data[pixel * depth + channel] = *value;
            }
        }
        obs
    }
}
