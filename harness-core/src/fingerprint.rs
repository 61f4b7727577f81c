//! Average-hash fingerprints of frames.
//!
//! A frame is reduced to an 8×8 luminance grid; each cell contributes one bit
//! (1 when brighter than the grid mean). Bits are packed row-major with the
//! top-left cell in the most significant position. Identical frames always
//! collide; similar frames usually do, but nothing guarantees it.

use std::fmt;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub const GRID_SIDE: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Callers must reject empty frames before hashing.
pub fn fingerprint(frame: &Frame) -> Fingerprint {
    let gray = imageops::grayscale(frame.image());
    let small = imageops::resize(&gray, GRID_SIDE, GRID_SIDE, FilterType::Triangle);

    let cells: Vec<u8> = small.pixels().map(|pixel| pixel.0[0]).collect();
    let mean = cells.iter().map(|&v| f64::from(v)).sum::<f64>() / cells.len() as f64;

    let bits = cells
        .iter()
        .fold(0u64, |acc, &cell| (acc << 1) | u64::from(f64::from(cell) > mean));
    Fingerprint(bits)
}
