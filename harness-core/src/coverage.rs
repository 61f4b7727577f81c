use std::collections::HashMap;

use serde::Serialize;

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::frame::Frame;

/// A fingerprint stays "rare" while its visit count is below this.
pub const RARITY_THRESHOLD: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoverageUpdate {
    pub is_new: bool,
    pub is_rare: bool,
    pub visit_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
}

/// Visited fingerprints and their visit counts for one session.
///
/// Grows without eviction; a session of N steps holds at most N entries.
#[derive(Debug, Default)]
pub struct CoverageTracker {
    visits: HashMap<Fingerprint, u32>,
    total_visits: u64,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, frame: Option<&Frame>) -> CoverageUpdate {
        match frame {
            Some(frame) if !frame.is_empty() => self.visit(fingerprint(frame)),
            _ => CoverageUpdate::default(),
        }
    }

    /// Record a visit for an already computed fingerprint.
    pub fn visit(&mut self, fp: Fingerprint) -> CoverageUpdate {
        self.total_visits += 1;
        let count = self.visits.entry(fp).or_insert(0);
        *count += 1;
        let visit_count = *count;

        if visit_count == 1 {
            CoverageUpdate {
                is_new: true,
                is_rare: false,
                visit_count,
                fingerprint: Some(fp),
            }
        } else {
            CoverageUpdate {
                is_new: false,
                is_rare: visit_count < RARITY_THRESHOLD,
                visit_count,
                fingerprint: Some(fp),
            }
        }
    }

    pub fn visits(&self, fp: Fingerprint) -> u32 {
        self.visits.get(&fp).copied().unwrap_or(0)
    }

    pub fn unique_states(&self) -> usize {
        self.visits.len()
    }

    pub fn total_visits(&self) -> u64 {
        self.total_visits
    }
}
