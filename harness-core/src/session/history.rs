use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metrics::SessionStatus;
use crate::genre::Genre;

pub(crate) fn now_unix_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedMetrics {
    pub coverage: usize,
    pub crashes: u64,
    pub total_steps: u64,
    pub reward_mean: f64,
    pub episodes: u64,
}

/// Summary of one finished session. Written once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    /// Unix seconds at which the session started.
    pub timestamp: u64,
    pub genre: Genre,
    pub algorithm: String,
    pub status: SessionStatus,
    pub duration_seconds: f64,
    pub metrics: RecordedMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Where finished sessions are persisted.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &SessionRecord) -> Result<(), String>;
}

/// Keeps records in process memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, record: &SessionRecord) -> Result<(), String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
