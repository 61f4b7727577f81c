use std::collections::BTreeMap;

use harness_core::{Genre, SessionRecord, SessionStatus};
use serde::{Deserialize, Serialize};

pub(crate) const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StartTestRequest {
    pub(crate) genre: String,
    #[serde(default)]
    pub(crate) window_hwnd: Option<isize>,
}

/// Body of every successful lifecycle call.
#[derive(Debug, Serialize)]
pub(crate) struct ActionResponse {
    pub(crate) status: &'static str,
    pub(crate) message: String,
}

impl ActionResponse {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}

/// Body of every rejected call, paired with a non-2xx status.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) status: &'static str,
    pub(crate) error: String,
    pub(crate) error_code: &'static str,
}

impl ErrorResponse {
    pub(crate) fn new(error_code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status: "error",
            error: error.into(),
            error_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: SessionStatus,
    pub(crate) is_running: bool,
    pub(crate) current_genre: Option<Genre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    #[serde(default)]
    pub(crate) genre: Option<String>,
    #[serde(default)]
    pub(crate) algorithm: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

impl HistoryQuery {
    /// Effective row cap. `validate` rejects values outside `1..=MAX_HISTORY_LIMIT`.
    pub(crate) fn limit(&self) -> usize {
        self.limit.unwrap_or(MAX_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT)
    }

    /// Returns `(error_message, error_code)` on failure.
    pub(crate) fn validate(&self) -> Result<(), (String, &'static str)> {
        match self.limit {
            Some(limit) if limit == 0 || limit > MAX_HISTORY_LIMIT => Err((
                format!("limit must be between 1 and {MAX_HISTORY_LIMIT}"),
                "invalid_limit",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryListResponse {
    pub(crate) tests: Vec<SessionRecord>,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct HistoryStatistics {
    pub(crate) total_tests: u64,
    pub(crate) by_genre: BTreeMap<String, u64>,
    pub(crate) by_algorithm: BTreeMap<String, u64>,
    pub(crate) by_status: BTreeMap<String, u64>,
    pub(crate) average_coverage: f64,
    pub(crate) average_crashes: f64,
    pub(crate) total_crashes: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) service: &'static str,
    pub(crate) desktop_support: bool,
    pub(crate) current_status: SessionStatus,
    pub(crate) is_running: bool,
    pub(crate) stored_records: usize,
    pub(crate) history_max_records: usize,
    pub(crate) total_steps_per_session: u64,
}
