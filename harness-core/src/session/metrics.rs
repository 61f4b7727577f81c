use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::genre::Genre;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    Initializing,
    Running,
    Completed,
    Stopped,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing => "Initializing",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Idle,
            Self::Initializing,
            Self::Running,
            Self::Completed,
            Self::Stopped,
            Self::Error,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown session status: {s}"))
    }
}

/// Flat, overwrite-by-key view of the running (or last) session.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub coverage: usize,
    pub crashes: u64,
    pub fps: f64,
    pub current_algorithm: Option<String>,
    pub status: SessionStatus,
    pub total_steps: u64,
    pub reward_mean: f64,
    pub genre: Option<Genre>,
    /// Last session failure; cleared when a new session starts.
    pub error: Option<String>,
}

/// Single-writer metrics sink. Readers never take the session lock.
#[derive(Clone, Debug, Default)]
pub struct MetricsHub {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl MetricsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    pub fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut *guard);
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.update(|m| m.status = status);
    }

    /// Fresh counters for a new session in `Initializing`.
    pub(crate) fn begin(&self, genre: Genre, algorithm: &str) {
        self.update(|m| {
            *m = MetricsSnapshot {
                status: SessionStatus::Initializing,
                current_algorithm: Some(algorithm.to_string()),
                genre: Some(genre),
                ..MetricsSnapshot::default()
            };
        });
    }

    pub(crate) fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|m| {
            m.status = SessionStatus::Error;
            m.error = Some(message);
        });
    }

    /// Move a terminal status back to `Idle`. Returns whether anything changed.
    pub(crate) fn reset_to_idle(&self) -> bool {
        let mut changed = false;
        self.update(|m| {
            if m.status.is_terminal() {
                m.status = SessionStatus::Idle;
                m.error = None;
                changed = true;
            }
        });
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_idle() {
        let hub = MetricsHub::new();
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert_eq!(snapshot.total_steps, 0);
        assert_eq!(snapshot.current_algorithm, None);
    }

    #[test]
    fn begin_clears_previous_error() {
        let hub = MetricsHub::new();
        hub.fail("capture device missing");
        assert_eq!(hub.status(), SessionStatus::Error);

        hub.begin(Genre::Fps, "PPO");
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Initializing);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.current_algorithm.as_deref(), Some("PPO"));
    }

    #[test]
    fn reset_only_touches_terminal_states() {
        let hub = MetricsHub::new();
        hub.set_status(SessionStatus::Running);
        assert!(!hub.reset_to_idle());
        assert_eq!(hub.status(), SessionStatus::Running);

        hub.fail("boom");
        assert!(hub.reset_to_idle());
        assert_eq!(hub.snapshot().error, None);
        assert_eq!(hub.status(), SessionStatus::Idle);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("stopped".parse::<SessionStatus>(), Ok(SessionStatus::Stopped));
        assert!("paused".parse::<SessionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&SessionStatus::Completed).unwrap(),
            "\"Completed\""
        );
    }
}
