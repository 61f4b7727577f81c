use std::fmt;

/// Caller-facing lifecycle failures. Returned synchronously from `start`,
/// `stop` and `reset_status`; everything else is observed through metrics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    InvalidGenre { given: String },
    SessionAlreadyRunning,
    SessionNotRunning,
    /// `start` was called outside a tokio runtime.
    RuntimeUnavailable,
}

impl SessionError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGenre { .. } => "invalid_genre",
            Self::SessionAlreadyRunning => "session_already_running",
            Self::SessionNotRunning => "session_not_running",
            Self::RuntimeUnavailable => "runtime_unavailable",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGenre { given } => write!(
                f,
                "invalid genre: {given} (expected platformer|fps|racing|rpg)"
            ),
            Self::SessionAlreadyRunning => write!(f, "a testing session is already running"),
            Self::SessionNotRunning => write!(f, "no active testing session to stop"),
            Self::RuntimeUnavailable => {
                write!(f, "cannot start a session outside a tokio runtime")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Session-level failures. These end the worker in `Error` and are recorded in
/// history; they never cross the session boundary as a panic or `Err`.
#[derive(Clone, Debug, PartialEq)]
pub enum HarnessError {
    EnvironmentInit(String),
    PolicyInit(String),
    Training(String),
    ActionContract { expected: &'static str, got: &'static str },
    /// `step` on an episode that was never reset or is already closed.
    EpisodeState(&'static str),
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentInit(reason) => {
                write!(f, "failed to initialize game environment: {reason}")
            }
            Self::PolicyInit(reason) => write!(f, "failed to initialize policy: {reason}"),
            Self::Training(reason) => write!(f, "training failed: {reason}"),
            Self::ActionContract { expected, got } => write!(
                f,
                "action does not match the episode contract: expected {expected}, got {got}"
            ),
            Self::EpisodeState(reason) => write!(f, "episode not ready: {reason}"),
        }
    }
}

impl std::error::Error for HarnessError {}

/// A single capture returned no frame. Absorbed by the episode as a blank
/// observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureError(pub String);

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen capture failed: {}", self.0)
    }
}

impl std::error::Error for CaptureError {}

/// One delivery strategy failed to deliver one input event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryError {
    Unsupported,
    NoTargetWindow,
    Rejected(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "input not supported by this strategy"),
            Self::NoTargetWindow => write!(f, "no target window handle"),
            Self::Rejected(reason) => write!(f, "input rejected: {reason}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyError {
    UnsupportedActionSpace(String),
    Persistence(String),
    Environment(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedActionSpace(reason) => {
                write!(f, "unsupported action space: {reason}")
            }
            Self::Persistence(reason) => write!(f, "policy persistence failed: {reason}"),
            Self::Environment(reason) => write!(f, "environment failed during training: {reason}"),
        }
    }
}

impl std::error::Error for PolicyError {}

impl From<HarnessError> for PolicyError {
    fn from(err: HarnessError) -> Self {
        Self::Environment(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_codes_are_stable() {
        assert_eq!(
            SessionError::InvalidGenre {
                given: "chess".to_string()
            }
            .code(),
            "invalid_genre"
        );
        assert_eq!(
            SessionError::SessionAlreadyRunning.code(),
            "session_already_running"
        );
        assert_eq!(SessionError::SessionNotRunning.code(), "session_not_running");
    }

    #[test]
    fn invalid_genre_message_names_the_input() {
        let err = SessionError::InvalidGenre {
            given: "Chess".to_string(),
        };
        assert!(err.to_string().contains("Chess"));
    }
}
