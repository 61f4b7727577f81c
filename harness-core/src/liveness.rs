use std::time::{Duration, Instant};

use serde::Serialize;

use crate::fingerprint::Fingerprint;

pub const DEFAULT_FREEZE_THRESHOLD: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub is_crash: bool,
    pub is_freeze: bool,
}

/// External "is the target process still there" signal.
pub trait ProcessProbe {
    fn is_alive(&mut self) -> bool;
}

/// Probe used when no target process is tracked.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssumeAlive;

impl ProcessProbe for AssumeAlive {
    fn is_alive(&mut self) -> bool {
        true
    }
}

/// Freeze detector over the fingerprint stream.
///
/// Visual analysis alone never reports a crash; that needs the external
/// liveness signal.
#[derive(Debug)]
pub struct LivenessMonitor {
    freeze_threshold: Duration,
    last_fingerprint: Option<Fingerprint>,
    last_change: Instant,
}

impl LivenessMonitor {
    pub fn new(freeze_threshold: Duration) -> Self {
        Self {
            freeze_threshold,
            last_fingerprint: None,
            last_change: Instant::now(),
        }
    }

    pub fn freeze_threshold(&self) -> Duration {
        self.freeze_threshold
    }

    pub fn check(&mut self, fp: Fingerprint, process_alive: bool) -> LivenessReport {
        self.check_at(fp, process_alive, Instant::now())
    }

    pub fn check_at(&mut self, fp: Fingerprint, process_alive: bool, now: Instant) -> LivenessReport {
        if !process_alive {
            return LivenessReport {
                is_crash: true,
                is_freeze: false,
            };
        }

        if self.last_fingerprint == Some(fp) {
            let stale_for = now.saturating_duration_since(self.last_change);
            LivenessReport {
                is_crash: false,
                is_freeze: stale_for > self.freeze_threshold,
            }
        } else {
            self.last_fingerprint = Some(fp);
            self.last_change = now;
            LivenessReport::default()
        }
    }

    /// Forget the last fingerprint and restart the timer.
    pub fn reset(&mut self) {
        self.last_fingerprint = None;
        self.last_change = Instant::now();
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_FREEZE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: Fingerprint = Fingerprint(0xAAAA);
    const Y: Fingerprint = Fingerprint(0x5555);

    #[test]
    fn stale_fingerprint_past_threshold_is_a_freeze() {
        let mut monitor = LivenessMonitor::default();
        let t0 = Instant::now();

        assert!(!monitor.check_at(X, true, t0).is_freeze);
        assert!(!monitor.check_at(X, true, t0 + Duration::from_secs(3)).is_freeze);
        assert!(monitor.check_at(X, true, t0 + Duration::from_secs(6)).is_freeze);
    }

    #[test]
    fn changed_fingerprint_resets_the_timer() {
        let mut monitor = LivenessMonitor::default();
        let t0 = Instant::now();

        monitor.check_at(X, true, t0);
        let report = monitor.check_at(Y, true, t0 + Duration::from_secs(6));
        assert_eq!(report, LivenessReport::default());

        assert!(!monitor.check_at(Y, true, t0 + Duration::from_secs(10)).is_freeze);
        assert!(monitor.check_at(Y, true, t0 + Duration::from_secs(12)).is_freeze);
    }

    #[test]
    fn exactly_at_threshold_is_not_yet_frozen() {
        let mut monitor = LivenessMonitor::default();
        let t0 = Instant::now();
        monitor.check_at(X, true, t0);
        assert!(!monitor.check_at(X, true, t0 + Duration::from_secs(5)).is_freeze);
    }

    #[test]
    fn dead_process_is_a_crash_regardless_of_history() {
        let mut monitor = LivenessMonitor::default();
        let t0 = Instant::now();
        monitor.check_at(X, true, t0);

        for (fp, at) in [(X, 1), (Y, 20), (X, 40)] {
            let report = monitor.check_at(fp, false, t0 + Duration::from_secs(at));
            assert_eq!(
                report,
                LivenessReport {
                    is_crash: true,
                    is_freeze: false
                }
            );
        }
    }

    #[test]
    fn visual_analysis_never_reports_a_crash() {
        let mut monitor = LivenessMonitor::new(Duration::from_millis(1));
        let t0 = Instant::now();
        monitor.check_at(X, true, t0);
        assert!(!monitor.check_at(X, true, t0 + Duration::from_secs(60)).is_crash);
    }

    #[test]
    fn reset_forgets_the_last_fingerprint() {
        let mut monitor = LivenessMonitor::default();
        let t0 = Instant::now();
        monitor.check_at(X, true, t0);
        monitor.reset();
        let later = Instant::now() + Duration::from_secs(30);
        assert!(!monitor.check_at(X, true, later).is_freeze);
    }
}
