use std::{env, path::PathBuf, sync::Arc, time::Duration};

use harness_core::{
    encoder::EncoderConfig, frame::CaptureRegion, EpisodeConfig, SessionController,
    SessionSettings,
};

use crate::HistoryStore;

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub(crate) const DEFAULT_DATA_DIR: &str = "./data";
pub(crate) const DEFAULT_MODELS_DIR: &str = "./models";
pub(crate) const DEFAULT_HISTORY_MAX_RECORDS: usize = 1000;
pub(crate) const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub(crate) const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
pub(crate) const DEFAULT_SCREEN_MONITOR: usize = 1;
pub(crate) const DEFAULT_IMG_SIZE: u32 = 84;
pub(crate) const DEFAULT_FRAME_STACK_SIZE: usize = 4;
pub(crate) const DEFAULT_TIMESTEPS: u64 = 100_000;
pub(crate) const DEFAULT_SETTLE_DELAY_MS: u64 = 50;
pub(crate) const DEFAULT_FREEZE_THRESHOLD_SECS: u64 = 5;
pub(crate) const DEFAULT_METRICS_INTERVAL_STEPS: u64 = 10;
pub(crate) const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Everything the server reads from the process environment.
#[derive(Debug, Clone)]
pub(crate) struct HarnessConfig {
    pub(crate) bind_addr: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) history_max_records: usize,
    pub(crate) region: CaptureRegion,
    pub(crate) session: SessionSettings,
}

impl HarnessConfig {
    pub(crate) fn from_env() -> Self {
        let region = CaptureRegion {
            top: read_env_i32("SCREEN_TOP", 0),
            left: read_env_i32("SCREEN_LEFT", 0),
            width: read_env_u32("SCREEN_WIDTH", DEFAULT_SCREEN_WIDTH),
            height: read_env_u32("SCREEN_HEIGHT", DEFAULT_SCREEN_HEIGHT),
            monitor: read_env_usize("SCREEN_MONITOR", DEFAULT_SCREEN_MONITOR),
        };

        let encoder = EncoderConfig {
            width: read_env_u32("IMG_WIDTH", DEFAULT_IMG_SIZE),
            height: read_env_u32("IMG_HEIGHT", DEFAULT_IMG_SIZE),
            stack: read_env_usize("FRAME_STACK_SIZE", DEFAULT_FRAME_STACK_SIZE),
        };
        if encoder.width > region.width || encoder.height > region.height {
            tracing::warn!(
                "IMG_WIDTHxIMG_HEIGHT ({}x{}) exceeds the capture region ({}x{}); frames will be upscaled",
                encoder.width,
                encoder.height,
                region.width,
                region.height
            );
        }

        let total_steps = read_env_u64("TIMESTEPS", DEFAULT_TIMESTEPS);
        let mut metrics_interval =
            read_env_u64("METRICS_INTERVAL_STEPS", DEFAULT_METRICS_INTERVAL_STEPS);
        if metrics_interval > total_steps {
            tracing::warn!(
                "METRICS_INTERVAL_STEPS ({}) > TIMESTEPS ({}). Falling back to default.",
                metrics_interval,
                total_steps
            );
            metrics_interval = DEFAULT_METRICS_INTERVAL_STEPS.min(total_steps);
        }

        let episode = EpisodeConfig {
            encoder,
            settle_delay: Duration::from_millis(read_env_u64(
                "SETTLE_DELAY_MS",
                DEFAULT_SETTLE_DELAY_MS,
            )),
            freeze_threshold: Duration::from_secs(read_env_u64(
                "FREEZE_THRESHOLD_SECS",
                DEFAULT_FREEZE_THRESHOLD_SECS,
            )),
            ..EpisodeConfig::default()
        };

        Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            data_dir: read_env_path("DATA_DIR", DEFAULT_DATA_DIR),
            history_max_records: read_env_usize(
                "HISTORY_MAX_RECORDS",
                DEFAULT_HISTORY_MAX_RECORDS,
            ),
            region,
            session: SessionSettings {
                episode,
                total_steps,
                metrics_interval,
                stop_timeout: Duration::from_secs(read_env_u64(
                    "STOP_TIMEOUT_SECS",
                    DEFAULT_STOP_TIMEOUT_SECS,
                )),
                models_dir: Some(read_env_path("MODELS_DIR", DEFAULT_MODELS_DIR)),
            },
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) controller: SessionController,
    pub(crate) history: Arc<HistoryStore>,
    pub(crate) history_max_records: usize,
}

pub(crate) fn read_env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Offsets may legitimately be zero or negative on multi-monitor layouts.
pub(crate) fn read_env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<i32>().ok())
        .unwrap_or(default)
}

pub(crate) fn read_env_path(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
