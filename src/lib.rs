use log::{info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod exam;
pub mod proctoring;

pub use error::ProctorError;

/// Log which configuration variables are present. Called once at startup by
/// the binaries so misconfiguration is visible early.
pub fn log_environment_status() {
    let _ = dotenvy::dotenv();

    let keys = [
        "EXAMSENTRY_API_URL",
        "EXAMSENTRY_MIC_PASS_SCORE",
        "EXAMSENTRY_ALERT_COOLDOWN_MS",
        "EXAMSENTRY_QUIET_PERIOD_MS",
        "EXAMSENTRY_RESTART_DELAY_MS",
        "EXAMSENTRY_FRAME_INTERVAL_MS",
    ];

    for key in keys {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => info!("{}: set ({} chars)", key, value.len()),
            _ => warn!("{}: not set, using default", key),
        }
    }
}
