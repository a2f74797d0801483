use std::time::Duration;

use log::{info, warn};
use url::Url;

use crate::error::ProctorError;

/// Load an environment variable, pulling in a `.env` file first when one is
/// present for development setups.
fn env_var(key: &str) -> Option<String> {
    let _ = dotenvy::dotenv();

    match std::env::var(key) {
        Ok(value) if !value.is_empty() => {
            info!("✅ [ENV] Loaded {} from environment", key);
            Some(value)
        }
        _ => None,
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, ProctorError> {
    match env_var(key) {
        Some(raw) => {
            let ms: u64 = raw
                .parse()
                .map_err(|e| ProctorError::Config(format!("{}: {}", key, e)))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        None => Ok(None),
    }
}

/// Tunables for the face and speech monitors.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum spacing between logged suspicious activities of any kind.
    pub alert_cooldown: Duration,
    /// Horizontal face-center offset beyond this fraction of the frame width
    /// counts as looking sideways.
    pub sideways_threshold: f32,
    /// Vertical face-center offset beyond this fraction of the frame height
    /// counts as looking down.
    pub downward_threshold: f32,
    /// Cadence of the detection loop. Stands in for the display refresh that
    /// drives the loop in a browser.
    pub frame_interval: Duration,
    /// Silence after the last final speech segment before an incremental
    /// transcript update is emitted.
    pub quiet_period: Duration,
    /// Delay before restarting a recognition engine that ended on its own.
    pub restart_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alert_cooldown: Duration::from_millis(3000),
            sideways_threshold: 0.25,
            downward_threshold: 0.15,
            frame_interval: Duration::from_millis(33),
            quiet_period: Duration::from_millis(1500),
            restart_delay: Duration::from_millis(300),
        }
    }
}

/// Client-wide configuration, built from defaults with environment overrides.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the exam server hosting `/api/submit-test` and
    /// `/api/record-violations`.
    pub api_base: Url,
    /// Minimum microphone self-test accuracy to let the student continue.
    pub mic_pass_score: u32,
    pub monitor: MonitorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse("http://localhost:3000").expect("static url"),
            mic_pass_score: 60,
            monitor: MonitorConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ProctorError> {
        let mut cfg = Self::default();

        match env_var("EXAMSENTRY_API_URL") {
            Some(raw) => {
                cfg.api_base = Url::parse(&raw)
                    .map_err(|e| ProctorError::Config(format!("EXAMSENTRY_API_URL: {}", e)))?;
            }
            None => {
                warn!(
                    "❌ [ENV] EXAMSENTRY_API_URL not set, using default {}",
                    cfg.api_base
                );
            }
        }

        if let Some(raw) = env_var("EXAMSENTRY_MIC_PASS_SCORE") {
            cfg.mic_pass_score = raw
                .parse()
                .map_err(|e| ProctorError::Config(format!("EXAMSENTRY_MIC_PASS_SCORE: {}", e)))?;
        }

        if let Some(d) = env_millis("EXAMSENTRY_ALERT_COOLDOWN_MS")? {
            cfg.monitor.alert_cooldown = d;
        }
        if let Some(d) = env_millis("EXAMSENTRY_QUIET_PERIOD_MS")? {
            cfg.monitor.quiet_period = d;
        }
        if let Some(d) = env_millis("EXAMSENTRY_RESTART_DELAY_MS")? {
            cfg.monitor.restart_delay = d;
        }
        if let Some(d) = env_millis("EXAMSENTRY_FRAME_INTERVAL_MS")? {
            cfg.monitor.frame_interval = d;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.monitor.alert_cooldown, Duration::from_millis(3000));
        assert_eq!(cfg.monitor.quiet_period, Duration::from_millis(1500));
        assert_eq!(cfg.monitor.restart_delay, Duration::from_millis(300));
        assert_eq!(cfg.mic_pass_score, 60);
        assert!((cfg.monitor.sideways_threshold - 0.25).abs() < f32::EPSILON);
        assert!((cfg.monitor.downward_threshold - 0.15).abs() < f32::EPSILON);
    }
}
