use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};

/// Snapshot of the session clock, shaped for display.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TimerState {
    pub elapsed_seconds: u64,
    pub elapsed_minutes: u64,
    pub is_running: bool,
}

/// Tracks how long the test has been active.
///
/// Observational only: tests carry a stored duration server-side, but this
/// client does not auto-submit when it elapses.
pub struct ExamTimer {
    started: Option<Instant>,
    stopped_after: Option<Duration>,
}

impl ExamTimer {
    pub fn new() -> Self {
        Self {
            started: None,
            stopped_after: None,
        }
    }

    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
            info!("⏱️ Exam timer started");
        }
    }

    pub fn stop(&mut self) -> TimerState {
        if let Some(started) = self.started.take() {
            self.stopped_after = Some(started.elapsed());
        }
        let state = self.state();
        info!("⏹️ Exam timer stopped at {}s", state.elapsed_seconds);
        state
    }

    pub fn elapsed(&self) -> Duration {
        match (self.started, self.stopped_after) {
            (Some(started), _) => started.elapsed(),
            (None, Some(total)) => total,
            (None, None) => Duration::ZERO,
        }
    }

    pub fn state(&self) -> TimerState {
        let elapsed_seconds = self.elapsed().as_secs();
        TimerState {
            elapsed_seconds,
            elapsed_minutes: elapsed_seconds / 60,
            is_running: self.started.is_some(),
        }
    }
}

impl Default for ExamTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_reports_zero() {
        let timer = ExamTimer::new();
        let state = timer.state();
        assert_eq!(state.elapsed_seconds, 0);
        assert!(!state.is_running);
    }

    #[test]
    fn stop_freezes_the_elapsed_time() {
        let mut timer = ExamTimer::new();
        timer.start();
        assert!(timer.state().is_running);
        let stopped = timer.stop();
        assert!(!stopped.is_running);
        let frozen = timer.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.elapsed(), frozen);
    }
}
