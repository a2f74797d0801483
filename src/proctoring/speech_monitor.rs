use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::error::ProctorError;

/// Incremental output of a speech-recognition capability.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    Result { text: String, is_final: bool },
    /// The engine stopped on its own. Speech engines are not guaranteed to
    /// run continuously; a monitor that is still listening restarts them.
    Ended,
    Error(String),
}

/// Speech-to-text capability. Events are delivered on the channel handed to
/// the monitor at activation; `start` may be called again after an `Ended`.
pub trait SpeechRecognizer: Send {
    fn start(&mut self) -> Result<(), ProctorError>;
    fn stop(&mut self);
}

/// Updates emitted to the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Interim text for live display only; never persisted.
    Preview(String),
    /// New transcript content past what was previously emitted.
    Partial { delta: String, total_len: usize },
    /// The full trimmed transcript, emitted exactly once while draining.
    Final(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    Inactive,
    Listening,
    Draining,
}

/// Accumulated transcript plus the high-water mark of what has been emitted.
///
/// Final segments are trimmed and space-joined in arrival order. Interim
/// segments never touch this state.
#[derive(Debug, Default)]
pub struct TranscriptState {
    accumulated: String,
    last_emitted_len: usize,
}

impl TranscriptState {
    /// Append a finalized segment. Returns false for whitespace-only input.
    pub fn push_final(&mut self, segment: &str) -> bool {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            return false;
        }
        if !self.accumulated.is_empty() {
            self.accumulated.push(' ');
        }
        self.accumulated.push_str(trimmed);
        debug!("📋 Full transcript so far: {}", self.accumulated);
        true
    }

    /// Content beyond the last emission, advancing the high-water mark.
    /// Returns None when nothing new has accumulated, which makes repeated
    /// quiet-period expiries idempotent.
    pub fn take_delta(&mut self) -> Option<(String, usize)> {
        let total = self.accumulated.len();
        if total == 0 || total <= self.last_emitted_len {
            return None;
        }
        let delta = self.accumulated[self.last_emitted_len..]
            .trim_start()
            .to_string();
        self.last_emitted_len = total;
        Some((delta, total))
    }

    pub fn full(&self) -> String {
        self.accumulated.trim().to_string()
    }

    pub fn len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.is_empty()
    }
}

/// Owns a speech-recognition capability for the lifetime of a test session:
/// accumulates finalized segments, emits debounced incremental updates and
/// flushes the full transcript once when told the session ended.
pub struct SpeechMonitor {
    cfg: MonitorConfig,
    state: Arc<Mutex<SpeechState>>,
    status: Arc<Mutex<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
    drain: Mutex<Option<oneshot::Sender<oneshot::Sender<String>>>>,
}

impl SpeechMonitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        Self {
            cfg,
            state: Arc::new(Mutex::new(SpeechState::Inactive)),
            status: Arc::new(Mutex::new("Initializing microphone...".to_string())),
            task: Mutex::new(None),
            drain: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SpeechState {
        *self.state.lock()
    }

    pub fn status(&self) -> String {
        self.status.lock().clone()
    }

    /// Begin listening. `events` is the capability's delivery channel and
    /// `updates` receives preview/partial/final transcript events. A start
    /// failure leaves the monitor inactive and is non-fatal for the session.
    pub fn activate<R>(
        &self,
        mut recognizer: R,
        mut events: mpsc::UnboundedReceiver<RecognitionEvent>,
        updates: mpsc::UnboundedSender<TranscriptEvent>,
    ) -> Result<(), ProctorError>
    where
        R: SpeechRecognizer + 'static,
    {
        {
            let mut state = self.state.lock();
            if *state != SpeechState::Inactive {
                return Err(ProctorError::Session(format!(
                    "speech monitor cannot activate from {:?}",
                    *state
                )));
            }
            *state = SpeechState::Listening;
        }

        if let Err(e) = recognizer.start() {
            *self.state.lock() = SpeechState::Inactive;
            *self.status.lock() = "⚠️ Failed to start microphone".to_string();
            warn!("Failed to start recognition: {}", e);
            return Err(e);
        }
        *self.status.lock() = "🎙️ Listening...".to_string();
        info!("🎤 Voice capture started");

        let (drain_tx, mut drain_rx) = oneshot::channel::<oneshot::Sender<String>>();
        *self.drain.lock() = Some(drain_tx);

        let state = self.state.clone();
        let status = self.status.clone();
        let quiet_period = self.cfg.quiet_period;
        let restart_delay = self.cfg.restart_delay;

        let handle = tokio::spawn(async move {
            let mut transcript = TranscriptState::default();
            let mut deadline: Option<tokio::time::Instant> = None;

            let reply = loop {
                tokio::select! {
                    reply = &mut drain_rx => break reply.ok(),

                    event = events.recv() => match event {
                        Some(RecognitionEvent::Result { text, is_final }) => {
                            if is_final {
                                if transcript.push_final(&text) {
                                    debug!("📝 Final segment: {}", text.trim());
                                    deadline = Some(tokio::time::Instant::now() + quiet_period);
                                }
                            } else {
                                let _ = updates.send(TranscriptEvent::Preview(text));
                            }
                        }
                        Some(RecognitionEvent::Ended) => {
                            if *state.lock() == SpeechState::Listening {
                                debug!("🛑 Recognition ended, restarting in {:?}", restart_delay);
                                tokio::time::sleep(restart_delay).await;
                                if *state.lock() == SpeechState::Listening {
                                    if let Err(e) = recognizer.start() {
                                        warn!("Could not restart recognition: {}", e);
                                    }
                                }
                            }
                        }
                        Some(RecognitionEvent::Error(e)) => {
                            // "no-speech" is expected during silence and
                            // "aborted" accompanies our own restarts.
                            if e == "no-speech" || e == "aborted" {
                                debug!("Recognition notice: {}", e);
                            } else {
                                warn!("❌ Speech recognition error: {}", e);
                                *status.lock() = format!("⚠️ Error: {}", e);
                            }
                        }
                        None => break None,
                    },

                    _ = async { tokio::time::sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                        deadline = None;
                        if let Some((delta, total_len)) = transcript.take_delta() {
                            debug!("📤 Sending transcript update ({} chars total)", total_len);
                            let _ = updates.send(TranscriptEvent::Partial { delta, total_len });
                        }
                    }
                }
            };

            // Draining: drop any pending quiet-period timer, stop the
            // capability and flush the full transcript exactly once.
            *state.lock() = SpeechState::Draining;
            recognizer.stop();
            let full = transcript.full();
            info!("✅ Final transcript generated ({} chars)", full.len());
            let _ = updates.send(TranscriptEvent::Final(full.clone()));
            if let Some(tx) = reply {
                let _ = tx.send(full);
            }
            *state.lock() = SpeechState::Inactive;
            *status.lock() = "✅ Transcript completed".to_string();
        });
        *self.task.lock() = Some(handle);

        Ok(())
    }

    /// Signal the end of the test and wait for the drain to finish.
    /// Returns the full trimmed transcript; empty when the monitor was
    /// never activated.
    pub async fn deactivate(&self) -> String {
        let Some(drain) = self.drain.lock().take() else {
            return String::new();
        };
        let (tx, rx) = oneshot::channel();
        if drain.send(tx).is_err() {
            return String::new();
        }
        rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_segments_are_space_joined_and_trimmed() {
        let mut state = TranscriptState::default();
        assert!(state.push_final("  hello "));
        assert!(state.push_final("world"));
        assert!(!state.push_final("   "));
        assert_eq!(state.full(), "hello world");
    }

    #[test]
    fn take_delta_returns_only_new_content() {
        let mut state = TranscriptState::default();
        state.push_final("hello");
        let (delta, total) = state.take_delta().unwrap();
        assert_eq!(delta, "hello");
        assert_eq!(total, 5);

        state.push_final("world");
        let (delta, total) = state.take_delta().unwrap();
        assert_eq!(delta, "world");
        assert_eq!(total, 11);
    }

    #[test]
    fn take_delta_is_idempotent_on_unchanged_content() {
        let mut state = TranscriptState::default();
        state.push_final("hello");
        assert!(state.take_delta().is_some());
        assert!(state.take_delta().is_none());
        assert!(state.take_delta().is_none());
    }

    #[test]
    fn empty_state_emits_nothing() {
        let mut state = TranscriptState::default();
        assert!(state.take_delta().is_none());
        assert_eq!(state.full(), "");
    }
}
