use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::MonitorConfig;
use crate::error::ProctorError;

use super::{ActivityKind, Severity, ViolationLog};

/// Face bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub top_left: (f32, f32),
    pub bottom_right: (f32, f32),
}

impl FaceBox {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.top_left.0 + self.bottom_right.0) / 2.0,
            (self.top_left.1 + self.bottom_right.1) / 2.0,
        )
    }
}

/// One detection pass: every face found plus the frame dimensions the boxes
/// are expressed in.
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    pub faces: Vec<FaceBox>,
    pub width: f32,
    pub height: f32,
}

/// Video capture handle. Opening is where camera permission is resolved;
/// denial is terminal for the monitor and never retried automatically.
pub trait Camera: Send {
    fn open(&mut self) -> BoxFuture<'_, Result<(), ProctorError>>;
    fn close(&mut self);
    /// Whether frames are flowing yet. Re-checked every cycle so the loop
    /// can run while the stream warms up.
    fn is_ready(&self) -> bool;
}

/// Face-detection capability. `load` failures are terminal for this monitor
/// instance; `detect` failures are transient and only reach the debug log.
pub trait FaceDetector: Send {
    fn load(&mut self) -> BoxFuture<'_, Result<(), ProctorError>>;
    fn detect(&mut self) -> BoxFuture<'_, Result<DetectionFrame, String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    RequestingCapture,
    Running,
    /// Terminal. A stopped monitor is never restarted within a session.
    Stopped,
}

/// Outcome of classifying one detection frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ActivityKind,
    pub severity: Severity,
    pub details: String,
}

/// Pure frame classifier with the global alert cooldown.
///
/// At most one condition is reported per cooldown window, whatever its kind;
/// a sustained bad state collapses into one entry per window. Priority when
/// several conditions hold: no face, multiple faces, sideways, down.
pub struct BehaviorAnalyzer {
    sideways_threshold: f32,
    downward_threshold: f32,
    cooldown: Duration,
    last_alert: Option<Instant>,
}

impl BehaviorAnalyzer {
    pub fn new(cfg: &MonitorConfig) -> Self {
        Self {
            sideways_threshold: cfg.sideways_threshold,
            downward_threshold: cfg.downward_threshold,
            cooldown: cfg.alert_cooldown,
            last_alert: None,
        }
    }

    /// Classify a frame at `now`, applying the cooldown gate.
    pub fn observe(&mut self, frame: &DetectionFrame, now: Instant) -> Option<Classification> {
        let hit = self.classify(frame)?;
        if let Some(last) = self.last_alert {
            if now.duration_since(last) < self.cooldown {
                return None;
            }
        }
        self.last_alert = Some(now);
        Some(hit)
    }

    fn classify(&self, frame: &DetectionFrame) -> Option<Classification> {
        if frame.faces.is_empty() {
            return Some(Classification {
                kind: ActivityKind::FaceNotDetected,
                severity: Severity::High,
                details: "No face detected in frame".to_string(),
            });
        }

        if frame.faces.len() > 1 {
            return Some(Classification {
                kind: ActivityKind::MultipleFaces,
                severity: Severity::High,
                details: format!("{} faces detected", frame.faces.len()),
            });
        }

        let (face_x, face_y) = frame.faces[0].center();
        let center_x = frame.width / 2.0;
        let center_y = frame.height / 2.0;
        let offset_x = (face_x - center_x).abs();
        let offset_y = face_y - center_y;

        if offset_x > frame.width * self.sideways_threshold {
            let direction = if face_x < center_x { "left" } else { "right" };
            return Some(Classification {
                kind: ActivityKind::LookingSideways,
                severity: Severity::Medium,
                details: format!("Looking {}", direction),
            });
        }

        if offset_y > frame.height * self.downward_threshold {
            return Some(Classification {
                kind: ActivityKind::LookingDown,
                severity: Severity::Medium,
                details: "Looking downward".to_string(),
            });
        }

        None
    }
}

/// Releases the capture stream on every exit path of the detection task,
/// including abort.
struct CaptureGuard<C: Camera> {
    camera: C,
}

impl<C: Camera> Drop for CaptureGuard<C> {
    fn drop(&mut self) {
        self.camera.close();
        debug!("Capture stream released");
    }
}

/// Owns the detection cadence: once started it runs a cycle per frame
/// interval until stopped, re-checking camera readiness each cycle and
/// feeding classified conditions into the shared [`ViolationLog`].
pub struct FaceMonitor {
    log: Arc<ViolationLog>,
    cfg: MonitorConfig,
    state: Mutex<MonitorState>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    status: Mutex<String>,
}

impl FaceMonitor {
    pub fn new(log: Arc<ViolationLog>, cfg: MonitorConfig) -> Self {
        Self {
            log,
            cfg,
            state: Mutex::new(MonitorState::Idle),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            status: Mutex::new("Initializing...".to_string()),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock()
    }

    pub fn status(&self) -> String {
        self.status.lock().clone()
    }

    /// The activity sequence this monitor has fed so far. The controller
    /// reads it through this accessor rather than any shared global.
    pub fn activities(&self) -> Vec<super::SuspiciousActivity> {
        self.log.snapshot()
    }

    fn set_status(&self, status: &str) {
        *self.status.lock() = status.to_string();
    }

    /// Acquire the capture stream, load the detector and launch the
    /// detection loop. Permission denial and model-load failure are both
    /// terminal for this monitor instance.
    pub async fn start<C, D>(&self, mut camera: C, mut detector: D) -> Result<(), ProctorError>
    where
        C: Camera + 'static,
        D: FaceDetector + 'static,
    {
        {
            let mut state = self.state.lock();
            if *state != MonitorState::Idle {
                return Err(ProctorError::Session(format!(
                    "face monitor cannot start from {:?}",
                    *state
                )));
            }
            *state = MonitorState::RequestingCapture;
        }

        self.set_status("Requesting camera access...");
        if let Err(e) = camera.open().await {
            *self.state.lock() = MonitorState::Stopped;
            self.set_status("Camera access denied ✗");
            error!("Error accessing camera: {}", e);
            return Err(e);
        }

        if let Err(e) = detector.load().await {
            camera.close();
            *self.state.lock() = MonitorState::Stopped;
            self.set_status("Error loading model");
            error!("Error loading face detection model: {}", e);
            return Err(e);
        }
        info!("✅ Face detection model loaded successfully");

        *self.state.lock() = MonitorState::Running;
        self.running.store(true, Ordering::SeqCst);
        self.set_status("Active - Monitoring ✓");
        info!("✅ Starting face detection loop");

        let running = self.running.clone();
        let log = self.log.clone();
        let mut analyzer = BehaviorAnalyzer::new(&self.cfg);
        let frame_interval = self.cfg.frame_interval;

        let handle = tokio::spawn(async move {
            let guard = CaptureGuard { camera };
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut scans: u64 = 0;

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if !guard.camera.is_ready() {
                    debug!("Waiting for video stream...");
                    continue;
                }

                match detector.detect().await {
                    Ok(frame) => {
                        // stop() may have landed while detection was in
                        // flight; nothing is recorded past that point.
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        scans += 1;
                        debug!("✓ Detecting - Faces: {} | Scans: {}", frame.faces.len(), scans);
                        if let Some(hit) = analyzer.observe(&frame, Instant::now()) {
                            log.record(hit.kind, hit.severity, hit.details);
                        }
                    }
                    Err(e) => {
                        // Transient inference failure: next cycle retries.
                        debug!("Detection error: {}", e);
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);

        Ok(())
    }

    /// Halt the detection schedule. Terminal: the running flag is cleared
    /// before this returns, so an in-flight detection pass cannot append to
    /// the log afterwards.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.state.lock() = MonitorState::Stopped;
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        self.set_status("Stopped");
        info!("Face detection stopped");
    }
}
