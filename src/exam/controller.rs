use std::sync::Arc;

use futures::future::BoxFuture;
use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ProctorError;
use crate::proctoring::{
    Camera, FaceDetector, FaceMonitor, MonitorState, RecognitionEvent, SpeechMonitor,
    SpeechRecognizer, TranscriptEvent, ViolationLog,
};

use super::mic_check::{self, MicCheckResult, CHECK_SENTENCES};
use super::submission::{AnswerMap, SubmissionPayload};
use super::timer::{ExamTimer, TimerState};
use super::Question;

/// Camera + microphone permission gate. Denial blocks the session; retry is
/// manual (call again), never automatic.
pub trait MediaPermissions: Send {
    fn request_camera_and_mic(&mut self) -> BoxFuture<'_, Result<(), ProctorError>>;
}

/// Fullscreen control. Both directions are best-effort for the session.
pub trait ScreenControl: Send {
    fn enter_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>>;
    fn exit_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>>;
    fn is_fullscreen(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    AwaitingPermissions,
    MicCheck,
    Ready,
    Active,
    Submitting,
    Completed,
}

/// Signals from the environment that the student left the test surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    TabSwitch,
    EscapePressed,
    FullscreenExit,
}

impl Interruption {
    fn report_message(&self) -> &'static str {
        match self {
            Interruption::TabSwitch => "Tab switch detected",
            Interruption::EscapePressed => "Escape key pressed",
            Interruption::FullscreenExit => "Fullscreen exited",
        }
    }

    fn alert(&self) -> &'static str {
        match self {
            Interruption::TabSwitch => "⚠️ You switched tabs! This will be flagged.",
            Interruption::EscapePressed => {
                "⚠️ Escape key detected! Leaving fullscreen is not allowed."
            }
            Interruption::FullscreenExit => "⚠️ Fullscreen exited! Please return to fullscreen.",
        }
    }
}

/// Drives the student-facing test flow end to end: permission gate, mic
/// self-test, monitored answering, and final submission assembly.
pub struct ExamController<P: MediaPermissions, S: ScreenControl> {
    test_id: String,
    user_id: String,
    questions: Vec<Question>,
    answers: AnswerMap,
    current_index: usize,
    phase: ExamPhase,
    permissions: P,
    screen: S,
    api: ApiClient,
    cfg: ClientConfig,
    violations: Arc<ViolationLog>,
    face_monitor: Arc<FaceMonitor>,
    speech_monitor: Arc<SpeechMonitor>,
    updates_rx: Option<mpsc::UnboundedReceiver<TranscriptEvent>>,
    transcript: String,
    live_speech: String,
    speech_active: bool,
    timer: ExamTimer,
}

impl<P: MediaPermissions, S: ScreenControl> ExamController<P, S> {
    pub fn new(
        test_id: String,
        user_id: String,
        questions: Vec<Question>,
        permissions: P,
        screen: S,
        cfg: ClientConfig,
    ) -> Self {
        let violations = Arc::new(ViolationLog::new());
        let face_monitor = Arc::new(FaceMonitor::new(violations.clone(), cfg.monitor.clone()));
        let speech_monitor = Arc::new(SpeechMonitor::new(cfg.monitor.clone()));
        let api = ApiClient::new(cfg.api_base.clone());

        Self {
            test_id,
            user_id,
            questions,
            answers: AnswerMap::new(),
            current_index: 0,
            phase: ExamPhase::AwaitingPermissions,
            permissions,
            screen,
            api,
            cfg,
            violations,
            face_monitor,
            speech_monitor,
            updates_rx: None,
            transcript: String::new(),
            live_speech: String::new(),
            speech_active: false,
            timer: ExamTimer::new(),
        }
    }

    pub fn phase(&self) -> ExamPhase {
        self.phase
    }

    pub fn violation_log(&self) -> &Arc<ViolationLog> {
        &self.violations
    }

    pub fn face_monitor(&self) -> &Arc<FaceMonitor> {
        &self.face_monitor
    }

    pub fn speech_monitor(&self) -> &Arc<SpeechMonitor> {
        &self.speech_monitor
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn live_speech(&self) -> &str {
        &self.live_speech
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    /// Ask for camera + microphone access. Must succeed before any test
    /// content is shown; on denial the caller presents a retry affordance
    /// and calls this again.
    pub async fn request_permissions(&mut self) -> Result<(), ProctorError> {
        if self.phase != ExamPhase::AwaitingPermissions {
            return Err(ProctorError::Session(format!(
                "permissions already granted (phase: {:?})",
                self.phase
            )));
        }

        match self.permissions.request_camera_and_mic().await {
            Ok(()) => {
                info!("✅ Camera and microphone permissions granted");
                self.phase = ExamPhase::MicCheck;
                Ok(())
            }
            Err(e) => {
                warn!("Permission error: {}", e);
                Err(e)
            }
        }
    }

    pub fn mic_check_prompt(&self) -> &'static str {
        CHECK_SENTENCES[0]
    }

    /// Score the student's reading of the prompt sentence. Passing moves
    /// the session to Ready; a failed attempt stays in MicCheck for retry.
    pub fn submit_mic_check(&mut self, spoken: &str) -> Result<MicCheckResult, ProctorError> {
        if self.phase != ExamPhase::MicCheck {
            return Err(ProctorError::Session(format!(
                "mic check not available (phase: {:?})",
                self.phase
            )));
        }

        let accuracy = mic_check::score(self.mic_check_prompt(), spoken);
        let passed = accuracy >= self.cfg.mic_pass_score;
        if passed {
            info!("✅ Microphone test passed ({}%)", accuracy);
            self.phase = ExamPhase::Ready;
        } else {
            warn!("Microphone test failed ({}%), retry required", accuracy);
        }

        Ok(MicCheckResult {
            accuracy,
            passed,
            transcript: spoken.trim().to_string(),
        })
    }

    /// Skip the optional self-test.
    pub fn skip_mic_check(&mut self) -> Result<(), ProctorError> {
        if self.phase != ExamPhase::MicCheck {
            return Err(ProctorError::Session(format!(
                "mic check not available (phase: {:?})",
                self.phase
            )));
        }
        self.phase = ExamPhase::Ready;
        Ok(())
    }

    /// Enter fullscreen (best-effort), mark the session active and start
    /// both monitors. Pass `None` for speech when the environment has no
    /// recognition engine; the test proceeds without that channel.
    pub async fn start<C, D, R>(
        &mut self,
        camera: C,
        detector: D,
        speech: Option<(R, mpsc::UnboundedReceiver<RecognitionEvent>)>,
    ) -> Result<(), ProctorError>
    where
        C: Camera + 'static,
        D: FaceDetector + 'static,
        R: SpeechRecognizer + 'static,
    {
        if self.phase != ExamPhase::Ready {
            return Err(ProctorError::Session(format!(
                "cannot start test (phase: {:?})",
                self.phase
            )));
        }

        if let Err(e) = self.screen.enter_fullscreen().await {
            warn!("Fullscreen unavailable, continuing without it: {}", e);
        }

        match self.face_monitor.start(camera, detector).await {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                // Permission was revoked between the gate and the start.
                if self.screen.is_fullscreen() {
                    let _ = self.screen.exit_fullscreen().await;
                }
                return Err(e);
            }
            Err(e) => {
                error!("Face proctoring unavailable for this session: {}", e);
            }
        }

        match speech {
            Some((recognizer, events)) => {
                let (updates_tx, updates_rx) = mpsc::unbounded_channel();
                match self.speech_monitor.activate(recognizer, events, updates_tx) {
                    Ok(()) => {
                        self.updates_rx = Some(updates_rx);
                        self.speech_active = true;
                    }
                    Err(e) => {
                        warn!("Voice proctoring unavailable for this session: {}", e);
                    }
                }
            }
            None => {
                warn!("⚠️ Speech recognition not supported in this environment");
            }
        }

        self.transcript.clear();
        self.live_speech.clear();
        self.timer.start();
        self.phase = ExamPhase::Active;
        info!("▶️ Test started - proctoring active");
        Ok(())
    }

    /// Surface an environment signal to the student and report it to the
    /// violation endpoint immediately, fire-and-forget. Returns the alert
    /// text to present. Only an active session is monitored; signals
    /// arriving in any other phase are ignored and yield `None`.
    pub fn report_interruption(&self, interruption: Interruption) -> Option<&'static str> {
        if self.phase != ExamPhase::Active {
            return None;
        }
        self.api.record_violation(interruption.report_message());
        Some(interruption.alert())
    }

    /// Apply any pending transcript events from the speech monitor.
    pub fn drain_transcript_events(&mut self) {
        let Some(rx) = self.updates_rx.as_mut() else {
            return;
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                TranscriptEvent::Preview(text) => {
                    self.live_speech = text;
                }
                TranscriptEvent::Partial { delta, total_len } => {
                    if !self.transcript.is_empty() {
                        self.transcript.push(' ');
                    }
                    self.transcript.push_str(&delta);
                    self.live_speech.clear();
                    info!("Transcript updated ({} chars)", total_len);
                }
                TranscriptEvent::Final(full) => {
                    self.transcript = full;
                    self.live_speech.clear();
                }
            }
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Record the student's single choice for a question. The question id
    /// must belong to the loaded set; unanswered questions are allowed.
    pub fn select_answer(
        &mut self,
        question_id: &str,
        option: &str,
    ) -> Result<(), ProctorError> {
        if self.phase != ExamPhase::Active {
            return Err(ProctorError::Session(format!(
                "cannot answer (phase: {:?})",
                self.phase
            )));
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(ProctorError::Session(format!(
                "unknown question id: {}",
                question_id
            )));
        }
        self.answers
            .insert(question_id.to_string(), option.to_string());
        Ok(())
    }

    /// Advance to the next question. Returns false when already on the
    /// last question, signalling that finishing is the next action.
    pub fn next(&mut self) -> bool {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.current_index > 0 {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn jump_to(&mut self, index: usize) -> Result<(), ProctorError> {
        if index >= self.questions.len() {
            return Err(ProctorError::Session(format!(
                "question index {} out of range",
                index
            )));
        }
        self.current_index = index;
        Ok(())
    }

    /// Snapshot of the payload that would be submitted right now. Monitors
    /// should be quiescent (stopped/drained) before this is meaningful.
    pub fn assemble_payload(&self) -> SubmissionPayload {
        SubmissionPayload::assemble(
            self.test_id.clone(),
            self.user_id.clone(),
            self.answers.clone(),
            self.violations.snapshot(),
            self.transcript.clone(),
        )
    }

    /// Finish the test: drain the speech monitor, stop the face monitor,
    /// assemble the payload and submit it. On success returns the
    /// dashboard path to navigate to; on failure the answer state is kept
    /// and the session returns to Active so the student can retry.
    pub async fn finish(&mut self, confirmed: bool) -> Result<String, ProctorError> {
        if !confirmed {
            return Err(ProctorError::Session(
                "finish requires confirmation".to_string(),
            ));
        }
        if self.phase != ExamPhase::Active {
            return Err(ProctorError::Session(format!(
                "cannot finish (phase: {:?})",
                self.phase
            )));
        }

        self.phase = ExamPhase::Submitting;
        self.timer.stop();

        // Quiesce both monitors before reading their state. Stopping is
        // terminal; a failed submission retries with the captured data.
        if self.speech_active {
            self.transcript = self.speech_monitor.deactivate().await;
            self.speech_active = false;
            self.live_speech.clear();
        }
        if self.face_monitor.state() == MonitorState::Running {
            self.face_monitor.stop();
        }

        let payload = self.assemble_payload();
        match self.api.submit_test(&payload).await {
            Ok(_) => {
                if self.screen.is_fullscreen() {
                    if let Err(e) = self.screen.exit_fullscreen().await {
                        warn!("Could not exit fullscreen: {}", e);
                    }
                }
                self.phase = ExamPhase::Completed;
                info!("✅ Test submitted successfully!");
                Ok(format!("/student-dash/{}", self.user_id))
            }
            Err(e) => {
                error!("❌ Failed to submit test: {}", e);
                self.phase = ExamPhase::Active;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    struct GrantAll;
    impl MediaPermissions for GrantAll {
        fn request_camera_and_mic(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async { Ok(()) }.boxed()
        }
    }

    struct DenyAll;
    impl MediaPermissions for DenyAll {
        fn request_camera_and_mic(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async {
                Err(ProctorError::PermissionDenied {
                    device: "camera",
                    reason: "denied by user".to_string(),
                })
            }
            .boxed()
        }
    }

    struct NoScreen;
    impl ScreenControl for NoScreen {
        fn enter_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async { Ok(()) }.boxed()
        }
        fn exit_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async { Ok(()) }.boxed()
        }
        fn is_fullscreen(&self) -> bool {
            false
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: "q1".into(),
                question_text: "First?".into(),
                options: vec!["a".into(), "b".into()],
                image_urls: None,
            },
            Question {
                id: "q2".into(),
                question_text: "Second?".into(),
                options: vec!["c".into(), "d".into()],
                image_urls: None,
            },
        ]
    }

    fn controller<P: MediaPermissions>(permissions: P) -> ExamController<P, NoScreen> {
        ExamController::new(
            "test-1".into(),
            "user-1".into(),
            questions(),
            permissions,
            NoScreen,
            ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn permission_denial_blocks_and_allows_retry() {
        let mut controller = controller(DenyAll);
        assert!(controller.request_permissions().await.is_err());
        assert_eq!(controller.phase(), ExamPhase::AwaitingPermissions);
        // Manual retry keeps hitting the gate; nothing auto-retries.
        assert!(controller.request_permissions().await.is_err());
    }

    #[tokio::test]
    async fn mic_check_gates_the_ready_phase() {
        let mut controller = controller(GrantAll);
        controller.request_permissions().await.unwrap();
        assert_eq!(controller.phase(), ExamPhase::MicCheck);

        // 1/4 words match, well under the 60% pass bar.
        let result = controller.submit_mic_check("check").unwrap();
        assert_eq!(result.accuracy, 25);
        assert!(!result.passed);
        assert_eq!(controller.phase(), ExamPhase::MicCheck);

        let result = controller.submit_mic_check("this is to check").unwrap();
        assert_eq!(result.accuracy, 100);
        assert!(result.passed);
        assert_eq!(controller.phase(), ExamPhase::Ready);
    }

    #[tokio::test]
    async fn answers_are_rejected_outside_the_loaded_question_set() {
        let mut controller = controller(GrantAll);
        controller.request_permissions().await.unwrap();
        controller.skip_mic_check().unwrap();
        // Force Active without capabilities: answering requires it.
        assert!(controller.select_answer("q1", "a").is_err());
        controller.phase = ExamPhase::Active;

        controller.select_answer("q1", "a").unwrap();
        controller.select_answer("q1", "b").unwrap();
        assert_eq!(controller.answers().get("q1").unwrap(), "b");

        let err = controller.select_answer("ghost", "a").unwrap_err();
        assert!(err.to_string().contains("unknown question id"));
        assert_eq!(controller.answers().len(), 1);
    }

    #[tokio::test]
    async fn navigation_is_index_based_without_skip_validation() {
        let mut controller = controller(GrantAll);
        assert_eq!(controller.current_index(), 0);
        assert!(!controller.prev());
        assert!(controller.next());
        assert_eq!(controller.current_question().unwrap().id, "q2");
        // Last question: next() signals the finish action instead.
        assert!(!controller.next());
        controller.jump_to(0).unwrap();
        assert!(controller.jump_to(5).is_err());
    }
}
