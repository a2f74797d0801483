use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::info;
use tokio::sync::mpsc;

use examsentry::config::ClientConfig;
use examsentry::exam::{ExamController, MediaPermissions, Question, ScreenControl};
use examsentry::proctoring::{
    Camera, DetectionFrame, FaceBox, FaceDetector, RecognitionEvent, SpeechRecognizer,
};
use examsentry::ProctorError;

/// Scripted capability providers so the full pipeline runs without any
/// camera, model or speech engine attached.
mod sim {
    use super::*;

    pub struct GrantingPermissions;

    impl MediaPermissions for GrantingPermissions {
        fn request_camera_and_mic(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async { Ok(()) }.boxed()
        }
    }

    pub struct SimScreen {
        fullscreen: bool,
    }

    impl SimScreen {
        pub fn new() -> Self {
            Self { fullscreen: false }
        }
    }

    impl ScreenControl for SimScreen {
        fn enter_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            self.fullscreen = true;
            async { Ok(()) }.boxed()
        }
        fn exit_fullscreen(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            self.fullscreen = false;
            async { Ok(()) }.boxed()
        }
        fn is_fullscreen(&self) -> bool {
            self.fullscreen
        }
    }

    pub struct SimCamera {
        ready: bool,
    }

    impl SimCamera {
        pub fn new() -> Self {
            Self { ready: false }
        }
    }

    impl Camera for SimCamera {
        fn open(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.ready = true;
                Ok(())
            }
            .boxed()
        }
        fn close(&mut self) {
            self.ready = false;
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    /// Mostly a centered face; occasionally wanders, vanishes or gains
    /// company, so a short run produces a few flags.
    pub struct SimDetector;

    impl FaceDetector for SimDetector {
        fn load(&mut self) -> BoxFuture<'_, Result<(), ProctorError>> {
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(())
            }
            .boxed()
        }

        fn detect(&mut self) -> BoxFuture<'_, Result<DetectionFrame, String>> {
            async {
                let face = |x: f32, y: f32| FaceBox {
                    top_left: (x - 60.0, y - 60.0),
                    bottom_right: (x + 60.0, y + 60.0),
                };
                let roll = rand::random::<f32>();
                let faces = if roll < 0.02 {
                    vec![]
                } else if roll < 0.04 {
                    vec![face(200.0, 240.0), face(460.0, 240.0)]
                } else if roll < 0.08 {
                    vec![face(80.0, 240.0)]
                } else {
                    vec![face(320.0, 240.0)]
                };
                Ok(DetectionFrame {
                    faces,
                    width: 640.0,
                    height: 480.0,
                })
            }
            .boxed()
        }
    }

    /// Replays a canned utterance as interim + final segments, then lets
    /// the engine "end" on its own to exercise the silent restart.
    pub struct SimRecognizer {
        events: mpsc::UnboundedSender<RecognitionEvent>,
        starts: u32,
    }

    impl SimRecognizer {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { events: tx, starts: 0 }, rx)
        }
    }

    impl SpeechRecognizer for SimRecognizer {
        fn start(&mut self) -> Result<(), ProctorError> {
            self.starts += 1;
            let tx = self.events.clone();
            let first_run = self.starts == 1;
            tokio::spawn(async move {
                if first_run {
                    let segments = [
                        ("um let me", false),
                        ("um let me think", true),
                        ("about this one", true),
                    ];
                    for (text, is_final) in segments {
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        let _ = tx.send(RecognitionEvent::Result {
                            text: text.to_string(),
                            is_final,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let _ = tx.send(RecognitionEvent::Ended);
                }
            });
            Ok(())
        }

        fn stop(&mut self) {}
    }
}

fn sample_questions() -> Vec<Question> {
    vec![
        Question {
            id: "q1".to_string(),
            question_text: "Which layer of the OSI model does TCP belong to?".to_string(),
            options: vec![
                "Transport".to_string(),
                "Network".to_string(),
                "Session".to_string(),
            ],
            image_urls: None,
        },
        Question {
            id: "q2".to_string(),
            question_text: "What does ACID stand for?".to_string(),
            options: vec![
                "Atomicity, Consistency, Isolation, Durability".to_string(),
                "Access, Control, Integrity, Data".to_string(),
            ],
            image_urls: None,
        },
    ]
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    println!("\n=== ExamSentry Proctored Session Demo ===");
    examsentry::log_environment_status();

    let cfg = match ClientConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!("Submitting against {}", cfg.api_base);

    let test_id = format!("demo-{}", uuid::Uuid::new_v4());
    let mut controller = ExamController::new(
        test_id,
        "demo-student".to_string(),
        sample_questions(),
        sim::GrantingPermissions,
        sim::SimScreen::new(),
        cfg,
    );

    if let Err(e) = controller.request_permissions().await {
        eprintln!("Permission gate failed: {}", e);
        return;
    }

    let prompt = controller.mic_check_prompt();
    println!("Mic check prompt: \"{}\"", prompt);
    match controller.submit_mic_check("this is to check") {
        Ok(result) => println!("Mic check accuracy: {}% (passed: {})", result.accuracy, result.passed),
        Err(e) => {
            eprintln!("Mic check error: {}", e);
            return;
        }
    }

    let (recognizer, events) = sim::SimRecognizer::new();
    if let Err(e) = controller
        .start(sim::SimCamera::new(), sim::SimDetector, Some((recognizer, events)))
        .await
    {
        eprintln!("Could not start the session: {}", e);
        return;
    }

    // Answer while the monitors run for a bit.
    tokio::time::sleep(Duration::from_millis(400)).await;
    controller.select_answer("q1", "Transport").ok();
    controller.next();
    controller.select_answer("q2", "Atomicity, Consistency, Isolation, Durability").ok();

    if let Some(alert) = controller.report_interruption(examsentry::exam::Interruption::TabSwitch) {
        println!("{}", alert);
    }

    tokio::time::sleep(Duration::from_millis(600)).await;
    controller.drain_transcript_events();
    if !controller.transcript().is_empty() {
        println!("Captured speech so far: {}", controller.transcript());
    }

    match controller.finish(true).await {
        Ok(redirect) => {
            println!("✅ Test submitted successfully! Redirecting to {}", redirect);
        }
        Err(e) => {
            // Expected when no exam server is running; show what would
            // have been sent.
            println!("❌ Failed: {}", e);
            let payload = controller.assemble_payload();
            println!(
                "Payload that will be retried:\n{}",
                serde_json::to_string_pretty(&payload).unwrap_or_default()
            );
        }
    }

    let timer = controller.timer_state();
    println!(
        "Session length: {}s, flags: {}",
        timer.elapsed_seconds,
        controller.violation_log().counts().total
    );
}
