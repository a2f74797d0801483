use chrono::Utc;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::error::ProctorError;
use crate::exam::submission::{SubmissionPayload, SubmitResponse};

/// Client for the exam server's two documented endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: Client::new(),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProctorError> {
        self.base
            .join(path)
            .map_err(|e| ProctorError::Config(format!("bad endpoint {}: {}", path, e)))
    }

    /// POST the assembled submission. Non-success responses surface the
    /// server-provided message so the student sees why and can retry.
    pub async fn submit_test(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmitResponse, ProctorError> {
        let url = self.endpoint("/api/submit-test")?;
        info!("📤 Submitting test {} for user {}", payload.test_id, payload.user_id);

        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProctorError::SubmissionFailed {
                status: 0,
                message: format!("network error: {}", e),
            })?;

        let status = response.status();
        let body: SubmitResponse = response.json().await.unwrap_or_default();

        if status.is_success() && body.success {
            info!("✅ Test submitted successfully");
            Ok(body)
        } else {
            let message = body
                .message
                .unwrap_or_else(|| "Internal Server Error".to_string());
            warn!("❌ Submission rejected (HTTP {}): {}", status.as_u16(), message);
            Err(ProctorError::SubmissionFailed {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Fire-and-forget violation report. Failures are logged and never
    /// block or retry; the student is not held up by a flaky reporter.
    pub fn record_violation(&self, message: &str) {
        info!("Violation recorded: {}", message);

        let url = match self.endpoint("/api/record-violations") {
            Ok(url) => url,
            Err(e) => {
                warn!("⚠️ Violation report skipped: {}", e);
                return;
            }
        };
        let http = self.http.clone();
        let body = json!({
            "message": message,
            "timestamp": Utc::now(),
        });

        tokio::spawn(async move {
            match http.post(url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Violation report delivered");
                }
                Ok(response) => {
                    warn!(
                        "⚠️ Violation report rejected: HTTP {}",
                        response.status().as_u16()
                    );
                }
                Err(e) => {
                    warn!("⚠️ Violation report failed: {}", e);
                }
            }
        });
    }
}
