use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proctoring::{FlagCounts, SuspiciousActivity};

/// Question id → chosen option text. Keys are unique; insertion order is
/// irrelevant.
pub type AnswerMap = HashMap<String, String>;

/// Proctoring evidence attached to a submission.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringData {
    pub suspicious_activities: Vec<SuspiciousActivity>,
    pub total_flags: usize,
    pub high_severity_flags: usize,
    pub medium_severity_flags: usize,
    pub low_severity_flags: usize,
    pub speech_transcript: String,
    pub transcript_length: usize,
}

/// The body POSTed to `/api/submit-test`, constructed once at submission
/// time and not retained after a successful response.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub test_id: String,
    pub answers: AnswerMap,
    pub submitted_at: DateTime<Utc>,
    pub user_id: String,
    pub proctoring_data: ProctoringData,
}

impl SubmissionPayload {
    pub fn assemble(
        test_id: String,
        user_id: String,
        answers: AnswerMap,
        activities: Vec<SuspiciousActivity>,
        transcript: String,
    ) -> Self {
        let counts = FlagCounts::tally(&activities);
        Self {
            test_id,
            answers,
            submitted_at: Utc::now(),
            user_id,
            proctoring_data: ProctoringData {
                suspicious_activities: activities,
                total_flags: counts.total,
                high_severity_flags: counts.high,
                medium_severity_flags: counts.medium,
                low_severity_flags: counts.low,
                transcript_length: transcript.len(),
                speech_transcript: transcript,
            },
        }
    }
}

/// Server response for both success and failure; failures always carry a
/// human-readable `message`.
#[derive(Deserialize, Debug, Default)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proctoring::{ActivityKind, Severity};

    fn activity(kind: ActivityKind, severity: Severity) -> SuspiciousActivity {
        SuspiciousActivity {
            timestamp: Utc::now(),
            kind,
            severity,
            details: String::new(),
        }
    }

    #[test]
    fn assemble_counts_flags_by_severity() {
        let payload = SubmissionPayload::assemble(
            "t1".into(),
            "u1".into(),
            AnswerMap::new(),
            vec![
                activity(ActivityKind::FaceNotDetected, Severity::High),
                activity(ActivityKind::MultipleFaces, Severity::High),
                activity(ActivityKind::LookingDown, Severity::Medium),
            ],
            "hello world".into(),
        );
        assert_eq!(payload.proctoring_data.total_flags, 3);
        assert_eq!(payload.proctoring_data.high_severity_flags, 2);
        assert_eq!(payload.proctoring_data.medium_severity_flags, 1);
        assert_eq!(payload.proctoring_data.low_severity_flags, 0);
        assert_eq!(payload.proctoring_data.transcript_length, 11);
    }

    #[test]
    fn wire_shape_matches_submission_endpoint() {
        let mut answers = AnswerMap::new();
        answers.insert("q1".into(), "option a".into());
        let payload = SubmissionPayload::assemble(
            "test-1".into(),
            "user-1".into(),
            answers,
            vec![activity(ActivityKind::LookingSideways, Severity::Medium)],
            "t".into(),
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["testId"], "test-1");
        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["answers"]["q1"], "option a");
        assert!(value["submittedAt"].is_string());

        let proctoring = &value["proctoringData"];
        assert_eq!(proctoring["totalFlags"], 1);
        assert_eq!(proctoring["mediumSeverityFlags"], 1);
        assert_eq!(proctoring["speechTranscript"], "t");
        assert_eq!(proctoring["transcriptLength"], 1);
        assert_eq!(
            proctoring["suspiciousActivities"][0]["type"],
            "looking_sideways"
        );
    }
}
