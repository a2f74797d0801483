pub mod face_monitor;
pub mod speech_monitor;
pub mod violations;

pub use face_monitor::*;
pub use speech_monitor::*;
pub use violations::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classified anomaly kinds observed during a proctored session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FaceNotDetected,
    MultipleFaces,
    LookingAway,
    LookingDown,
    LookingSideways,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single timestamped anomaly. Immutable once created; the wire shape uses
/// `type` for the kind to match the submission endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SuspiciousActivity {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub severity: Severity,
    pub details: String,
}

/// Per-severity flag totals, computed over the session's activity sequence.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlagCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl FlagCounts {
    pub fn tally(activities: &[SuspiciousActivity]) -> Self {
        let mut counts = FlagCounts {
            total: activities.len(),
            ..Default::default()
        };
        for activity in activities {
            match activity.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_kind_uses_snake_case_wire_names() {
        let json = serde_json::to_string(&ActivityKind::FaceNotDetected).unwrap();
        assert_eq!(json, "\"face_not_detected\"");
        let json = serde_json::to_string(&ActivityKind::LookingSideways).unwrap();
        assert_eq!(json, "\"looking_sideways\"");
    }

    #[test]
    fn activity_serializes_kind_under_type_key() {
        let activity = SuspiciousActivity {
            timestamp: Utc::now(),
            kind: ActivityKind::MultipleFaces,
            severity: Severity::High,
            details: "2 faces detected".to_string(),
        };
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], "multiple_faces");
        assert_eq!(value["severity"], "high");
    }
}
