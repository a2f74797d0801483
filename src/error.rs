use thiserror::Error;

/// Error taxonomy for the proctored exam client.
///
/// Nothing here is process-fatal: permission and capability problems block
/// or degrade the session and submission failures are retryable. Transient
/// detection errors and violation-report failures never reach this type;
/// they are logged at their call sites and swallowed.
#[derive(Debug, Error)]
pub enum ProctorError {
    /// Camera / microphone / fullscreen access was refused. Blocks progress,
    /// manual retry only.
    #[error("{device} permission denied: {reason}")]
    PermissionDenied { device: &'static str, reason: String },

    /// The environment has no usable engine for this channel. The session
    /// proceeds without that proctoring channel.
    #[error("{capability} unavailable: {reason}")]
    CapabilityUnavailable {
        capability: &'static str,
        reason: String,
    },

    /// The submission endpoint rejected or never received the payload.
    /// `status` is 0 when the request never reached the server.
    #[error("submission failed (HTTP {status}): {message}")]
    SubmissionFailed { status: u16, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Lifecycle misuse (wrong phase, double start, unknown question id).
    #[error("{0}")]
    Session(String),
}

impl ProctorError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProctorError::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denial_is_distinguishable() {
        let err = ProctorError::PermissionDenied {
            device: "camera",
            reason: "denied by user".to_string(),
        };
        assert!(err.is_permission_denied());
        assert!(!ProctorError::Session("double start".to_string()).is_permission_denied());
    }

    #[test]
    fn submission_failure_surfaces_the_server_message() {
        let err = ProctorError::SubmissionFailed {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "submission failed (HTTP 500): Internal Server Error"
        );
    }
}
