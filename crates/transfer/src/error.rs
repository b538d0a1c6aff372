//! Upload failure taxonomy.

use std::fmt;

use chunkup_protocol::RemoteError;

/// Why a remote phase failed.
///
/// Both variants end the session the same way; the split only serves
/// diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The service answered with a tagged error.
    Rejected(RemoteError),
    /// The call never produced a well-formed reply (timeout, closed
    /// connection, unexpected reply shape).
    Transport(String),
}

impl FailureReason {
    /// Returns the remote error tag, if the service rejected the call.
    pub fn remote_tag(&self) -> Option<&str> {
        match self {
            FailureReason::Rejected(e) => Some(&e.tag),
            FailureReason::Transport(_) => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Rejected(e) => write!(f, "rejected by service: {e}"),
            FailureReason::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl From<RemoteError> for FailureReason {
    fn from(e: RemoteError) -> Self {
        FailureReason::Rejected(e)
    }
}

/// Terminal failure of one upload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("upload initialization failed: {reason}")]
    InitFailed { reason: FailureReason },

    #[error("chunk {index} upload failed: {reason}")]
    ChunkUploadFailed { index: usize, reason: FailureReason },

    #[error("upload finalization failed: {reason}")]
    FinalizeFailed { reason: FailureReason },

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` if re-running the whole upload could succeed.
    ///
    /// Configuration errors and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            UploadError::InvalidConfiguration(_) | UploadError::Cancelled
        )
    }

    /// Returns the failure reason of a remote phase.
    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            UploadError::InitFailed { reason }
            | UploadError::ChunkUploadFailed { reason, .. }
            | UploadError::FinalizeFailed { reason } => Some(reason),
            UploadError::InvalidConfiguration(_) | UploadError::Cancelled => None,
        }
    }
}

/// Misuse of the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        action: &'static str,
    },

    #[error("expected outcome for chunk {expected}, got chunk {got}")]
    UnexpectedChunk { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_phase_and_reason() {
        let err = UploadError::ChunkUploadFailed {
            index: 1,
            reason: FailureReason::Rejected(RemoteError::new("UploadNotFound")),
        };
        assert_eq!(
            err.to_string(),
            "chunk 1 upload failed: rejected by service: UploadNotFound"
        );

        let err = UploadError::InitFailed {
            reason: FailureReason::Transport("request timed out".into()),
        };
        assert_eq!(
            err.to_string(),
            "upload initialization failed: transport failure: request timed out"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(!UploadError::Cancelled.is_retryable());
        assert!(!UploadError::InvalidConfiguration("x".into()).is_retryable());
        assert!(
            UploadError::FinalizeFailed {
                reason: FailureReason::Transport("closed".into())
            }
            .is_retryable()
        );
    }

    #[test]
    fn reason_exposes_remote_tag() {
        let err = UploadError::FinalizeFailed {
            reason: RemoteError::new("NotAllChunksReceived").into(),
        };
        assert_eq!(
            err.reason().and_then(FailureReason::remote_tag),
            Some("NotAllChunksReceived")
        );
        assert!(UploadError::Cancelled.reason().is_none());
    }
}
