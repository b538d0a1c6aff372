//! Transport-level error type.

use chunkup_transfer::FailureReason;

/// A storage call that produced no well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for FailureReason {
    fn from(e: TransportError) -> Self {
        FailureReason::Transport(e.to_string())
    }
}
