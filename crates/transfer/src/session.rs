//! Upload session state machine.
//!
//! The session performs no I/O. A driver asks it what to send next, performs
//! the call, and feeds the outcome back:
//!
//! ```text
//! Pending --begin--> Initiating --on_init--> Storing --on_store(last)--> Finalizing
//!                                                                        |
//!                                         Completed <--on_finalize-------+
//! ```
//!
//! Every non-terminal phase can fall into `Failed`. Calls made in the wrong
//! phase return [`SessionError`] and leave the session untouched.

use chunkup_protocol::{FinalizeUploadRequest, InitUploadRequest, StoreChunkRequest};
use tracing::debug;

use crate::chunked::{Chunk, chunk_count};
use crate::{FailureReason, SessionError, UploadError};

/// Current phase of an upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Pending,
    Initiating,
    Storing { next_index: usize, total: usize },
    Finalizing,
    Completed { locator: String },
    Failed(UploadError),
}

impl Phase {
    /// Short lowercase name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Initiating => "initiating",
            Phase::Storing { .. } => "storing",
            Phase::Finalizing => "finalizing",
            Phase::Completed { .. } => "completed",
            Phase::Failed(_) => "failed",
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed { .. } | Phase::Failed(_))
    }
}

/// One logical file transfer.
#[derive(Debug)]
pub struct UploadSession {
    key: String,
    total_size: u64,
    file_hash: String,
    requested_chunk_size: usize,
    chunk_size: usize,
    phase: Phase,
}

impl UploadSession {
    /// Creates a pending session.
    ///
    /// `file_hash` may be empty. A zero `chunk_size` is rejected.
    pub fn new(
        key: impl Into<String>,
        total_size: u64,
        file_hash: impl Into<String>,
        chunk_size: usize,
    ) -> Result<Self, UploadError> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidConfiguration(
                "chunk size must be positive".into(),
            ));
        }
        Ok(Self {
            key: key.into(),
            total_size,
            file_hash: file_hash.into(),
            requested_chunk_size: chunk_size,
            chunk_size,
            phase: Phase::Pending,
        })
    }

    /// Server-side key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared total size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Chunk size the caller asked for.
    pub fn requested_chunk_size(&self) -> usize {
        self.requested_chunk_size
    }

    /// Chunk size used for boundary accounting (acknowledged after init).
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks at the effective chunk size.
    pub fn chunk_count(&self) -> usize {
        chunk_count(self.total_size, self.chunk_size)
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Index of the next chunk to store, while storing.
    pub fn next_store(&self) -> Option<usize> {
        match self.phase {
            Phase::Storing { next_index, .. } => Some(next_index),
            _ => None,
        }
    }

    /// Number of chunks acknowledged so far.
    pub fn delivered(&self) -> usize {
        match self.phase {
            Phase::Pending | Phase::Initiating => 0,
            Phase::Storing { next_index, .. } => next_index,
            Phase::Finalizing | Phase::Completed { .. } => self.chunk_count(),
            // A failed session keeps no counter; callers read the failing
            // index from the error instead.
            Phase::Failed(_) => 0,
        }
    }

    /// `Pending → Initiating`. Returns the init request to send.
    pub fn begin(&mut self) -> Result<InitUploadRequest, SessionError> {
        self.require(matches!(self.phase, Phase::Pending), "begin")?;
        self.transition(Phase::Initiating);
        Ok(InitUploadRequest {
            file_path: self.key.clone(),
            file_hash: self.file_hash.clone(),
            file_size: self.total_size,
            chunk_size: Some(self.requested_chunk_size as u64),
        })
    }

    /// Applies the init outcome.
    ///
    /// On success `acknowledged_chunk_size` becomes the effective chunk size
    /// unless it is 0. A session with no chunks moves straight to
    /// `Finalizing`.
    pub fn on_init(
        &mut self,
        outcome: Result<u64, FailureReason>,
    ) -> Result<&Phase, SessionError> {
        self.require(matches!(self.phase, Phase::Initiating), "apply init outcome")?;

        match outcome {
            Ok(acknowledged) => {
                if acknowledged > 0 {
                    let acknowledged = acknowledged as usize;
                    if acknowledged != self.chunk_size {
                        debug!(
                            key = %self.key,
                            requested = self.chunk_size,
                            acknowledged,
                            "service chose a different chunk size"
                        );
                    }
                    self.chunk_size = acknowledged;
                }
                let total = self.chunk_count();
                if total == 0 {
                    self.transition(Phase::Finalizing);
                } else {
                    self.transition(Phase::Storing {
                        next_index: 0,
                        total,
                    });
                }
            }
            Err(reason) => self.transition(Phase::Failed(UploadError::InitFailed { reason })),
        }
        Ok(&self.phase)
    }

    /// Builds the store request for `chunk`, which must be the next expected one.
    pub fn store_request(&self, chunk: Chunk) -> Result<StoreChunkRequest, SessionError> {
        let expected = self.require_storing("build store request")?;
        if chunk.index != expected {
            return Err(SessionError::UnexpectedChunk {
                expected,
                got: chunk.index,
            });
        }
        Ok(StoreChunkRequest {
            file_path: self.key.clone(),
            chunk_id: chunk.index as u64,
            chunk_data: chunk.data,
        })
    }

    /// Applies the outcome of storing chunk `index`.
    pub fn on_store(
        &mut self,
        index: usize,
        outcome: Result<(), FailureReason>,
    ) -> Result<&Phase, SessionError> {
        let expected = self.require_storing("apply store outcome")?;
        if index != expected {
            return Err(SessionError::UnexpectedChunk {
                expected,
                got: index,
            });
        }

        match outcome {
            Ok(()) => {
                let total = self.chunk_count();
                let next_index = expected + 1;
                if next_index == total {
                    self.transition(Phase::Finalizing);
                } else {
                    self.phase = Phase::Storing { next_index, total };
                }
            }
            Err(reason) => self.transition(Phase::Failed(UploadError::ChunkUploadFailed {
                index,
                reason,
            })),
        }
        Ok(&self.phase)
    }

    /// Returns the finalize request, while finalizing.
    pub fn finalize_request(&self) -> Result<FinalizeUploadRequest, SessionError> {
        self.require(matches!(self.phase, Phase::Finalizing), "build finalize request")?;
        Ok(FinalizeUploadRequest {
            file_path: self.key.clone(),
        })
    }

    /// Applies the finalize outcome. An empty locator counts as a failure.
    pub fn on_finalize(
        &mut self,
        outcome: Result<String, FailureReason>,
    ) -> Result<&Phase, SessionError> {
        self.require(matches!(self.phase, Phase::Finalizing), "apply finalize outcome")?;

        let next = match outcome {
            Ok(locator) if locator.is_empty() => Phase::Failed(UploadError::FinalizeFailed {
                reason: FailureReason::Transport("finalize reply carried an empty locator".into()),
            }),
            Ok(locator) => Phase::Completed { locator },
            Err(reason) => Phase::Failed(UploadError::FinalizeFailed { reason }),
        };
        self.transition(next);
        Ok(&self.phase)
    }

    /// Abandons the session between remote calls.
    pub fn cancel(&mut self) -> Result<&Phase, SessionError> {
        self.require(!self.phase.is_terminal(), "cancel")?;
        self.transition(Phase::Failed(UploadError::Cancelled));
        Ok(&self.phase)
    }

    /// Terminal result: the locator, or the failure.
    ///
    /// Returns `None` while the session is still running.
    pub fn outcome(&self) -> Option<Result<&str, &UploadError>> {
        match &self.phase {
            Phase::Completed { locator } => Some(Ok(locator)),
            Phase::Failed(e) => Some(Err(e)),
            _ => None,
        }
    }

    fn require(&self, ok: bool, action: &'static str) -> Result<(), SessionError> {
        if ok {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                phase: self.phase.name(),
                action,
            })
        }
    }

    fn require_storing(&self, action: &'static str) -> Result<usize, SessionError> {
        self.next_store().ok_or(SessionError::InvalidTransition {
            phase: self.phase.name(),
            action,
        })
    }

    fn transition(&mut self, next: Phase) {
        debug!(key = %self.key, from = self.phase.name(), to = next.name(), "session transition");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::split;
    use chunkup_protocol::RemoteError;

    fn rejected(tag: &str) -> FailureReason {
        FailureReason::Rejected(RemoteError::new(tag))
    }

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            data: vec![index as u8],
        }
    }

    #[test]
    fn new_session_is_pending() {
        let s = UploadSession::new("k", 10, "", 4).unwrap();
        assert_eq!(s.phase(), &Phase::Pending);
        assert_eq!(s.chunk_count(), 3);
        assert!(s.outcome().is_none());
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let err = UploadSession::new("k", 10, "", 0).unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfiguration(_)));
    }

    #[test]
    fn begin_builds_init_request() {
        let mut s = UploadSession::new("cat.png", 2_500_000, "abc", 1_048_576).unwrap();
        let req = s.begin().unwrap();
        assert_eq!(req.file_path, "cat.png");
        assert_eq!(req.file_hash, "abc");
        assert_eq!(req.file_size, 2_500_000);
        assert_eq!(req.chunk_size, Some(1_048_576));
        assert_eq!(s.phase(), &Phase::Initiating);
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut s = UploadSession::new("k", 1, "", 1).unwrap();
        s.begin().unwrap();
        assert_eq!(
            s.begin().unwrap_err(),
            SessionError::InvalidTransition {
                phase: "initiating",
                action: "begin"
            }
        );
    }

    #[test]
    fn full_happy_path() {
        let data = b"AABBCCDDEE";
        let mut s = UploadSession::new("k", data.len() as u64, "", 4).unwrap();
        s.begin().unwrap();
        assert_eq!(
            s.on_init(Ok(4)).unwrap(),
            &Phase::Storing {
                next_index: 0,
                total: 3
            }
        );

        for c in split(data, s.chunk_size()).unwrap() {
            let index = c.index;
            assert_eq!(s.next_store(), Some(index));
            let req = s.store_request(c).unwrap();
            assert_eq!(req.chunk_id, index as u64);
            s.on_store(index, Ok(())).unwrap();
        }
        assert_eq!(s.phase(), &Phase::Finalizing);
        assert_eq!(s.delivered(), 3);

        assert_eq!(s.finalize_request().unwrap().file_path, "k");
        s.on_finalize(Ok("https://cdn/k".into())).unwrap();
        assert_eq!(s.outcome(), Some(Ok("https://cdn/k")));
    }

    #[test]
    fn acknowledged_chunk_size_is_adopted() {
        let mut s = UploadSession::new("k", 10, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(5)).unwrap();
        assert_eq!(s.chunk_size(), 5);
        assert_eq!(s.requested_chunk_size(), 4);
        assert_eq!(
            s.phase(),
            &Phase::Storing {
                next_index: 0,
                total: 2
            }
        );
    }

    #[test]
    fn zero_acknowledged_chunk_size_keeps_requested() {
        let mut s = UploadSession::new("k", 10, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(0)).unwrap();
        assert_eq!(s.chunk_size(), 4);
        assert_eq!(s.chunk_count(), 3);
    }

    #[test]
    fn empty_upload_skips_storing() {
        let mut s = UploadSession::new("k", 0, "", 4).unwrap();
        s.begin().unwrap();
        assert_eq!(s.on_init(Ok(4)).unwrap(), &Phase::Finalizing);
        assert!(s.next_store().is_none());
        s.on_finalize(Ok("loc".into())).unwrap();
        assert_eq!(s.outcome(), Some(Ok("loc")));
    }

    #[test]
    fn init_failure_is_terminal() {
        let mut s = UploadSession::new("k", 10, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Err(rejected("Unauthorized"))).unwrap();
        assert!(matches!(
            s.outcome(),
            Some(Err(UploadError::InitFailed { .. }))
        ));
        assert!(s.store_request(chunk(0)).is_err());
        assert!(s.finalize_request().is_err());
        assert!(s.cancel().is_err());
    }

    #[test]
    fn store_failure_records_index_and_stops() {
        let mut s = UploadSession::new("k", 12, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(4)).unwrap();
        s.on_store(0, Ok(())).unwrap();
        s.on_store(1, Err(rejected("InvalidChunk"))).unwrap();

        match s.outcome() {
            Some(Err(UploadError::ChunkUploadFailed { index, reason })) => {
                assert_eq!(*index, 1);
                assert_eq!(reason.remote_tag(), Some("InvalidChunk"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(s.next_store().is_none());
        assert!(s.store_request(chunk(2)).is_err());
        assert!(s.finalize_request().is_err());
    }

    #[test]
    fn out_of_order_outcome_is_rejected_without_mutation() {
        let mut s = UploadSession::new("k", 12, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(4)).unwrap();

        assert_eq!(
            s.on_store(1, Ok(())).unwrap_err(),
            SessionError::UnexpectedChunk {
                expected: 0,
                got: 1
            }
        );
        assert_eq!(s.next_store(), Some(0));
        assert!(matches!(
            s.store_request(chunk(2)),
            Err(SessionError::UnexpectedChunk {
                expected: 0,
                got: 2
            })
        ));
    }

    #[test]
    fn finalize_failure_is_terminal() {
        let mut s = UploadSession::new("k", 0, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(0)).unwrap();
        s.on_finalize(Err(FailureReason::Transport("closed".into())))
            .unwrap();
        assert!(matches!(
            s.outcome(),
            Some(Err(UploadError::FinalizeFailed { .. }))
        ));
    }

    #[test]
    fn empty_locator_fails_finalize() {
        let mut s = UploadSession::new("k", 0, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(0)).unwrap();
        s.on_finalize(Ok(String::new())).unwrap();
        assert!(matches!(
            s.outcome(),
            Some(Err(UploadError::FinalizeFailed {
                reason: FailureReason::Transport(_)
            }))
        ));
    }

    #[test]
    fn cancel_from_each_running_phase() {
        let mut pending = UploadSession::new("k", 8, "", 4).unwrap();
        pending.cancel().unwrap();
        assert_eq!(pending.outcome(), Some(Err(&UploadError::Cancelled)));

        let mut storing = UploadSession::new("k", 8, "", 4).unwrap();
        storing.begin().unwrap();
        storing.on_init(Ok(4)).unwrap();
        storing.on_store(0, Ok(())).unwrap();
        storing.cancel().unwrap();
        assert_eq!(storing.outcome(), Some(Err(&UploadError::Cancelled)));
    }

    #[test]
    fn completed_session_cannot_be_cancelled() {
        let mut s = UploadSession::new("k", 0, "", 4).unwrap();
        s.begin().unwrap();
        s.on_init(Ok(0)).unwrap();
        s.on_finalize(Ok("loc".into())).unwrap();
        assert!(matches!(
            s.cancel(),
            Err(SessionError::InvalidTransition {
                phase: "completed",
                ..
            })
        ));
        assert_eq!(s.outcome(), Some(Ok("loc")));
    }

    #[test]
    fn outcomes_before_begin_are_rejected() {
        let mut s = UploadSession::new("k", 8, "", 4).unwrap();
        assert!(s.on_init(Ok(4)).is_err());
        assert!(s.on_store(0, Ok(())).is_err());
        assert!(s.on_finalize(Ok("x".into())).is_err());
        assert_eq!(s.phase(), &Phase::Pending);
    }
}
