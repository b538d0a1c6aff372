//! Per-upload control loop.
//!
//! `SessionDriver` owns one [`UploadSession`] and feeds it transport
//! outcomes until it reaches a terminal phase.

use chunkup_transfer::{
    FileHandle, Phase, SessionError, UploadError, UploadSession, split,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::transport::{StorageTransport, settle};
use crate::types::{UploadEvent, UploadOptions, UploadReceipt, UploadResult};

/// Drives a single upload against a transport.
pub struct SessionDriver<'a> {
    transport: &'a dyn StorageTransport,
    cancel: CancellationToken,
    events_tx: &'a mpsc::Sender<UploadEvent>,
    options: &'a UploadOptions,
}

impl<'a> SessionDriver<'a> {
    /// Creates a driver.
    pub fn new(
        transport: &'a dyn StorageTransport,
        cancel: CancellationToken,
        events_tx: &'a mpsc::Sender<UploadEvent>,
        options: &'a UploadOptions,
    ) -> Self {
        Self {
            transport,
            cancel,
            events_tx,
            options,
        }
    }

    /// Runs init, every store in order, then finalize.
    ///
    /// Cancellation is checked before each remote call. A call already in
    /// flight always runs to its outcome.
    pub async fn run(&self, file: &FileHandle, chunk_size_hint: usize) -> UploadResult {
        file.validate()?;
        let mut chunks = split(file.data(), chunk_size_hint)?.into_iter();

        let file_hash = if self.options.compute_hash {
            file.content_hash()
        } else {
            String::new()
        };
        let mut session =
            UploadSession::new(file.key(), file.size(), file_hash, chunk_size_hint)?;

        while !session.phase().is_terminal() {
            if self.cancel.is_cancelled() {
                debug!(key = %file.key(), phase = session.phase().name(), "cancellation observed");
                session.cancel().map_err(guard_violation)?;
                break;
            }

            match session.phase().clone() {
                Phase::Pending => {
                    let req = session.begin().map_err(guard_violation)?;
                    self.emit(UploadEvent::Initiating {
                        key: file.key().to_string(),
                    });

                    let outcome = settle(self.transport.init_upload(req).await);
                    session
                        .on_init(outcome.map(|ack| ack.chunk_size))
                        .map_err(guard_violation)?;

                    if !session.phase().is_terminal() && session.chunk_size() != chunk_size_hint {
                        chunks = split(file.data(), session.chunk_size())?.into_iter();
                    }
                }
                Phase::Storing { next_index, total } => {
                    let chunk = chunks.next().ok_or_else(|| {
                        guard_violation(SessionError::InvalidTransition {
                            phase: "storing",
                            action: "take next chunk",
                        })
                    })?;
                    self.emit(UploadEvent::Storing {
                        key: file.key().to_string(),
                        index: next_index,
                        total,
                    });

                    let len = chunk.len();
                    let req = session.store_request(chunk).map_err(guard_violation)?;
                    let outcome = settle(self.transport.store_chunk(req).await);
                    if outcome.is_ok() {
                        debug!(key = %file.key(), index = next_index, len, "chunk stored");
                    }
                    session
                        .on_store(next_index, outcome.map(|_| ()))
                        .map_err(guard_violation)?;
                }
                Phase::Finalizing => {
                    let req = session.finalize_request().map_err(guard_violation)?;
                    self.emit(UploadEvent::Finalizing {
                        key: file.key().to_string(),
                    });

                    let outcome = settle(self.transport.finalize_upload(req).await);
                    session
                        .on_finalize(outcome.map(|ack| ack.url))
                        .map_err(guard_violation)?;
                }
                Phase::Initiating | Phase::Completed { .. } | Phase::Failed(_) => break,
            }
        }

        self.conclude(&session)
    }

    fn conclude(&self, session: &UploadSession) -> UploadResult {
        let key = session.key().to_string();
        match session.outcome() {
            Some(Ok(locator)) => {
                info!(key = %key, locator, chunks = session.chunk_count(), "upload completed");
                self.emit(UploadEvent::Completed {
                    key: key.clone(),
                    locator: locator.to_string(),
                });
                Ok(UploadReceipt {
                    locator: locator.to_string(),
                    key,
                    size: session.total_size(),
                    chunk_size: session.chunk_size(),
                    chunk_count: session.chunk_count(),
                })
            }
            Some(Err(e)) => {
                error!(key = %key, error = %e, "upload failed");
                self.emit(UploadEvent::Failed {
                    key,
                    error: e.clone(),
                });
                Err(e.clone())
            }
            None => Err(guard_violation(SessionError::InvalidTransition {
                phase: session.phase().name(),
                action: "conclude",
            })),
        }
    }

    /// Events never block or fail the upload.
    fn emit(&self, event: UploadEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

fn guard_violation(e: SessionError) -> UploadError {
    UploadError::InvalidConfiguration(format!("session guard violated: {e}"))
}
