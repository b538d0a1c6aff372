//! Upload orchestrator.
//!
//! Runs uploads against one shared transport, aggregates phase events, and
//! supports cancellation.

use std::sync::Arc;

use chunkup_transfer::{FileHandle, UploadError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::driver::SessionDriver;
use crate::retry::RetryPolicy;
use crate::transport::StorageTransport;
use crate::types::{UploadEvent, UploadOptions, UploadResult};

/// Event channel capacity.
const EVENT_CAPACITY: usize = 256;

/// Orchestrates chunked uploads over a [`StorageTransport`].
pub struct UploadOrchestrator {
    transport: Arc<dyn StorageTransport>,
    options: UploadOptions,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    /// Creates an orchestrator with default options.
    pub fn new(transport: Arc<dyn StorageTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            transport,
            options: UploadOptions::default(),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the upload options.
    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token shared by every upload of this
    /// orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads one file, cutting chunks of `chunk_size_hint` bytes unless the
    /// service acknowledges a different size.
    pub async fn upload(&self, file: &FileHandle, chunk_size_hint: usize) -> UploadResult {
        SessionDriver::new(
            self.transport.as_ref(),
            self.cancel.clone(),
            &self.events_tx,
            &self.options,
        )
        .run(file, chunk_size_hint)
        .await
    }

    /// Uploads several files concurrently, one task per file.
    ///
    /// Each upload runs independently; one failing never affects the others.
    /// Results come back in input order.
    pub async fn upload_many(
        &self,
        files: Vec<FileHandle>,
        chunk_size_hint: usize,
    ) -> Vec<UploadResult> {
        let handles: Vec<_> = files
            .into_iter()
            .map(|file| {
                let transport = Arc::clone(&self.transport);
                let cancel = self.cancel.clone();
                let events_tx = self.events_tx.clone();
                let options = self.options.clone();
                tokio::spawn(async move {
                    SessionDriver::new(transport.as_ref(), cancel, &events_tx, &options)
                        .run(&file, chunk_size_hint)
                        .await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(UploadError::Cancelled),
            };
            results.push(result);
        }
        results
    }

    /// Uploads one file, re-running the whole upload on retryable failures.
    ///
    /// Configuration errors and cancellation are returned immediately.
    /// Cancellation also interrupts the backoff sleep.
    pub async fn upload_with_retry(
        &self,
        file: &FileHandle,
        chunk_size_hint: usize,
        policy: &RetryPolicy,
    ) -> UploadResult {
        let mut attempt = 1;
        loop {
            let err = match self.upload(file, chunk_size_hint).await {
                Ok(receipt) => {
                    if attempt > 1 {
                        info!(key = %file.key(), attempt, "upload succeeded after retry");
                    }
                    return Ok(receipt);
                }
                Err(e) => e,
            };

            if !err.is_retryable() || !policy.allows_retry_after(attempt) {
                return Err(err);
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                key = %file.key(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "upload failed, retrying"
            );
            let _ = self.events_tx.try_send(UploadEvent::Retrying {
                key: file.key().to_string(),
                attempt: attempt + 1,
                delay,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
