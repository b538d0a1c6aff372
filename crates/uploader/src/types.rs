//! Data types for the upload flow.

use std::time::Duration;

use chunkup_transfer::UploadError;

/// Result of one upload.
pub type UploadResult = Result<UploadReceipt, UploadError>;

/// Successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Content locator returned by finalize.
    pub locator: String,
    pub key: String,
    pub size: u64,
    /// Chunk size the chunks were actually cut with.
    pub chunk_size: usize,
    pub chunk_count: usize,
}

/// Per-upload knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Send the SHA-256 of the file in the init request.
    /// Otherwise the hash field is left empty.
    pub compute_hash: bool,
}

/// Phase event emitted while uploading. Every event names its upload key.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Initiating {
        key: String,
    },
    Storing {
        key: String,
        index: usize,
        total: usize,
    },
    Finalizing {
        key: String,
    },
    Completed {
        key: String,
        locator: String,
    },
    Failed {
        key: String,
        error: UploadError,
    },
    /// A whole-upload retry is scheduled after `delay`.
    Retrying {
        key: String,
        attempt: u32,
        delay: Duration,
    },
}

impl UploadEvent {
    /// Upload key the event belongs to.
    pub fn key(&self) -> &str {
        match self {
            UploadEvent::Initiating { key }
            | UploadEvent::Storing { key, .. }
            | UploadEvent::Finalizing { key }
            | UploadEvent::Completed { key, .. }
            | UploadEvent::Failed { key, .. }
            | UploadEvent::Retrying { key, .. } => key,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Completed { .. } | UploadEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_key() {
        let e = UploadEvent::Storing {
            key: "k".into(),
            index: 1,
            total: 3,
        };
        assert_eq!(e.key(), "k");
        assert!(!e.is_terminal());
        assert!(
            UploadEvent::Failed {
                key: "k".into(),
                error: UploadError::Cancelled
            }
            .is_terminal()
        );
    }

    #[test]
    fn options_default_skips_hash() {
        assert!(!UploadOptions::default().compute_hash);
    }
}
