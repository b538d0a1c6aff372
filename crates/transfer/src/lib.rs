//! Chunking and the upload session state machine.
//!
//! Nothing in this crate performs network I/O. [`UploadSession`] decides what
//! to send next and records outcomes; a driver (see `chunkup-uploader`) does
//! the calls.

mod chunked;
mod error;
mod file;
mod session;
mod validation;

pub use chunked::{Chunk, checksum_bytes, chunk_count, split};
pub use error::{FailureReason, SessionError, UploadError};
pub use file::{FileHandle, timestamped_key};
pub use session::{Phase, UploadSession};
pub use validation::{MAX_KEY_LEN, validate_target_key};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
