//! Upload orchestration over a storage transport.
//!
//! This crate drives [`chunkup_transfer::UploadSession`] against any
//! [`StorageTransport`]. It has no wire dependencies; the CLI provides a
//! WebSocket-backed transport.
//!
//! # Pipeline
//!
//! 1. **Validate** the file handle and chunk size
//! 2. **Init** the upload; adopt the acknowledged chunk size
//! 3. **Store** each chunk in ascending order, one in flight
//! 4. **Finalize** and return the content locator

pub mod driver;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod retry;
pub mod transport;
pub mod types;

pub use driver::SessionDriver;
pub use error::TransportError;
pub use memory::{Fault, MemoryStorage, StorageCall};
pub use orchestrator::UploadOrchestrator;
pub use retry::RetryPolicy;
pub use transport::{StorageTransport, TransportFuture};
pub use types::{UploadEvent, UploadOptions, UploadReceipt, UploadResult};

pub use chunkup_transfer::{FailureReason, FileHandle, UploadError};
