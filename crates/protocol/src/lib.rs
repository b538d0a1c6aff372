//! Wire types for the chunked upload handshake.
//!
//! Three operations make up an upload: `init_upload`, one `store_chunk` per
//! chunk, then `finalize_upload`. Each is answered with a tagged
//! [`Reply`](messages::Reply).

pub mod constants;
pub mod envelope;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{EnvelopeError, Message};
pub use messages::{
    FinalizeUploadRequest, FinalizeUploadResponse, InitUploadRequest, InitUploadResponse,
    RemoteError, Reply, StoreChunkRequest, StoreChunkResponse,
};
