//! Storage transport trait.
//!
//! The CLI implements this on top of `WsClient`. Tests use
//! [`MemoryStorage`](crate::MemoryStorage). Keeping the three calls behind a
//! trait keeps the driver free of any wire concerns.

use std::future::Future;
use std::pin::Pin;

use chunkup_protocol::{
    FinalizeUploadRequest, FinalizeUploadResponse, InitUploadRequest, InitUploadResponse, Reply,
    StoreChunkRequest, StoreChunkResponse,
};
use chunkup_transfer::FailureReason;

use crate::error::TransportError;

/// Boxed future returned by every [`StorageTransport`] call.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Reply<T>, TransportError>> + Send + 'a>>;

/// The three remote operations of the upload protocol.
///
/// Implementations must be reentrant: independent uploads share one
/// transport and may call it concurrently. A reply is decoded once, here;
/// `Ok(Reply::Err(_))` is a rejection by the service, `Err(_)` means no
/// usable reply arrived.
pub trait StorageTransport: Send + Sync {
    /// Opens an upload.
    fn init_upload(&self, req: InitUploadRequest) -> TransportFuture<'_, InitUploadResponse>;

    /// Stores one chunk.
    fn store_chunk(&self, req: StoreChunkRequest) -> TransportFuture<'_, StoreChunkResponse>;

    /// Seals the upload and returns the content locator.
    fn finalize_upload(
        &self,
        req: FinalizeUploadRequest,
    ) -> TransportFuture<'_, FinalizeUploadResponse>;
}

/// Collapses a transport result into what the session consumes.
pub(crate) fn settle<T>(result: Result<Reply<T>, TransportError>) -> Result<T, FailureReason> {
    match result {
        Ok(Reply::Ok(value)) => Ok(value),
        Ok(Reply::Err(remote)) => Err(FailureReason::Rejected(remote)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkup_protocol::RemoteError;

    #[test]
    fn settle_ok() {
        let r: Result<Reply<u32>, TransportError> = Ok(Reply::Ok(7));
        assert_eq!(settle(r), Ok(7));
    }

    #[test]
    fn settle_rejected_keeps_tag() {
        let r: Result<Reply<u32>, TransportError> =
            Ok(Reply::Err(RemoteError::new("UploadNotFound")));
        assert_eq!(settle(r).unwrap_err().remote_tag(), Some("UploadNotFound"));
    }

    #[test]
    fn settle_transport_failure() {
        let r: Result<Reply<u32>, TransportError> = Err(TransportError::Closed);
        assert_eq!(
            settle(r),
            Err(FailureReason::Transport("connection closed".into()))
        );
    }
}
