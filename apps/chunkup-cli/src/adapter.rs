//! Bridges `WsClient` to the uploader's `StorageTransport` trait.

use std::sync::Arc;

use chunkup_protocol::{
    FinalizeUploadRequest, FinalizeUploadResponse, InitUploadRequest, InitUploadResponse,
    MessageType, RemoteError, Reply, StoreChunkRequest, StoreChunkResponse,
};
use chunkup_uploader::{StorageTransport, TransportError, TransportFuture};
use chunkup_ws_client::{WsClient, WsError};

/// Implements `StorageTransport` by delegating to a shared `WsClient`.
pub struct WsStorageTransport {
    client: Arc<WsClient>,
}

impl WsStorageTransport {
    pub fn new(client: Arc<WsClient>) -> Self {
        Self { client }
    }
}

impl StorageTransport for WsStorageTransport {
    fn init_upload(&self, req: InitUploadRequest) -> TransportFuture<'_, InitUploadResponse> {
        Box::pin(async move {
            self.client
                .call::<_, Reply<InitUploadResponse>>(MessageType::InitUpload, &req)
                .await
                .or_else(envelope_rejection)
        })
    }

    fn store_chunk(&self, req: StoreChunkRequest) -> TransportFuture<'_, StoreChunkResponse> {
        Box::pin(async move {
            self.client
                .call::<_, Reply<StoreChunkResponse>>(MessageType::StoreChunk, &req)
                .await
                .or_else(envelope_rejection)
        })
    }

    fn finalize_upload(
        &self,
        req: FinalizeUploadRequest,
    ) -> TransportFuture<'_, FinalizeUploadResponse> {
        Box::pin(async move {
            self.client
                .call::<_, Reply<FinalizeUploadResponse>>(MessageType::FinalizeUpload, &req)
                .await
                .or_else(envelope_rejection)
        })
    }
}

/// Tag given to envelope-level service errors (bad token, unknown type).
const SERVICE_ERROR_TAG: &str = "ServiceError";

/// Turns an envelope-level error into a tagged rejection; anything else
/// failed at the transport.
fn envelope_rejection<T>(e: WsError) -> Result<Reply<T>, TransportError> {
    match e {
        WsError::Remote { code, message } => Ok(Reply::Err(RemoteError::with_detail(
            SERVICE_ERROR_TAG,
            serde_json::json!({ "code": code, "message": message }),
        ))),
        other => Err(transport_error(other)),
    }
}

fn transport_error(e: WsError) -> TransportError {
    match e {
        WsError::Timeout => TransportError::Timeout,
        WsError::Closed => TransportError::Closed,
        WsError::Json(_) | WsError::UnexpectedReply { .. } | WsError::EmptyPayload(_) => {
            TransportError::Malformed(e.to_string())
        }
        WsError::Ws(_) | WsError::Config(_) | WsError::Remote { .. } => {
            TransportError::Other(e.to_string())
        }
    }
}
