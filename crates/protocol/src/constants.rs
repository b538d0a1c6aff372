use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time to wait for any incoming frame before the connection is considered dead.
///
/// Pongs, replies and server pushes all count. Kept well above
/// [`WS_REQUEST_TIMEOUT`] so a slow chunk store is reported as a request
/// timeout rather than a dropped connection.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum accepted frame size in bytes (16 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default timeout for a single request/reply exchange.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from client to storage service
    #[serde(rename = "init_upload")]
    InitUpload,
    #[serde(rename = "store_chunk")]
    StoreChunk,
    #[serde(rename = "finalize_upload")]
    FinalizeUpload,
    #[serde(rename = "ping")]
    Ping,

    // Replies from storage service to client
    #[serde(rename = "upload_initialized")]
    UploadInitialized,
    #[serde(rename = "chunk_stored")]
    ChunkStored,
    #[serde(rename = "upload_finalized")]
    UploadFinalized,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error,
}

impl MessageType {
    /// Reply type a well-behaved service answers this request with.
    ///
    /// Returns `None` for types that are not requests.
    pub fn reply_type(&self) -> Option<MessageType> {
        match self {
            MessageType::InitUpload => Some(MessageType::UploadInitialized),
            MessageType::StoreChunk => Some(MessageType::ChunkStored),
            MessageType::FinalizeUpload => Some(MessageType::UploadFinalized),
            MessageType::Ping => Some(MessageType::Pong),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_wire_names() {
        let json = serde_json::to_string(&MessageType::StoreChunk).unwrap();
        assert_eq!(json, "\"store_chunk\"");
        let parsed: MessageType = serde_json::from_str("\"upload_finalized\"").unwrap();
        assert_eq!(parsed, MessageType::UploadFinalized);
    }

    #[test]
    fn requests_have_reply_types() {
        assert_eq!(
            MessageType::InitUpload.reply_type(),
            Some(MessageType::UploadInitialized)
        );
        assert_eq!(
            MessageType::FinalizeUpload.reply_type(),
            Some(MessageType::UploadFinalized)
        );
        assert_eq!(MessageType::ChunkStored.reply_type(), None);
    }

    #[test]
    fn pong_wait_exceeds_request_timeout() {
        assert!(WS_PONG_WAIT > WS_REQUEST_TIMEOUT);
        assert!(WS_PING_PERIOD < WS_PONG_WAIT);
    }
}
