//! WebSocket client for the storage service.
//!
//! Implements the request-reply pattern with UUID correlation and ping/pong
//! keepalive. One client is safe to share between concurrent uploads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use chunkup_protocol::{Message, MessageType};

use crate::config::WsClientConfig;
use crate::pumps::PendingMap;
use crate::pumps::read::ReadLimits;

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("service error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("expected {expected:?} reply, got {got:?}")]
    UnexpectedReply {
        expected: MessageType,
        got: MessageType,
    },

    #[error("{0:?} reply carried no payload")]
    EmptyPayload(MessageType),
}

/// WebSocket client connected to one storage endpoint.
pub struct WsClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    request_timeout: Duration,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl WsClient {
    /// Opens the connection and starts the read, write and ping pumps.
    pub async fn connect(config: &WsClientConfig) -> Result<Self, WsError> {
        let mut request = config.url.as_str().into_client_request()?;
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| WsError::Config(format!("auth token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false).await?;
        info!(url = %config.url, "connected to storage service");

        let (write, read) = ws_stream.split();
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            pending.clone(),
            write_tx.clone(),
            ReadLimits {
                max_message_size: config.max_message_size,
                pong_wait: config.pong_wait,
            },
            cancel.clone(),
        ));

        let ping_handle = tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            config.ping_period,
            cancel.clone(),
        ));

        Ok(Self {
            write_tx,
            pending,
            request_timeout: config.request_timeout,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            cancel,
        })
    }

    /// Sends a request and waits for the reply with the same id.
    ///
    /// An envelope-level `error` becomes [`WsError::Remote`].
    pub async fn send_request<T: Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, WsError> {
        if self.is_closed() {
            return Err(WsError::Closed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(WsError::Closed);
        }

        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(WsError::Closed);
        }

        let result = tokio::time::timeout(self.request_timeout, rx).await;
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(WsError::Remote {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(WsError::Closed),
            Err(_) => {
                debug!(id = %id, msg_type = ?msg.msg_type, "request timed out");
                Err(WsError::Timeout)
            }
        }
    }

    /// Sends `req` and decodes the reply payload as `R`.
    ///
    /// The reply must carry the type paired with `msg_type`.
    pub async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        msg_type: MessageType,
        req: &T,
    ) -> Result<R, WsError> {
        let expected = msg_type.reply_type();
        let resp = self.send_request(msg_type.clone(), Some(req)).await?;

        if let Some(expected) = expected
            && resp.msg_type != expected
        {
            return Err(WsError::UnexpectedReply {
                expected,
                got: resp.msg_type,
            });
        }

        resp.parse_payload::<R>()?
            .ok_or(WsError::EmptyPayload(resp.msg_type))
    }

    /// Returns `true` once the connection is gone or [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
        self.cancel.cancel();
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}
