use std::time::Duration;

use chunkup_protocol::constants::{
    WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT, WS_REQUEST_TIMEOUT,
};

/// Connection settings for [`WsClient`](crate::WsClient).
#[derive(Debug, Clone, PartialEq)]
pub struct WsClientConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` on the upgrade request.
    pub auth_token: Option<String>,
    /// Bound on a single request/reply exchange.
    pub request_timeout: Duration,
    /// Largest frame accepted from the service.
    pub max_message_size: usize,
    pub ping_period: Duration,
    /// Silence after which the connection is considered dead.
    pub pong_wait: Duration,
}

impl WsClientConfig {
    /// Config for `url` with default timings and no token.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            request_timeout: WS_REQUEST_TIMEOUT,
            max_message_size: WS_MAX_MESSAGE_SIZE,
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
