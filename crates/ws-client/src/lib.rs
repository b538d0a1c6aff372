//! WebSocket client for the storage service.
//!
//! Request/reply over JSON envelopes with UUID correlation and ping/pong
//! keepalive.

mod config;
mod pumps;
pub mod ws_client;

pub use config::WsClientConfig;
pub use ws_client::{WsClient, WsError};
