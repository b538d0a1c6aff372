//! Inbound frame dispatch.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chunkup_protocol::Message;

use super::PendingMap;

/// Limits applied by the read pump.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadLimits {
    pub max_message_size: usize,
    pub pong_wait: Duration,
}

/// Reads frames and routes replies to their waiters.
///
/// Any incoming frame resets the liveness deadline. When nothing arrives
/// within `pong_wait`, or the stream ends, the pump exits. On exit it clears
/// the connection token so the other pumps stop too, then clears the
/// pending map (waiters observe a closed channel).
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    write_tx: mpsc::Sender<tungstenite::Message>,
    limits: ReadLimits,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(limits.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline => {
                warn!(wait_secs = limits.pong_wait.as_secs(), "no frames from service, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        deadline.as_mut().reset(tokio::time::Instant::now() + limits.pong_wait);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_message(&text, &pending, limits.max_message_size).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => trace!("received pong"),
                            tungstenite::Message::Close(frame) => {
                                debug!(?frame, "received close frame");
                                break;
                            }
                            tungstenite::Message::Binary(data) => {
                                warn!(len = data.len(), "unexpected binary frame, dropping");
                            }
                            tungstenite::Message::Frame(_) => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                    None => {
                        debug!("websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cancel before clearing so a request that registers after the clear
    // sees the closed connection.
    cancel.cancel();
    let dropped = {
        let mut map = pending.lock().await;
        let n = map.len();
        map.clear();
        n
    };
    if dropped > 0 {
        debug!(dropped, "connection closed with requests in flight");
    }
}

/// Routes one text frame to its waiter.
async fn handle_text_message(text: &str, pending: &PendingMap, max_message_size: usize) {
    if text.len() > max_message_size {
        warn!(len = text.len(), limit = max_message_size, "frame too large, dropping");
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "malformed envelope, dropping");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    let waiter = pending.lock().await.remove(&msg.id);
    match waiter {
        Some(tx) => {
            let _ = tx.send(msg);
        }
        None => {
            debug!(msg_type = ?msg.msg_type, id = %msg.id, "unsolicited message, dropping");
        }
    }
}
