pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;

use std::collections::HashMap;
use std::sync::Arc;

use chunkup_protocol::Message;
use tokio::sync::{Mutex, oneshot};

/// Waiters keyed by request id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;
