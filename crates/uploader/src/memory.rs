//! In-memory storage service.
//!
//! Behaves like the remote store (uploads must be opened before chunks are
//! accepted, finalize checks every byte arrived) and records every call.
//! Faults can be injected per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chunkup_protocol::{
    FinalizeUploadRequest, FinalizeUploadResponse, InitUploadRequest, InitUploadResponse,
    RemoteError, Reply, StoreChunkRequest, StoreChunkResponse,
};
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{StorageTransport, TransportFuture};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Init(InitUploadRequest),
    Store {
        file_path: String,
        chunk_id: u64,
        len: usize,
    },
    Finalize(FinalizeUploadRequest),
}

/// Failure to answer a call with.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    Remote(RemoteError),
    Transport(TransportError),
}

#[derive(Debug, Clone)]
struct Injected {
    fault: Fault,
    /// `None` fails forever.
    remaining: Option<u32>,
}

impl Injected {
    fn fire(&mut self) -> Option<Fault> {
        match &mut self.remaining {
            None => Some(self.fault.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.fault.clone())
            }
        }
    }
}

#[derive(Debug, Default)]
struct OpenUpload {
    file_size: u64,
    chunks: BTreeMap<u64, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<StorageCall>,
    open: HashMap<String, OpenUpload>,
    objects: HashMap<String, Vec<u8>>,
    ack_chunk_size: u64,
    init_fault: Option<Injected>,
    store_faults: HashMap<u64, Injected>,
    finalize_fault: Option<Injected>,
}

/// In-memory [`StorageTransport`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Creates an empty store that keeps the requested chunk size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every init with this chunk size (0 keeps the requested one).
    pub fn with_ack_chunk_size(self, chunk_size: u64) -> Self {
        self.lock().ack_chunk_size = chunk_size;
        self
    }

    /// Fails every init.
    pub fn fail_init(&self, fault: Fault) {
        self.lock().init_fault = Some(Injected {
            fault,
            remaining: None,
        });
    }

    /// Fails the next `times` inits, then succeeds.
    pub fn fail_init_times(&self, fault: Fault, times: u32) {
        self.lock().init_fault = Some(Injected {
            fault,
            remaining: Some(times),
        });
    }

    /// Fails every store of `chunk_id`.
    pub fn fail_store_at(&self, chunk_id: u64, fault: Fault) {
        self.lock().store_faults.insert(
            chunk_id,
            Injected {
                fault,
                remaining: None,
            },
        );
    }

    /// Fails the next `times` stores of `chunk_id`, then succeeds.
    pub fn fail_store_at_times(&self, chunk_id: u64, fault: Fault, times: u32) {
        self.lock().store_faults.insert(
            chunk_id,
            Injected {
                fault,
                remaining: Some(times),
            },
        );
    }

    /// Fails every finalize.
    pub fn fail_finalize(&self, fault: Fault) {
        self.lock().finalize_fault = Some(Injected {
            fault,
            remaining: None,
        });
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    /// Chunk ids stored for `file_path`, in call order.
    pub fn store_indices(&self, file_path: &str) -> Vec<u64> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                StorageCall::Store {
                    file_path: p,
                    chunk_id,
                    ..
                } if p == file_path => Some(*chunk_id),
                _ => None,
            })
            .collect()
    }

    /// Number of finalize calls for `file_path`.
    pub fn finalize_count(&self, file_path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StorageCall::Finalize(r) if r.file_path == file_path))
            .count()
    }

    /// Reassembled bytes of a finalized object.
    pub fn object(&self, file_path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(file_path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle_init(&self, req: InitUploadRequest) -> Result<Reply<InitUploadResponse>, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(StorageCall::Init(req.clone()));

        if let Some(fault) = inner.init_fault.as_mut().and_then(Injected::fire) {
            return answer(fault);
        }

        inner.open.insert(
            req.file_path.clone(),
            OpenUpload {
                file_size: req.file_size,
                chunks: BTreeMap::new(),
            },
        );
        debug!(key = %req.file_path, size = req.file_size, "memory storage: upload opened");
        Ok(Reply::Ok(InitUploadResponse {
            chunk_size: inner.ack_chunk_size,
        }))
    }

    fn handle_store(&self, req: StoreChunkRequest) -> Result<Reply<StoreChunkResponse>, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(StorageCall::Store {
            file_path: req.file_path.clone(),
            chunk_id: req.chunk_id,
            len: req.chunk_data.len(),
        });

        if let Some(fault) = inner
            .store_faults
            .get_mut(&req.chunk_id)
            .and_then(Injected::fire)
        {
            return answer(fault);
        }

        match inner.open.get_mut(&req.file_path) {
            Some(upload) => {
                upload.chunks.insert(req.chunk_id, req.chunk_data);
                Ok(Reply::Ok(StoreChunkResponse {}))
            }
            None => Ok(Reply::Err(RemoteError::new("UploadNotFound"))),
        }
    }

    fn handle_finalize(
        &self,
        req: FinalizeUploadRequest,
    ) -> Result<Reply<FinalizeUploadResponse>, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(StorageCall::Finalize(req.clone()));

        if let Some(fault) = inner.finalize_fault.as_mut().and_then(Injected::fire) {
            return answer(fault);
        }

        let Some(upload) = inner.open.remove(&req.file_path) else {
            return Ok(Reply::Err(RemoteError::new("UploadNotFound")));
        };

        let data: Vec<u8> = upload.chunks.into_values().flatten().collect();
        if data.len() as u64 != upload.file_size {
            return Ok(Reply::Err(RemoteError::with_detail(
                "NotAllChunksReceived",
                serde_json::json!(data.len()),
            )));
        }

        inner.objects.insert(req.file_path.clone(), data);
        Ok(Reply::Ok(FinalizeUploadResponse {
            url: format!("memory://{}", req.file_path),
        }))
    }
}

fn answer<T>(fault: Fault) -> Result<Reply<T>, TransportError> {
    match fault {
        Fault::Remote(e) => Ok(Reply::Err(e)),
        Fault::Transport(e) => Err(e),
    }
}

impl StorageTransport for MemoryStorage {
    fn init_upload(&self, req: InitUploadRequest) -> TransportFuture<'_, InitUploadResponse> {
        Box::pin(async move { self.handle_init(req) })
    }

    fn store_chunk(&self, req: StoreChunkRequest) -> TransportFuture<'_, StoreChunkResponse> {
        Box::pin(async move { self.handle_store(req) })
    }

    fn finalize_upload(
        &self,
        req: FinalizeUploadRequest,
    ) -> TransportFuture<'_, FinalizeUploadResponse> {
        Box::pin(async move { self.handle_finalize(req) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(key: &str, size: u64) -> InitUploadRequest {
        InitUploadRequest {
            file_path: key.into(),
            file_hash: String::new(),
            file_size: size,
            chunk_size: Some(2),
        }
    }

    fn store(key: &str, id: u64, data: &[u8]) -> StoreChunkRequest {
        StoreChunkRequest {
            file_path: key.into(),
            chunk_id: id,
            chunk_data: data.to_vec(),
        }
    }

    fn finalize(key: &str) -> FinalizeUploadRequest {
        FinalizeUploadRequest {
            file_path: key.into(),
        }
    }

    #[tokio::test]
    async fn reassembles_object() {
        let s = MemoryStorage::new();
        s.init_upload(init("k", 4)).await.unwrap();
        s.store_chunk(store("k", 1, b"CD")).await.unwrap();
        s.store_chunk(store("k", 0, b"AB")).await.unwrap();
        let reply = s.finalize_upload(finalize("k")).await.unwrap();

        assert_eq!(
            reply,
            Reply::Ok(FinalizeUploadResponse {
                url: "memory://k".into()
            })
        );
        assert_eq!(s.object("k").unwrap(), b"ABCD");
    }

    #[tokio::test]
    async fn store_without_init_is_rejected() {
        let s = MemoryStorage::new();
        let reply = s.store_chunk(store("k", 0, b"AB")).await.unwrap();
        assert_eq!(reply, Reply::Err(RemoteError::new("UploadNotFound")));
    }

    #[tokio::test]
    async fn finalize_checks_size() {
        let s = MemoryStorage::new();
        s.init_upload(init("k", 4)).await.unwrap();
        s.store_chunk(store("k", 0, b"AB")).await.unwrap();
        let reply = s.finalize_upload(finalize("k")).await.unwrap();
        match reply {
            Reply::Err(e) => assert_eq!(e.tag, "NotAllChunksReceived"),
            Reply::Ok(_) => panic!("finalize should fail"),
        }
    }

    #[tokio::test]
    async fn counted_fault_expires() {
        let s = MemoryStorage::new();
        s.fail_init_times(Fault::Transport(TransportError::Timeout), 1);

        assert_eq!(
            s.init_upload(init("k", 0)).await,
            Err(TransportError::Timeout)
        );
        assert!(s.init_upload(init("k", 0)).await.is_ok());
        assert_eq!(s.calls().len(), 2);
    }

    #[tokio::test]
    async fn ack_chunk_size_is_reported() {
        let s = MemoryStorage::new().with_ack_chunk_size(8);
        let reply = s.init_upload(init("k", 0)).await.unwrap();
        assert_eq!(reply, Reply::Ok(InitUploadResponse { chunk_size: 8 }));
    }
}
