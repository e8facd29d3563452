//! In-memory collaborators (testing only)
//!
//! `ChannelTransport`, `FailingTransport` and `MemoryResultStore` satisfy the
//! collaborator traits without any network, and let a test decide exactly
//! when each chunk arrives and when a save completes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::domain::{StoreError, TransportError, VerificationRequest};
use crate::store::{ResultStore, SaveAck, SaveRecord};
use crate::transport::{ChunkStream, VerificationTransport};

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// Test-side handle feeding one scripted response body.
///
/// Dropping the feed ends the stream.
#[derive(Debug, Clone)]
pub struct ChunkFeed {
    tx: mpsc::UnboundedSender<Result<Bytes, TransportError>>,
}

impl ChunkFeed {
    pub fn send(&self, chunk: impl AsRef<[u8]>) {
        let _ = self
            .tx
            .unbounded_send(Ok(Bytes::copy_from_slice(chunk.as_ref())));
    }

    pub fn send_error(&self, error: TransportError) {
        let _ = self.tx.unbounded_send(Err(error));
    }

    /// End the stream now, even if clones of this feed are still alive.
    pub fn close(&self) {
        self.tx.close_channel();
    }
}

/// Transport whose bodies are pushed by the test, one queued body per
/// `open` call.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    queued: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<Bytes, TransportError>>>>,
    opened: Mutex<Vec<VerificationRequest>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a body for the next `open` and return its feed.
    pub fn prepare(&self) -> ChunkFeed {
        let (tx, rx) = mpsc::unbounded();
        self.queued.lock().unwrap().push_back(rx);
        ChunkFeed { tx }
    }

    /// How many times the call was opened.
    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn opened_requests(&self) -> Vec<VerificationRequest> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationTransport for ChannelTransport {
    async fn open(&self, request: &VerificationRequest) -> Result<ChunkStream, TransportError> {
        self.opened.lock().unwrap().push(request.clone());
        let rx = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Request("no scripted response queued".into()))?;
        Ok(rx.boxed())
    }
}

// ---------------------------------------------------------------------------
// FailingTransport
// ---------------------------------------------------------------------------

/// Transport that refuses every call with the same error.
#[derive(Debug, Clone)]
pub struct FailingTransport {
    error: TransportError,
}

impl FailingTransport {
    pub fn new(error: TransportError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl VerificationTransport for FailingTransport {
    async fn open(&self, _request: &VerificationRequest) -> Result<ChunkStream, TransportError> {
        Err(self.error.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryResultStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Outcome {
    Accept,
    Fail(StoreError),
    Reject(String),
}

/// Lets a test hold saves in flight until it releases them.
#[derive(Debug, Clone)]
pub struct SaveGate {
    permits: Arc<Semaphore>,
}

impl SaveGate {
    /// Allow one pending (or future) save to complete.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

/// Records every save call.
#[derive(Debug)]
pub struct MemoryResultStore {
    saved: Mutex<Vec<SaveRecord>>,
    outcome: Outcome,
    gate: Option<Arc<Semaphore>>,
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            outcome: Outcome::Accept,
            gate: None,
        }
    }
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every save fails with `error`.
    pub fn failing(error: StoreError) -> Self {
        Self {
            outcome: Outcome::Fail(error),
            ..Self::default()
        }
    }

    /// Every save gets an `error` acknowledgement carrying `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Reject(message.into()),
            ..Self::default()
        }
    }

    /// Saves block until the returned gate releases them.
    pub fn gated() -> (Self, SaveGate) {
        let permits = Arc::new(Semaphore::new(0));
        let store = Self {
            gate: Some(permits.clone()),
            ..Self::default()
        };
        (store, SaveGate { permits })
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn saved(&self) -> Vec<SaveRecord> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save(&self, record: &SaveRecord) -> Result<SaveAck, StoreError> {
        self.saved.lock().unwrap().push(record.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| StoreError::Request(e.to_string()))?
                .forget();
        }

        match &self.outcome {
            Outcome::Accept => Ok(SaveAck::success("Results stored successfully")),
            Outcome::Fail(e) => Err(e.clone()),
            Outcome::Reject(message) => Ok(SaveAck {
                status: crate::store::AckStatus::Error,
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_streams_what_the_test_sends() {
        let transport = ChannelTransport::new();
        let feed = transport.prepare();
        feed.send("ab");
        feed.send(b"cd");
        drop(feed);

        let chunks: Vec<_> = transport
            .open(&VerificationRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn channel_transport_without_queued_body_errors() {
        let transport = ChannelTransport::new();
        let err = transport
            .open(&VerificationRequest::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[tokio::test]
    async fn gated_store_waits_for_release() {
        let (store, gate) = MemoryResultStore::gated();
        let store = Arc::new(store);
        let record = SaveRecord {
            perturbation_data: VerificationRequest::default(),
            verification_results: Vec::new(),
        };

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.save(&record).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(store.save_count(), 1);
        assert!(!task.is_finished());

        gate.release();
        assert!(task.await.unwrap().is_ok());
    }
}
