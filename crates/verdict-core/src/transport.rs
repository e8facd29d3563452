//! The streaming verification call, seen from the client.
//!
//! [`VerificationTransport`] is the only seam between the session and the
//! network. The HTTP implementation lives in `verdict-http`; this module
//! ships [`ReplayTransport`] for offline replay of captured bodies, and the
//! `fakes` module has scripted transports for tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::domain::{TransportError, VerificationRequest};

/// Raw response body, delivered in whatever chunks the transport produced.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Opens the streaming verification call for a request.
///
/// Implementations must resolve to an error (not an empty stream) when the
/// backend answers with a non-success status or without a body.
#[async_trait]
pub trait VerificationTransport: Send + Sync {
    async fn open(&self, request: &VerificationRequest) -> Result<ChunkStream, TransportError>;
}

#[async_trait]
impl<T: VerificationTransport + ?Sized> VerificationTransport for Arc<T> {
    async fn open(&self, request: &VerificationRequest) -> Result<ChunkStream, TransportError> {
        (**self).open(request).await
    }
}

/// Serves a captured response body in fixed-size chunks.
///
/// Every `open` replays the same bytes from the start, ignoring the request.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    body: Bytes,
    chunk_size: usize,
}

impl ReplayTransport {
    /// `chunk_size` of zero is treated as one byte per chunk.
    pub fn new(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            body: body.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunks(&self) -> Vec<Bytes> {
        let mut out = Vec::with_capacity(self.body.len() / self.chunk_size + 1);
        let mut offset = 0;
        while offset < self.body.len() {
            let end = (offset + self.chunk_size).min(self.body.len());
            out.push(self.body.slice(offset..end));
            offset = end;
        }
        out
    }
}

#[async_trait]
impl VerificationTransport for ReplayTransport {
    async fn open(&self, _request: &VerificationRequest) -> Result<ChunkStream, TransportError> {
        Ok(stream::iter(self.chunks().into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replay_splits_body_into_chunks() {
        let transport = ReplayTransport::new(&b"[{\"a\":1}]"[..], 4);
        let chunks: Vec<_> = transport
            .open(&VerificationRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        let sizes: Vec<_> = chunks.iter().map(|c| c.as_ref().unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
    }

    #[test]
    fn zero_chunk_size_means_single_bytes() {
        let transport = ReplayTransport::new(&b"abc"[..], 0);
        assert_eq!(transport.chunks().len(), 3);
    }

    #[tokio::test]
    async fn replay_can_be_opened_repeatedly() {
        let transport = Arc::new(ReplayTransport::new(&b"{}"[..], 1));
        for _ in 0..2 {
            let n = transport
                .open(&VerificationRequest::default())
                .await
                .unwrap()
                .count()
                .await;
            assert_eq!(n, 2);
        }
    }
}
