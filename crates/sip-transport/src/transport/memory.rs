//! In-process transport pair.
//!
//! Each endpoint delivers what it sends to the other endpoint's event
//! channel. Reliability is a flag so both timer regimes can be driven
//! without sockets.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// One endpoint of an in-memory transport pair
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryTransportInner>,
}

struct MemoryTransportInner {
    name: &'static str,
    reliable: bool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    sent: AtomicUsize,
    own_tx: mpsc::Sender<TransportEvent>,
    peer_tx: mpsc::Sender<TransportEvent>,
}

/// An endpoint together with the receiver for its inbound events
pub type MemoryEndpoint = (MemoryTransport, mpsc::Receiver<TransportEvent>);

impl MemoryTransport {
    /// Creates two connected endpoints
    pub fn pair(reliable: bool) -> (MemoryEndpoint, MemoryEndpoint) {
        let (a_tx, a_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let a = MemoryTransport::new("a", reliable, a_tx.clone(), b_tx.clone());
        let b = MemoryTransport::new("b", reliable, b_tx, a_tx);

        ((a, a_rx), (b, b_rx))
    }

    fn new(
        name: &'static str,
        reliable: bool,
        own_tx: mpsc::Sender<TransportEvent>,
        peer_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        MemoryTransport {
            inner: Arc::new(MemoryTransportInner {
                name,
                reliable,
                closed: AtomicBool::new(false),
                fail_sends: AtomicBool::new(false),
                sent: AtomicUsize::new(0),
                own_tx,
                peer_tx,
            }),
        }
    }

    /// Makes every following send fail until switched off again
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Number of messages successfully handed to the peer
    pub fn sent_count(&self) -> usize {
        self.inner.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, data: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }
        if self.inner.fail_sends.load(Ordering::Relaxed) {
            debug!("memory transport {} rejecting send", self.inner.name);
            return Err(Error::SendFailed("send failure injected".to_string()));
        }

        trace!("memory transport {} sending {} bytes", self.inner.name, data.len());
        self.inner
            .peer_tx
            .send(TransportEvent::MessageReceived { data })
            .await
            .map_err(|_| Error::SendFailed("peer endpoint dropped".to_string()))?;
        self.inner.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_reliable(&self) -> bool {
        self.inner.reliable
    }

    async fn close(&self) -> Result<()> {
        if !self.inner.closed.swap(true, Ordering::Relaxed) {
            let _ = self.inner.own_tx.send(TransportEvent::Closed).await;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.inner.name)
            .field("reliable", &self.inner.reliable)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_to_peer() {
        let ((a, _a_rx), (b, mut b_rx)) = MemoryTransport::pair(false);
        assert!(!a.is_reliable());
        assert!(!b.is_reliable());

        a.send(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(a.sent_count(), 1);

        match b_rx.recv().await {
            Some(TransportEvent::MessageReceived { data }) => assert_eq!(&data[..], b"hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let ((a, _a_rx), (_b, mut b_rx)) = MemoryTransport::pair(true);
        a.fail_sends(true);

        let err = a.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, Error::SendFailed(_)));
        assert!(!err.is_fatal());
        assert!(b_rx.try_recv().is_err());

        a.fail_sends(false);
        a.send(Bytes::from_static(b"y")).await.unwrap();
        assert!(b_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_close_emits_closed_once() {
        let ((a, mut a_rx), _b) = MemoryTransport::pair(true);
        a.close().await.unwrap();
        a.close().await.unwrap();

        assert!(a.is_closed());
        assert!(matches!(a_rx.try_recv(), Ok(TransportEvent::Closed)));
        assert!(a_rx.try_recv().is_err());
        assert!(matches!(
            a.send(Bytes::new()).await,
            Err(Error::TransportClosed)
        ));
    }
}
