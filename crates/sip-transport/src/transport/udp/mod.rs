use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

// Default channel capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// Largest datagram we accept
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// UDP transport connected to a single peer
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    closed: AtomicBool,
    shutdown: Notify,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl UdpTransport {
    /// Binds to `local` and connects the socket to `peer`
    pub async fn connect(
        local: SocketAddr,
        peer: SocketAddr,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let capacity = channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        info!("SIP UDP transport bound to {} for peer {}", socket.local_addr()?, peer);

        let transport = UdpTransport {
            inner: Arc::new(UdpTransportInner {
                socket: Arc::new(socket),
                peer,
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
                events_tx,
            }),
        };

        transport.spawn_receive_loop();

        Ok((transport, events_rx))
    }

    /// The locally bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    /// The connected peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    fn spawn_receive_loop(&self) {
        let transport = self.clone();

        tokio::spawn(async move {
            let inner = &transport.inner;
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                if inner.closed.load(Ordering::Relaxed) {
                    break;
                }

                tokio::select! {
                    _ = inner.shutdown.notified() => break,
                    received = inner.socket.recv(&mut buf) => match received {
                        Ok(len) => {
                            trace!("Received {} bytes from {}", len, inner.peer);
                            let data = Bytes::copy_from_slice(&buf[..len]);
                            if inner.events_tx.send(TransportEvent::MessageReceived { data }).await.is_err() {
                                debug!("Event receiver dropped, stopping UDP receive loop");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Error receiving UDP datagram: {}", e);
                            let _ = inner
                                .events_tx
                                .send(TransportEvent::Error { error: e.to_string() })
                                .await;
                        }
                    },
                }
            }

            let _ = inner.events_tx.send(TransportEvent::Closed).await;
            debug!("UDP receive loop terminated");
        });
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn send(&self, data: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        debug!("Sending {} bytes to {}", data.len(), self.inner.peer);
        let sent = self.inner.socket.send(&data).await.map_err(|e| {
            error!("UDP send to {} failed: {}", self.inner.peer, e);
            Error::SendFailed(e.to_string())
        })?;

        if sent != data.len() {
            return Err(Error::SendFailed(format!(
                "short datagram: {} of {} bytes",
                sent,
                data.len()
            )));
        }
        Ok(())
    }

    fn is_reliable(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        if !self.inner.closed.swap(true, Ordering::Relaxed) {
            self.inner.shutdown.notify_one();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.socket.local_addr() {
            Ok(addr) => write!(f, "UdpTransport({} -> {})", addr, self.inner.peer),
            Err(_) => write!(f, "UdpTransport(<error> -> {})", self.inner.peer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn pair() -> (
        (UdpTransport, mpsc::Receiver<TransportEvent>),
        (UdpTransport, mpsc::Receiver<TransportEvent>),
    ) {
        // Reserve two ports first so each side knows its peer
        let a = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let b = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let (a_addr, b_addr) = (a.local_addr().unwrap(), b.local_addr().unwrap());
        drop((a, b));

        let left = UdpTransport::connect(a_addr, b_addr, None).await.unwrap();
        let right = UdpTransport::connect(b_addr, a_addr, None).await.unwrap();
        (left, right)
    }

    #[tokio::test]
    async fn test_udp_transport_send_receive() {
        let ((left, _left_rx), (right, mut right_rx)) = pair().await;

        assert!(!left.is_reliable());
        assert_eq!(left.peer_addr(), right.local_addr().unwrap());

        let payload = Bytes::from_static(b"OPTIONS sip:x SIP/2.0\r\n\r\n");
        left.send(payload.clone()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), right_rx.recv())
            .await
            .expect("timed out waiting for datagram")
            .expect("channel closed");
        match event {
            TransportEvent::MessageReceived { data } => assert_eq!(data, payload),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_udp_transport_close() {
        let ((left, mut left_rx), _right) = pair().await;

        left.close().await.unwrap();
        assert!(left.is_closed());
        assert!(matches!(
            left.send(Bytes::from_static(b"x")).await,
            Err(Error::TransportClosed)
        ));

        let event = tokio::time::timeout(Duration::from_secs(2), left_rx.recv())
            .await
            .expect("timed out waiting for close")
            .expect("channel closed");
        assert!(matches!(event, TransportEvent::Closed));
    }
}
