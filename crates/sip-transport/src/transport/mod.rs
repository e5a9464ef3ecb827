//! The transport contract used by the signaling core.

pub mod memory;
#[cfg(feature = "udp")]
pub mod udp;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use sipflow_sip_core::Message;

use crate::error::Result;

/// Events delivered by a transport to its owner
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Raw wire text of one inbound message
    MessageReceived { data: Bytes },
    /// A non-fatal receive error
    Error { error: String },
    /// The transport has shut down; no further events follow
    Closed,
}

/// A message channel to one peer
///
/// The core only needs to push wire text and to know whether delivery is
/// reliable, which decides the retransmission timers it arms.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends one message worth of wire text
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Serializes and sends a message
    async fn send_message(&self, message: &Message) -> Result<()> {
        self.send(message.to_bytes()).await
    }

    /// True for stream or otherwise reliable transports (TCP, TLS, WS)
    fn is_reliable(&self) -> bool;

    /// Closes the transport
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
