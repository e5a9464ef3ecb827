//! SIP transport layer for the sipflow stack
//!
//! The signaling core talks to a peer through the [`Transport`] trait and
//! consumes [`TransportEvent`]s. A connected UDP transport and an
//! in-memory pair are provided.

pub mod error;
pub mod transport;

pub use error::{Error, Result};
pub use transport::memory::{MemoryEndpoint, MemoryTransport};
#[cfg(feature = "udp")]
pub use transport::udp::UdpTransport;
pub use transport::{Transport, TransportEvent};

/// Connect a UDP transport from `local` to `peer`
#[cfg(feature = "udp")]
pub async fn connect_udp(
    local: std::net::SocketAddr,
    peer: std::net::SocketAddr,
) -> Result<(UdpTransport, tokio::sync::mpsc::Receiver<TransportEvent>)> {
    UdpTransport::connect(local, peer, None).await
}

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{Error, MemoryTransport, Result, Transport, TransportEvent};
    #[cfg(feature = "udp")]
    pub use crate::{connect_udp, UdpTransport};
}
