use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by transports
#[derive(Debug, Error)]
pub enum Error {
    /// The transport was closed before or during the operation
    #[error("Transport closed")]
    TransportClosed,

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be handed to the peer
    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl Error {
    /// True when retrying on the same transport cannot succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TransportClosed)
    }
}
