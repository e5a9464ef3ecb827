//! Error types for the SIP grammar and message model.
//!
//! Every failure of the parser is reported through [`Error`]; nothing in this
//! crate panics on untrusted input.

use thiserror::Error;

/// Result type used throughout sip-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or constructing SIP messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Generic grammar violation
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A URI did not match the sip/sips grammar
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// A header value could not be parsed with its grammar rule
    #[error("Invalid {header} header: {message}")]
    InvalidHeader {
        /// Canonical header name
        header: String,
        /// What went wrong
        message: String,
    },

    /// Status code outside 100-699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Method is not a valid token
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// A header required for the operation is absent
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Content-Length announces more bytes than were received
    #[error("Body shorter than Content-Length: expected {expected} bytes, got {actual}")]
    IncompleteBody {
        /// Announced length
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Start line or header block is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    Utf8(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidHeader`]
    pub fn invalid_header(header: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidHeader {
            header: header.into(),
            message: message.into(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::Utf8(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::Utf8(e.to_string())
    }
}

impl<E: std::fmt::Debug> From<nom::Err<E>> for Error {
    fn from(e: nom::Err<E>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Error::ParseError("incomplete input".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::ParseError(format!("{:?}", e)),
        }
    }
}
