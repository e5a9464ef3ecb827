//! # sipflow-sip-core
//!
//! SIP grammar and message model.
//!
//! - [`parser`]: nom-based parsers turning wire text into typed values
//! - [`types`]: requests, responses, URIs, header values and the ordered
//!   header collection
//! - [`builder`]: fluent construction of outgoing messages
//!
//! ```rust
//! use sipflow_sip_core::prelude::*;
//!
//! let text = "BYE sip:alice@pc33.atlanta.example.com SIP/2.0\r\n\
//!     Via: SIP/2.0/UDP 192.0.2.4;branch=z9hG4bKnashds10\r\n\
//!     Max-Forwards: 70\r\n\
//!     From: Bob <sip:bob@biloxi.example.com>;tag=a6c85cf\r\n\
//!     To: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
//!     Call-ID: a84b4c76e66710\r\n\
//!     CSeq: 231 BYE\r\n\
//!     Content-Length: 0\r\n\r\n";
//!
//! let message = Message::parse(text.as_bytes()).unwrap();
//! assert_eq!(message.cseq().unwrap(), CSeq::new(231, Method::Bye));
//! assert_eq!(message.to_tag().as_deref(), Some("1928301774"));
//! ```

pub mod builder;
pub mod error;
pub mod parser;
pub mod prelude;
pub mod types;

pub use error::{Error, Result};
pub use parser::{parse, parse_message, ParseRule, ParsedValue};
pub use types::{
    Address, CSeq, HeaderAccess, HeaderName, Headers, Host, Message, Method, Param, Params,
    Request, Response, Scheme, StatusCode, Uri, Version, Via, BRANCH_MAGIC_COOKIE,
};
