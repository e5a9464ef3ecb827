//! # SIP Methods
//!
//! Request methods from RFC 3261 and the common extensions (PRACK, SUBSCRIBE,
//! NOTIFY, REFER, INFO, UPDATE, MESSAGE, PUBLISH). Anything else that is a
//! valid token is kept as [`Method::Extension`].
//!
//! Method names are case-sensitive on the wire: `invite` is an extension
//! method, not INVITE.
//!
//! ```rust
//! use sipflow_sip_core::types::Method;
//! use std::str::FromStr;
//!
//! assert_eq!(Method::from_str("INVITE").unwrap(), Method::Invite);
//! assert_eq!(Method::Bye.as_str(), "BYE");
//! assert_eq!(Method::from_str("FOO").unwrap(), Method::Extension("FOO".to_string()));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::common::is_token_char;

/// A SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Prack,
    Subscribe,
    Notify,
    Refer,
    Info,
    Update,
    Message,
    Publish,
    /// Any other token
    Extension(String),
}

impl Method {
    /// Wire representation of the method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Refer => "REFER",
            Method::Info => "INFO",
            Method::Update => "UPDATE",
            Method::Message => "MESSAGE",
            Method::Publish => "PUBLISH",
            Method::Extension(name) => name,
        }
    }

    /// True for INVITE, whose transactions follow the INVITE state machines
    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "REGISTER" => Method::Register,
            "OPTIONS" => Method::Options,
            "PRACK" => Method::Prack,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "REFER" => Method::Refer,
            "INFO" => Method::Info,
            "UPDATE" => Method::Update,
            "MESSAGE" => Method::Message,
            "PUBLISH" => Method::Publish,
            other => {
                if other.is_empty() || !other.bytes().all(is_token_char) {
                    return Err(Error::InvalidMethod(other.to_string()));
                }
                Method::Extension(other.to_string())
            }
        };
        Ok(method)
    }
}
