//! # SIP URIs
//!
//! `sip:` and `sips:` URIs as defined in RFC 3261 Section 19.1:
//!
//! ```text
//! sip:user:password@host:port;uri-parameters?headers
//! ```
//!
//! User and password are stored percent-decoded and re-escaped on output.
//! Parameter names are lower-cased, parameter values kept verbatim.
//!
//! ```rust
//! use sipflow_sip_core::types::{Host, Uri};
//! use std::str::FromStr;
//!
//! let uri = Uri::from_str("sip:alice@atlanta.example.com:5070;transport=tcp").unwrap();
//! assert_eq!(uri.user.as_deref(), Some("alice"));
//! assert_eq!(uri.host, Host::Domain("atlanta.example.com".to_string()));
//! assert_eq!(uri.port, Some(5070));
//! assert_eq!(uri.params.get("transport"), Some("tcp"));
//! assert_eq!(uri.to_string(), "sip:alice@atlanta.example.com:5070;transport=tcp");
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::param::{Param, Params};

/// URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host part of a URI or Via sent-by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Host {
    Domain(String),
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
}

impl Host {
    /// Classifies a host string; IPv6 references may carry their brackets
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return inner
                .parse::<Ipv6Addr>()
                .map(Host::IPv6)
                .map_err(|_| Error::InvalidUri(format!("Invalid IPv6 reference: {}", s)));
        }
        if s.is_empty() {
            return Err(Error::InvalidUri("Empty host".to_string()));
        }
        if s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return s
                .parse::<Ipv4Addr>()
                .map(Host::IPv4)
                .map_err(|_| Error::InvalidUri(format!("Invalid IPv4 address: {}", s)));
        }
        if s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
        {
            Ok(Host::Domain(s.to_string()))
        } else {
            Err(Error::InvalidUri(format!("Invalid host: {}", s)))
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Domain(domain) => f.write_str(domain),
            Host::IPv4(addr) => write!(f, "{}", addr),
            Host::IPv6(addr) => write!(f, "[{}]", addr),
        }
    }
}

/// A sip or sips URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    /// Decoded user part
    pub user: Option<String>,
    /// Decoded password
    pub password: Option<String>,
    pub host: Host,
    pub port: Option<u16>,
    pub params: Params,
    /// `?name=value` headers, kept raw
    pub headers: Vec<(String, String)>,
}

impl Uri {
    /// `sip:` URI for a host with nothing else set
    pub fn sip(host: Host) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            password: None,
            host,
            port: None,
            params: Params::new(),
            headers: Vec::new(),
        }
    }

    /// `sips:` URI for a host
    pub fn sips(host: Host) -> Self {
        Uri {
            scheme: Scheme::Sips,
            ..Uri::sip(host)
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// True when the URI carries the `lr` (loose routing) flag
    pub fn is_loose_router(&self) -> bool {
        self.params.contains("lr")
    }

    /// Value of the `transport` parameter
    pub fn transport(&self) -> Option<&str> {
        self.params.get("transport")
    }

    /// `host[:port]`
    pub fn host_port(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.to_string(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            f.write_str(&escape(user, is_user_unescaped))?;
            if let Some(password) = &self.password {
                write!(f, ":{}", escape(password, is_password_unescaped))?;
            }
            f.write_str("@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)?;
        for (i, (name, value)) in self.headers.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::parse_uri(s)
    }
}

/// unreserved = alphanum / mark
pub(crate) fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Characters allowed unescaped in the user part
pub(crate) fn is_user_unescaped(c: u8) -> bool {
    is_unreserved(c) || matches!(c, b'&' | b'=' | b'+' | b'$' | b',' | b';' | b'?' | b'/')
}

/// Characters allowed unescaped in the password
pub(crate) fn is_password_unescaped(c: u8) -> bool {
    is_unreserved(c) || matches!(c, b'&' | b'=' | b'+' | b'$' | b',')
}

fn escape(value: &str, allowed: fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if allowed(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
