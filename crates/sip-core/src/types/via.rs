//! # Via header values
//!
//! ```text
//! Via: SIP/2.0/UDP pc33.atlanta.example.com:5060;branch=z9hG4bK776asdhds;rport
//! ```
//!
//! The top Via's `branch` and sent-by identify a transaction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::param::Params;
use crate::types::uri::Host;

/// Branch prefix marking RFC 3261 compliant transaction ids
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// A single Via entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Via {
    /// Protocol version, normally `2.0`
    pub version: String,
    /// Transport token (`UDP`, `TCP`, `TLS`, `WS`...)
    pub transport: String,
    pub host: Host,
    pub port: Option<u16>,
    pub params: Params,
}

impl Via {
    /// `SIP/2.0/<transport> host[:port];branch=<branch>`
    pub fn new(transport: impl Into<String>, host: Host, port: Option<u16>, branch: &str) -> Self {
        let mut params = Params::new();
        params.set("branch", Some(branch));
        Via {
            version: "2.0".to_string(),
            transport: transport.into().to_ascii_uppercase(),
            host,
            port,
            params,
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch")
    }

    pub fn set_branch(&mut self, branch: &str) {
        self.params.set("branch", Some(branch));
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get("received")
    }

    /// `host[:port]` as written in the header
    pub fn sent_by(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.to_string(),
        }
    }

    /// True when the branch carries the RFC 3261 magic cookie
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch()
            .map(|b| b.starts_with(BRANCH_MAGIC_COOKIE))
            .unwrap_or(false)
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{}/{} {}", self.version, self.transport, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)
    }
}

impl FromStr for Via {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::parse_via(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_via() {
        let via = Via::new(
            "udp",
            Host::Domain("pc33.atlanta.example.com".to_string()),
            Some(5060),
            "z9hG4bK776asdhds",
        );
        assert_eq!(
            via.to_string(),
            "SIP/2.0/UDP pc33.atlanta.example.com:5060;branch=z9hG4bK776asdhds"
        );
        assert_eq!(via.sent_by(), "pc33.atlanta.example.com:5060");
        assert!(via.has_rfc3261_branch());
    }

    #[test]
    fn test_set_branch() {
        let mut via = Via::new("TCP", Host::IPv4("192.0.2.1".parse().unwrap()), None, "old");
        assert!(!via.has_rfc3261_branch());
        via.set_branch("z9hG4bKnew");
        assert_eq!(via.branch(), Some("z9hG4bKnew"));
        assert_eq!(via.sent_by(), "192.0.2.1");
    }
}
