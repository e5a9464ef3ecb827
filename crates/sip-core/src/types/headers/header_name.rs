use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::common::is_token_char;

/// SIP header field names
///
/// Matching is case-insensitive and compact forms (`v`, `f`, `t`, `i`, ...)
/// resolve to the full name. Unknown names are kept in [`HeaderName::Other`]
/// with their original spelling and compare case-insensitively.
///
/// # Examples
///
/// ```rust
/// use sipflow_sip_core::types::HeaderName;
/// use std::str::FromStr;
///
/// assert_eq!(HeaderName::from_str("f").unwrap(), HeaderName::From);
/// assert_eq!(HeaderName::from_str("call-id").unwrap(), HeaderName::CallId);
/// assert_eq!(HeaderName::CallId.as_str(), "Call-ID");
/// assert_eq!(
///     HeaderName::from_str("X-Custom").unwrap(),
///     HeaderName::Other("x-custom".to_string())
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HeaderName {
    Via,
    From,
    To,
    CallId,
    CSeq,
    Contact,
    MaxForwards,
    ContentLength,
    ContentType,
    ContentEncoding,
    Route,
    RecordRoute,
    UserAgent,
    Server,
    Allow,
    AllowEvents,
    Supported,
    Require,
    ProxyRequire,
    Unsupported,
    Accept,
    Expires,
    Subject,
    Event,
    ReferTo,
    Reason,
    RSeq,
    RAck,
    /// Any other header
    Other(String),
}

impl HeaderName {
    /// Canonical spelling
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Via => "Via",
            HeaderName::From => "From",
            HeaderName::To => "To",
            HeaderName::CallId => "Call-ID",
            HeaderName::CSeq => "CSeq",
            HeaderName::Contact => "Contact",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentEncoding => "Content-Encoding",
            HeaderName::Route => "Route",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Server => "Server",
            HeaderName::Allow => "Allow",
            HeaderName::AllowEvents => "Allow-Events",
            HeaderName::Supported => "Supported",
            HeaderName::Require => "Require",
            HeaderName::ProxyRequire => "Proxy-Require",
            HeaderName::Unsupported => "Unsupported",
            HeaderName::Accept => "Accept",
            HeaderName::Expires => "Expires",
            HeaderName::Subject => "Subject",
            HeaderName::Event => "Event",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::Reason => "Reason",
            HeaderName::RSeq => "RSeq",
            HeaderName::RAck => "RAck",
            HeaderName::Other(name) => name,
        }
    }

    /// Headers whose comma-separated values are distinct list elements
    pub fn is_list_header(&self) -> bool {
        matches!(
            self,
            HeaderName::Via
                | HeaderName::Route
                | HeaderName::RecordRoute
                | HeaderName::Contact
                | HeaderName::Allow
                | HeaderName::AllowEvents
                | HeaderName::Supported
                | HeaderName::Require
                | HeaderName::ProxyRequire
                | HeaderName::Unsupported
                | HeaderName::Accept
        )
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HeaderName::Other(a), HeaderName::Other(b)) => a.eq_ignore_ascii_case(b),
            (HeaderName::Other(_), _) | (_, HeaderName::Other(_)) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for HeaderName {}

impl Hash for HeaderName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            HeaderName::Other(name) => {
                for b in name.bytes() {
                    state.write_u8(b.to_ascii_lowercase());
                }
            }
            known => std::mem::discriminant(known).hash(state),
        }
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(is_token_char) {
            return Err(Error::ParseError(format!("Invalid header name: {:?}", s)));
        }
        let lower = s.to_ascii_lowercase();
        let name = match lower.as_str() {
            "via" | "v" => HeaderName::Via,
            "from" | "f" => HeaderName::From,
            "to" | "t" => HeaderName::To,
            "call-id" | "i" => HeaderName::CallId,
            "cseq" => HeaderName::CSeq,
            "contact" | "m" => HeaderName::Contact,
            "max-forwards" => HeaderName::MaxForwards,
            "content-length" | "l" => HeaderName::ContentLength,
            "content-type" | "c" => HeaderName::ContentType,
            "content-encoding" | "e" => HeaderName::ContentEncoding,
            "route" => HeaderName::Route,
            "record-route" => HeaderName::RecordRoute,
            "user-agent" => HeaderName::UserAgent,
            "server" => HeaderName::Server,
            "allow" => HeaderName::Allow,
            "allow-events" | "u" => HeaderName::AllowEvents,
            "supported" | "k" => HeaderName::Supported,
            "require" => HeaderName::Require,
            "proxy-require" => HeaderName::ProxyRequire,
            "unsupported" => HeaderName::Unsupported,
            "accept" => HeaderName::Accept,
            "expires" => HeaderName::Expires,
            "subject" | "s" => HeaderName::Subject,
            "event" | "o" => HeaderName::Event,
            "refer-to" | "r" => HeaderName::ReferTo,
            "reason" => HeaderName::Reason,
            "rseq" => HeaderName::RSeq,
            "rack" => HeaderName::RAck,
            _ => HeaderName::Other(s.to_string()),
        };
        Ok(name)
    }
}
