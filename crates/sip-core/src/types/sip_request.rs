//! # SIP Request
//!
//! A request is a method, a Request-URI, the protocol version, an ordered
//! header collection and an opaque body.
//!
//! ```text
//! INVITE sip:bob@biloxi.example.com SIP/2.0
//! Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds
//! Max-Forwards: 70
//! To: Bob <sip:bob@biloxi.example.com>
//! From: Alice <sip:alice@atlanta.example.com>;tag=1928301774
//! Call-ID: a84b4c76e66710@pc33.atlanta.example.com
//! CSeq: 314159 INVITE
//! Contact: <sip:alice@pc33.atlanta.example.com>
//! Content-Length: 0
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::headers::{HeaderAccess, HeaderName, Headers};
use crate::types::method::Method;
use crate::types::uri::Uri;
use crate::types::version::Version;

/// A SIP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body
    pub fn new(method: Method, uri: Uri) -> Self {
        Request {
            method,
            uri,
            version: Version::sip_2_0(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Appends a header value
    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Sets the body together with its Content-Type
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.headers.set(HeaderName::ContentType, content_type);
        self.body = body.into();
        self
    }

    /// Wire form; Content-Length always reflects the actual body
    pub fn to_bytes(&self) -> Bytes {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        write_headers_and_body(&mut out, &self.headers, &self.body);
        Bytes::from(out)
    }
}

impl HeaderAccess for Request {
    fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// Serializes the header block, rewriting Content-Length in place (or
/// appending it), followed by the blank line and body.
pub(crate) fn write_headers_and_body(out: &mut Vec<u8>, headers: &Headers, body: &[u8]) {
    let mut wrote_length = false;
    for (name, value) in headers.iter() {
        if *name == HeaderName::ContentLength {
            if wrote_length {
                continue;
            }
            wrote_length = true;
            out.extend_from_slice(format!("{}: {}\r\n", name, body.len()).as_bytes());
        } else {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
    }
    if !wrote_length {
        out.extend_from_slice(format!("{}: {}\r\n", HeaderName::ContentLength, body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::uri::Host;

    #[test]
    fn test_serialization_sets_content_length() {
        let uri = Uri::sip(Host::Domain("biloxi.example.com".to_string())).with_user("bob");
        let request = Request::new(Method::Message, uri)
            .with_header(HeaderName::ContentLength, "999")
            .with_body("text/plain", "hello");
        let text = request.to_string();
        assert!(text.starts_with("MESSAGE sip:bob@biloxi.example.com SIP/2.0\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(!text.contains("999"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_content_length_appended_when_absent() {
        let uri = Uri::sip(Host::Domain("example.com".to_string()));
        let text = Request::new(Method::Options, uri).to_string();
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }
}
