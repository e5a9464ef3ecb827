use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::headers::{HeaderAccess, HeaderName, Headers};
use crate::types::sip_request::{write_headers_and_body, Request};
use crate::types::status::StatusCode;
use crate::types::version::Version;

/// A SIP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    /// Response with the default reason phrase and no headers
    pub fn new(status: StatusCode) -> Self {
        Response {
            version: Version::sip_2_0(),
            status,
            reason: status.reason_phrase().to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Response to `request` carrying its Via values (in order), From, To,
    /// Call-ID and CSeq, as required by RFC 3261 Section 8.2.6.2.
    pub fn from_request(request: &Request, status: StatusCode) -> Self {
        let mut response = Response::new(status);
        for name in [
            HeaderName::Via,
            HeaderName::From,
            HeaderName::To,
            HeaderName::CallId,
            HeaderName::CSeq,
        ] {
            for value in request.headers.get_all(&name) {
                response.headers.push(name.clone(), value);
            }
        }
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.headers.set(HeaderName::ContentType, content_type);
        self.body = body.into();
        self
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = format!("{} {} {}\r\n", self.version, self.status, self.reason).into_bytes();
        write_headers_and_body(&mut out, &self.headers, &self.body);
        Bytes::from(out)
    }
}

impl HeaderAccess for Response {
    fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
