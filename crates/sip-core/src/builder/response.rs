use bytes::Bytes;

use crate::types::address::Address;
use crate::types::headers::{HeaderAccess, HeaderName};
use crate::types::sip_request::Request;
use crate::types::sip_response::Response;
use crate::types::status::StatusCode;
use crate::types::uri::Uri;

/// Fluent construction of responses, usually starting from the request
/// being answered.
#[derive(Debug, Clone)]
pub struct SimpleResponseBuilder {
    response: Response,
}

impl SimpleResponseBuilder {
    pub fn new(status: StatusCode, reason: Option<&str>) -> Self {
        let mut response = Response::new(status);
        if let Some(reason) = reason {
            response.reason = reason.to_string();
        }
        SimpleResponseBuilder { response }
    }

    /// Copies Via, From, To, Call-ID and CSeq from the request
    pub fn response_from_request(request: &Request, status: StatusCode, reason: Option<&str>) -> Self {
        let mut response = Response::from_request(request, status);
        if let Some(reason) = reason {
            response.reason = reason.to_string();
        }
        SimpleResponseBuilder { response }
    }

    /// Sets the To tag unless one is already present
    pub fn to_tag(mut self, tag: &str) -> Self {
        if let Ok(mut to) = self.response.to_address() {
            if to.tag().is_none() {
                to.set_tag(tag);
                self.response.headers.set(HeaderName::To, to.to_string());
            }
        }
        self
    }

    pub fn contact(mut self, uri: Uri) -> Self {
        self.response
            .headers
            .set(HeaderName::Contact, Address::new(uri).to_string());
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.response.headers.push(name, value);
        self
    }

    pub fn body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.response = self.response.with_body(content_type, body);
        self
    }

    pub fn build(self) -> Response {
        self.response
    }
}
