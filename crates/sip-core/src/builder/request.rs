use bytes::Bytes;

use crate::types::address::Address;
use crate::types::cseq::CSeq;
use crate::types::headers::HeaderName;
use crate::types::method::Method;
use crate::types::sip_request::Request;
use crate::types::uri::Uri;
use crate::types::via::Via;

/// Fluent construction of outgoing requests
///
/// ```rust
/// use sipflow_sip_core::builder::SimpleRequestBuilder;
/// use sipflow_sip_core::types::{HeaderAccess, Method};
///
/// let request = SimpleRequestBuilder::new(Method::Invite, "sip:bob@biloxi.example.com")
///     .unwrap()
///     .from("Alice", "sip:alice@atlanta.example.com", Some("1928301774"))
///     .unwrap()
///     .to("Bob", "sip:bob@biloxi.example.com", None)
///     .unwrap()
///     .call_id("a84b4c76e66710")
///     .cseq(314159)
///     .max_forwards(70)
///     .build();
///
/// assert_eq!(request.cseq().unwrap().seq, 314159);
/// assert_eq!(request.from_tag().as_deref(), Some("1928301774"));
/// ```
#[derive(Debug, Clone)]
pub struct SimpleRequestBuilder {
    request: Request,
}

impl SimpleRequestBuilder {
    /// Starts a request; fails when `uri` is not a valid sip/sips URI
    pub fn new(method: Method, uri: &str) -> crate::Result<Self> {
        let uri: Uri = uri.parse()?;
        Ok(Self::with_uri(method, uri))
    }

    pub fn with_uri(method: Method, uri: Uri) -> Self {
        SimpleRequestBuilder {
            request: Request::new(method, uri),
        }
    }

    /// From header; `display_name` may be empty
    pub fn from(self, display_name: &str, uri: &str, tag: Option<&str>) -> crate::Result<Self> {
        let address = make_address(display_name, uri, tag)?;
        Ok(self.from_address(address))
    }

    pub fn from_address(mut self, address: Address) -> Self {
        self.request.headers.set(HeaderName::From, address.to_string());
        self
    }

    /// To header; `display_name` may be empty
    pub fn to(self, display_name: &str, uri: &str, tag: Option<&str>) -> crate::Result<Self> {
        let address = make_address(display_name, uri, tag)?;
        Ok(self.to_address(address))
    }

    pub fn to_address(mut self, address: Address) -> Self {
        self.request.headers.set(HeaderName::To, address.to_string());
        self
    }

    pub fn call_id(mut self, call_id: &str) -> Self {
        self.request.headers.set(HeaderName::CallId, call_id);
        self
    }

    /// CSeq with the request's own method
    pub fn cseq(mut self, seq: u32) -> Self {
        let cseq = CSeq::new(seq, self.request.method.clone());
        self.request.headers.set(HeaderName::CSeq, cseq.to_string());
        self
    }

    /// Adds a Via below any existing ones
    pub fn via(mut self, via: Via) -> Self {
        self.request.headers.push(HeaderName::Via, via.to_string());
        self
    }

    pub fn contact(mut self, uri: Uri) -> Self {
        self.request
            .headers
            .set(HeaderName::Contact, Address::new(uri).to_string());
        self
    }

    pub fn route(mut self, uri: Uri) -> Self {
        self.request
            .headers
            .push(HeaderName::Route, Address::new(uri).to_string());
        self
    }

    pub fn max_forwards(mut self, hops: u32) -> Self {
        self.request
            .headers
            .set(HeaderName::MaxForwards, hops.to_string());
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.request.headers.push(name, value);
        self
    }

    pub fn body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.request = self.request.with_body(content_type, body);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

fn make_address(display_name: &str, uri: &str, tag: Option<&str>) -> crate::Result<Address> {
    let mut address = Address::new(uri.parse()?);
    if !display_name.is_empty() {
        address.display_name = Some(display_name.to_string());
    }
    if let Some(tag) = tag {
        address.set_tag(tag);
    }
    Ok(address)
}
