use crate::error::{Error, Result};
use crate::parser;
use crate::types::address::Address;
use crate::types::cseq::CSeq;
use crate::types::via::Via;

use super::collection::Headers;
use super::header_name::HeaderName;

/// Typed access to the headers of a request or response
///
/// Values are stored as text and parsed on access. Messages coming out of
/// the parser have already had their mandatory headers validated, so for
/// those the `Result` accessors only fail on programmatic misuse.
pub trait HeaderAccess {
    fn headers(&self) -> &Headers;

    fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers().get(name)
    }

    fn has_header(&self, name: &HeaderName) -> bool {
        self.headers().contains(name)
    }

    fn call_id(&self) -> Option<&str> {
        self.headers().get(&HeaderName::CallId)
    }

    fn cseq(&self) -> Result<CSeq> {
        let raw = required(self.headers(), HeaderName::CSeq)?;
        parser::parse_cseq(raw)
    }

    /// Topmost Via
    fn top_via(&self) -> Result<Via> {
        let raw = required(self.headers(), HeaderName::Via)?;
        parser::parse_via(raw)
    }

    fn vias(&self) -> Result<Vec<Via>> {
        self.headers()
            .get_all(&HeaderName::Via)
            .map(parser::parse_via)
            .collect()
    }

    fn from_address(&self) -> Result<Address> {
        let raw = required(self.headers(), HeaderName::From)?;
        parser::parse_address(raw)
    }

    fn to_address(&self) -> Result<Address> {
        let raw = required(self.headers(), HeaderName::To)?;
        parser::parse_address(raw)
    }

    fn from_tag(&self) -> Option<String> {
        self.from_address().ok()?.tag().map(str::to_string)
    }

    fn to_tag(&self) -> Option<String> {
        self.to_address().ok()?.tag().map(str::to_string)
    }

    /// First Contact, `None` when absent, `*`, or unparsable
    fn contact(&self) -> Option<Address> {
        let raw = self.headers().get(&HeaderName::Contact)?;
        if raw.trim() == "*" {
            return None;
        }
        parser::parse_address(raw).ok()
    }

    fn routes(&self) -> Result<Vec<Address>> {
        self.headers()
            .get_all(&HeaderName::Route)
            .map(parser::parse_address)
            .collect()
    }

    fn record_routes(&self) -> Result<Vec<Address>> {
        self.headers()
            .get_all(&HeaderName::RecordRoute)
            .map(parser::parse_address)
            .collect()
    }

    fn content_type(&self) -> Option<&str> {
        self.headers().get(&HeaderName::ContentType)
    }

    fn max_forwards(&self) -> Option<u32> {
        self.headers()
            .get(&HeaderName::MaxForwards)
            .and_then(|v| v.trim().parse().ok())
    }
}

fn required(headers: &Headers, name: HeaderName) -> Result<&str> {
    headers
        .get(&name)
        .ok_or_else(|| Error::MissingHeader(name.to_string()))
}

impl HeaderAccess for Headers {
    fn headers(&self) -> &Headers {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut headers = Headers::new();
        headers.push(HeaderName::Via, "SIP/2.0/UDP host.example.com;branch=z9hG4bKabc");
        headers.push(HeaderName::From, "Alice <sip:alice@atlanta.example.com>;tag=1928301774");
        headers.push(HeaderName::To, "<sip:bob@biloxi.example.com>");
        headers.push(HeaderName::CSeq, "7 BYE");
        headers.push(HeaderName::Contact, "*");

        assert_eq!(headers.top_via().unwrap().branch(), Some("z9hG4bKabc"));
        assert_eq!(headers.from_tag().as_deref(), Some("1928301774"));
        assert_eq!(headers.to_tag(), None);
        assert_eq!(headers.cseq().unwrap().seq, 7);
        assert!(headers.contact().is_none());
        assert!(headers.routes().unwrap().is_empty());
    }

    #[test]
    fn test_missing_header() {
        let headers = Headers::new();
        assert_eq!(headers.cseq(), Err(Error::MissingHeader("CSeq".to_string())));
        assert!(headers.call_id().is_none());
    }
}
