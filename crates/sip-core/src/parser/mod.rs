//! # SIP Grammar
//!
//! nom-based parsers for the SIP grammar of RFC 3261 Section 25.
//!
//! The entry point is [`parse`], which applies a [`ParseRule`] to raw text
//! and returns a typed [`ParsedValue`]. Convenience wrappers exist for each
//! rule. Every failure is reported as an [`Error`](crate::Error); no input,
//! however malformed, makes the parser panic.
//!
//! ```rust
//! use sipflow_sip_core::parser::{parse, ParseRule, ParsedValue};
//!
//! let value = parse(b"\"Bob\" <sip:bob@biloxi.example.com>;tag=a6c85cf", ParseRule::NameAddr).unwrap();
//! match value {
//!     ParsedValue::NameAddr(addr) => assert_eq!(addr.tag(), Some("a6c85cf")),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use std::str;

use nom::{combinator::all_consuming, IResult};

use crate::error::{Error, Result};
use crate::types::address::Address;
use crate::types::cseq::CSeq;
use crate::types::message::Message;
use crate::types::uri::Uri;
use crate::types::via::Via;

pub mod address;
pub mod common;
pub mod cseq;
pub mod message;
pub mod request;
pub mod response;
pub mod separators;
pub mod uri;
pub mod utils;
pub mod via;
pub mod whitespace;

pub use message::parse_message;

/// Parser result over raw bytes
pub type ParseResult<'a, O> = IResult<&'a [u8], O>;

/// Grammar rule to apply with [`parse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRule {
    /// A complete request or response
    Message,
    /// A standalone sip/sips URI
    Uri,
    /// A name-addr or addr-spec header value with parameters
    NameAddr,
    /// One Via value
    Via,
    /// A CSeq value
    CSeq,
}

/// Result of [`parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    Message(Message),
    Uri(Uri),
    NameAddr(Address),
    Via(Via),
    CSeq(CSeq),
}

/// Parses `text` with the given rule
pub fn parse(text: &[u8], rule: ParseRule) -> Result<ParsedValue> {
    match rule {
        ParseRule::Message => parse_message(text).map(ParsedValue::Message),
        ParseRule::Uri => parse_uri(str::from_utf8(text)?).map(ParsedValue::Uri),
        ParseRule::NameAddr => parse_address(str::from_utf8(text)?).map(ParsedValue::NameAddr),
        ParseRule::Via => parse_via(str::from_utf8(text)?).map(ParsedValue::Via),
        ParseRule::CSeq => parse_cseq(str::from_utf8(text)?).map(ParsedValue::CSeq),
    }
}

/// Runs a grammar rule that must consume the whole input
pub(crate) fn complete<'a, O, F>(parser: F, input: &'a str) -> std::result::Result<O, nom::Err<nom::error::Error<&'a [u8]>>>
where
    F: FnMut(&'a [u8]) -> ParseResult<'a, O>,
{
    all_consuming(parser)(input.as_bytes()).map(|(_, value)| value)
}

/// Parses a sip or sips URI
pub fn parse_uri(text: &str) -> Result<Uri> {
    complete(uri::sip_uri, text.trim()).map_err(|_| Error::InvalidUri(text.to_string()))
}

/// Parses a name-addr / addr-spec header value
pub fn parse_address(text: &str) -> Result<Address> {
    complete(address::address, text)
        .map_err(|_| Error::ParseError(format!("Invalid address: {}", text)))
}

/// Parses a single Via value
pub fn parse_via(text: &str) -> Result<Via> {
    complete(via::via, text).map_err(|_| Error::invalid_header("Via", text))
}

/// Parses a CSeq value
pub fn parse_cseq(text: &str) -> Result<CSeq> {
    complete(cseq::cseq, text).map_err(|_| Error::invalid_header("CSeq", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        assert!(matches!(
            parse(b"sip:alice@atlanta.example.com", ParseRule::Uri),
            Ok(ParsedValue::Uri(_))
        ));
        assert!(matches!(
            parse(b"SIP/2.0/UDP host;branch=z9hG4bK1", ParseRule::Via),
            Ok(ParsedValue::Via(_))
        ));
        assert!(matches!(parse(b"2 BYE", ParseRule::CSeq), Ok(ParsedValue::CSeq(_))));

        // message bodies need not be UTF-8
        let mut message = b"OPTIONS sip:bob@biloxi.example.com SIP/2.0\r\n\
            Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
            Max-Forwards: 70\r\n\
            To: <sip:bob@biloxi.example.com>\r\n\
            From: <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
            Call-ID: a84b4c76e66710\r\n\
            CSeq: 1 OPTIONS\r\n\
            Content-Length: 2\r\n\r\n"
            .to_vec();
        message.extend_from_slice(&[0xff, 0xfe]);
        match parse(&message, ParseRule::Message) {
            Ok(ParsedValue::Message(Message::Request(request))) => {
                assert_eq!(request.body.as_ref(), &[0xff, 0xfe]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failures_are_typed() {
        assert!(matches!(parse(b"http://x", ParseRule::Uri), Err(Error::InvalidUri(_))));
        assert!(matches!(parse(&[0xff, 0xfe], ParseRule::NameAddr), Err(Error::Utf8(_))));
        assert!(matches!(parse(b"x", ParseRule::CSeq), Err(Error::InvalidHeader { .. })));
        assert!(parse(b"sip:a@b trailing", ParseRule::Uri).is_err());
    }
}
