// Separator rules from RFC 3261 Section 25.1; each swallows the optional
// whitespace the grammar allows around it.

use nom::{
    bytes::complete::tag,
    combinator::recognize,
    sequence::{pair, tuple},
};

use super::whitespace::sws;
use super::ParseResult;

/// HCOLON = *( SP / HTAB ) ":" SWS
pub fn hcolon(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((super::whitespace::owsp, tag(b":"), sws)))(input)
}

pub fn slash(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b"/"), sws)))(input)
}

pub fn equal(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b"="), sws)))(input)
}

pub fn comma(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b","), sws)))(input)
}

pub fn semi(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b";"), sws)))(input)
}

pub fn colon(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, tag(b":"), sws)))(input)
}

/// LAQUOT = SWS "<"
pub fn laquot(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(pair(sws, tag(b"<")))(input)
}

/// RAQUOT = ">" SWS
pub fn raquot(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(pair(tag(b">"), sws))(input)
}
