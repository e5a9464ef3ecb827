use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{opt, recognize},
    multi::{many0, many1},
    sequence::pair,
};

use super::ParseResult;

/// WSP = SP / HTAB
pub fn wsp(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(alt((tag(b" "), tag(b"\t"))))(input)
}

/// Zero or more WSP
pub fn owsp(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(many0(wsp))(input)
}

/// CRLF, also accepting a bare LF
pub fn crlf(input: &[u8]) -> ParseResult<&[u8]> {
    alt((tag(b"\r\n"), tag(b"\n")))(input)
}

/// LWS = [*WSP CRLF] 1*WSP
pub fn lws(input: &[u8]) -> ParseResult<&[u8]> {
    alt((
        recognize(pair(pair(owsp, crlf), many1(wsp))),
        recognize(many1(wsp)),
    ))(input)
}

/// SWS = [LWS]
pub fn sws(input: &[u8]) -> ParseResult<&[u8]> {
    opt(lws)(input).map(|(rem, val)| (rem, val.unwrap_or(&[])))
}
