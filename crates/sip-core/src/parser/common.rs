use std::str::{self, FromStr};

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::digit1,
    combinator::{map, map_res, opt, recognize},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{pair, preceded, tuple},
};

use crate::error::{Error, Result};
use crate::types::param::{Param, Params};
use crate::types::version::Version;

use super::separators::{equal, semi};
use super::whitespace::sws;
use super::ParseResult;

/// token characters: alphanum / "-" / "." / "!" / "%" / "*" / "_" / "+" / "`" / "'" / "~"
pub fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'-' | b'.' | b'!' | b'%' | b'*' | b'_' | b'+' | b'`' | b'\'' | b'~'
        )
}

pub fn token(input: &[u8]) -> ParseResult<&[u8]> {
    take_while1(is_token_char)(input)
}

/// quoted-string = SWS DQUOTE *(qdtext / quoted-pair) DQUOTE
///
/// Returns the quoted text including both quotes.
pub fn quoted_string(input: &[u8]) -> ParseResult<&[u8]> {
    let (start, _) = sws(input)?;
    if start.first() != Some(&b'"') {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)));
    }
    let mut i = 1;
    while i < start.len() {
        match start[i] {
            b'\\' => i += 2,
            b'"' => return Ok((&start[i + 1..], &start[..i + 1])),
            b'\r' | b'\n' => break,
            _ => i += 1,
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

/// Strips the quotes from a quoted-string and resolves quoted-pairs
pub fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// SIP-Version = "SIP" "/" 1*DIGIT "." 1*DIGIT
pub fn sip_version(input: &[u8]) -> ParseResult<Version> {
    map_res(
        recognize(tuple((tag_no_case(b"SIP/"), digit1, tag(b"."), digit1))),
        |raw: &[u8]| -> Result<Version> { Version::from_str(str::from_utf8(raw)?) },
    )(input)
}

fn is_gen_value_char(c: u8) -> bool {
    is_token_char(c) || matches!(c, b':' | b'[' | b']' | b'/' | b'@')
}

/// generic-param = token [ EQUAL gen-value ]
/// gen-value = token / host / quoted-string
pub fn generic_param(input: &[u8]) -> ParseResult<Param> {
    map_res(
        pair(
            token,
            opt(preceded(
                equal,
                alt((quoted_string, take_while1(is_gen_value_char))),
            )),
        ),
        |(name, value): (&[u8], Option<&[u8]>)| -> Result<Param> {
            let name = str::from_utf8(name)?;
            let value = value.map(str::from_utf8).transpose()?;
            Ok(Param::new(name, value))
        },
    )(input)
}

/// *( SEMI generic-param )
pub fn header_params(input: &[u8]) -> ParseResult<Params> {
    map(many0(preceded(semi, generic_param)), Params::from)(input)
}

/// Decodes `%HH` escapes
pub fn unescape(raw: &[u8]) -> Result<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::InvalidUri("Invalid percent escape".to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(String::from_utf8(out)?)
}
