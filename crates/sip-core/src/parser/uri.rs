// SIP-URI grammar (RFC 3261 Section 25.1)
//
// SIP-URI  = "sip:" [ userinfo ] hostport uri-parameters [ headers ]
// userinfo = ( user / telephone-subscriber ) [ ":" password ] "@"
// hostport = host [ ":" port ]

use std::str;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::digit1,
    combinator::{map, map_res, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{pair, preceded, separated_pair, terminated, tuple},
};

use crate::error::Result;
use crate::types::param::{Param, Params};
use crate::types::uri::{is_password_unescaped, is_unreserved, is_user_unescaped, Host, Scheme, Uri};

use super::common::unescape;
use super::ParseResult;

fn is_user_char(c: u8) -> bool {
    is_user_unescaped(c) || c == b'%'
}

fn is_password_char(c: u8) -> bool {
    is_password_unescaped(c) || c == b'%'
}

fn is_hostname_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'.'
}

fn is_ipv6_char(c: u8) -> bool {
    c.is_ascii_hexdigit() || c == b':' || c == b'.'
}

/// paramchar = param-unreserved / unreserved / escaped
fn is_param_char(c: u8) -> bool {
    is_unreserved(c) || matches!(c, b'%' | b'[' | b']' | b'/' | b':' | b'&' | b'+' | b'$')
}

/// hnv-unreserved / unreserved / escaped
fn is_header_char(c: u8) -> bool {
    is_unreserved(c) || matches!(c, b'%' | b'[' | b']' | b'/' | b'?' | b':' | b'+' | b'$')
}

fn scheme(input: &[u8]) -> ParseResult<Scheme> {
    alt((
        map(tag_no_case(b"sips:"), |_| Scheme::Sips),
        map(tag_no_case(b"sip:"), |_| Scheme::Sip),
    ))(input)
}

fn userinfo(input: &[u8]) -> ParseResult<(String, Option<String>)> {
    map_res(
        terminated(
            pair(
                take_while1(is_user_char),
                opt(preceded(tag(b":"), take_while(is_password_char))),
            ),
            tag(b"@"),
        ),
        |(user, password): (&[u8], Option<&[u8]>)| -> Result<(String, Option<String>)> {
            Ok((unescape(user)?, password.map(unescape).transpose()?))
        },
    )(input)
}

/// host = hostname / IPv4address / IPv6reference
pub fn host(input: &[u8]) -> ParseResult<Host> {
    map_res(
        alt((
            recognize(tuple((tag(b"["), take_while1(is_ipv6_char), tag(b"]")))),
            take_while1(is_hostname_char),
        )),
        |raw: &[u8]| -> Result<Host> { Host::parse(str::from_utf8(raw)?) },
    )(input)
}

pub fn port(input: &[u8]) -> ParseResult<u16> {
    map_res(digit1, |digits: &[u8]| -> Result<u16> {
        str::from_utf8(digits)?
            .parse::<u16>()
            .map_err(|e| crate::error::Error::InvalidUri(format!("Invalid port: {}", e)))
    })(input)
}

fn uri_param(input: &[u8]) -> ParseResult<Param> {
    map_res(
        preceded(
            tag(b";"),
            pair(
                take_while1(is_param_char),
                opt(preceded(tag(b"="), take_while1(is_param_char))),
            ),
        ),
        |(name, value): (&[u8], Option<&[u8]>)| -> Result<Param> {
            Ok(Param::new(
                str::from_utf8(name)?,
                value.map(str::from_utf8).transpose()?,
            ))
        },
    )(input)
}

fn uri_headers(input: &[u8]) -> ParseResult<Vec<(String, String)>> {
    preceded(
        tag(b"?"),
        separated_list1(
            tag(b"&"),
            map_res(
                separated_pair(take_while1(is_header_char), tag(b"="), take_while(is_header_char)),
                |(name, value): (&[u8], &[u8])| -> Result<(String, String)> {
                    Ok((str::from_utf8(name)?.to_string(), str::from_utf8(value)?.to_string()))
                },
            ),
        ),
    )(input)
}

fn uri_with(input: &[u8], with_params: bool) -> ParseResult<Uri> {
    let (input, scheme) = scheme(input)?;
    let (input, userinfo) = opt(userinfo)(input)?;
    let (input, host) = host(input)?;
    let (input, port) = opt(preceded(tag(b":"), port))(input)?;
    let (input, params, headers) = if with_params {
        let (input, params) = many0(uri_param)(input)?;
        let (input, headers) = opt(uri_headers)(input)?;
        (input, Params::from(params), headers.unwrap_or_default())
    } else {
        (input, Params::new(), Vec::new())
    };
    let (user, password) = match userinfo {
        Some((user, password)) => (Some(user), password),
        None => (None, None),
    };
    Ok((
        input,
        Uri {
            scheme,
            user,
            password,
            host,
            port,
            params,
            headers,
        },
    ))
}

/// Full SIP-URI including parameters and headers
pub fn sip_uri(input: &[u8]) -> ParseResult<Uri> {
    uri_with(input, true)
}

/// URI of an addr-spec outside angle brackets; any `;param` that follows
/// belongs to the header, not the URI.
pub fn addr_spec_uri(input: &[u8]) -> ParseResult<Uri> {
    uri_with(input, false)
}
