// name-addr / addr-spec grammar shared by From, To, Contact, Route and
// Record-Route.
//
// (name-addr / addr-spec) *(SEMI param)
// name-addr    = [ display-name ] LAQUOT addr-spec RAQUOT
// display-name = *(token LWS) / quoted-string

use std::str;

use nom::{
    branch::alt,
    combinator::{map, map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, terminated},
};

use crate::error::Result;
use crate::types::address::Address;
use crate::types::uri::Uri;

use super::common::{header_params, quoted_string, token, unquote};
use super::separators::{laquot, raquot};
use super::uri::{addr_spec_uri, sip_uri};
use super::whitespace::{lws, sws};
use super::ParseResult;

fn display_name(input: &[u8]) -> ParseResult<String> {
    alt((
        map_res(quoted_string, |raw: &[u8]| -> Result<String> {
            Ok(unquote(str::from_utf8(raw)?))
        }),
        map_res(
            recognize(pair(token, many0(pair(lws, token)))),
            |raw: &[u8]| -> Result<String> { Ok(str::from_utf8(raw)?.to_string()) },
        ),
    ))(input)
}

fn name_addr(input: &[u8]) -> ParseResult<(Option<String>, Uri)> {
    pair(
        opt(terminated(display_name, sws)),
        delimited(laquot, sip_uri, raquot),
    )(input)
}

/// A complete address header value with its parameters
pub fn address(input: &[u8]) -> ParseResult<Address> {
    let (input, _) = sws(input)?;
    let (input, (display_name, uri)) =
        alt((name_addr, map(addr_spec_uri, |uri| (None, uri))))(input)?;
    let (input, params) = header_params(input)?;
    let (input, _) = sws(input)?;
    Ok((
        input,
        Address {
            display_name,
            uri,
            params,
        },
    ))
}
