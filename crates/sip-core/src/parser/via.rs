// Via grammar (RFC 3261 Section 25.1)
//
// via-parm      = sent-protocol LWS sent-by *( SEMI via-params )
// sent-protocol = protocol-name SLASH protocol-version SLASH transport
// sent-by       = host [ COLON port ]

use std::str;

use nom::{
    bytes::complete::tag_no_case,
    combinator::{map_res, opt},
    sequence::{preceded, terminated, tuple},
};

use crate::error::Result;
use crate::types::via::Via;

use super::common::{header_params, token};
use super::separators::{colon, slash};
use super::uri::{host, port};
use super::whitespace::{lws, sws};
use super::ParseResult;

fn sent_protocol(input: &[u8]) -> ParseResult<(String, String)> {
    map_res(
        tuple((
            terminated(tag_no_case(b"SIP"), slash),
            terminated(token, slash),
            token,
        )),
        |(_, version, transport): (&[u8], &[u8], &[u8])| -> Result<(String, String)> {
            Ok((
                str::from_utf8(version)?.to_string(),
                str::from_utf8(transport)?.to_ascii_uppercase(),
            ))
        },
    )(input)
}

/// A single via-parm
pub fn via(input: &[u8]) -> ParseResult<Via> {
    let (input, _) = sws(input)?;
    let (input, (version, transport)) = sent_protocol(input)?;
    let (input, _) = lws(input)?;
    let (input, host) = host(input)?;
    let (input, port) = opt(preceded(colon, port))(input)?;
    let (input, params) = header_params(input)?;
    let (input, _) = sws(input)?;
    Ok((
        input,
        Via {
            version,
            transport,
            host,
            port,
            params,
        },
    ))
}
