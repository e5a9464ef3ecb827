use std::str::{self, FromStr};

use nom::{
    bytes::complete::tag,
    combinator::map_res,
    sequence::{terminated, tuple},
};

use crate::error::Result;
use crate::types::method::Method;
use crate::types::uri::Uri;
use crate::types::version::Version;

use super::common::{sip_version, token};
use super::uri::sip_uri;
use super::ParseResult;

fn method(input: &[u8]) -> ParseResult<Method> {
    map_res(token, |raw: &[u8]| -> Result<Method> {
        Method::from_str(str::from_utf8(raw)?)
    })(input)
}

/// Request-Line = Method SP Request-URI SP SIP-Version
pub fn request_line(input: &[u8]) -> ParseResult<(Method, Uri, Version)> {
    tuple((
        terminated(method, tag(b" ")),
        terminated(sip_uri, tag(b" ")),
        sip_version,
    ))(input)
}
