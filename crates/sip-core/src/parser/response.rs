use std::str;

use nom::{
    bytes::complete::{tag, take_while, take_while_m_n},
    combinator::{map_res, opt},
    sequence::{preceded, terminated, tuple},
};

use crate::error::{Error, Result};
use crate::types::status::StatusCode;
use crate::types::version::Version;

use super::common::sip_version;
use super::ParseResult;

/// Status-Code = 3DIGIT
pub fn status_code(input: &[u8]) -> ParseResult<StatusCode> {
    map_res(
        take_while_m_n(3, 3, |c: u8| c.is_ascii_digit()),
        |digits: &[u8]| -> Result<StatusCode> {
            let code = str::from_utf8(digits)?
                .parse::<u16>()
                .map_err(|e| Error::ParseError(format!("Invalid status code: {}", e)))?;
            StatusCode::from_u16(code)
        },
    )(input)
}

/// Reason-Phrase, everything up to the end of the line; may be empty
pub fn reason_phrase(input: &[u8]) -> ParseResult<&[u8]> {
    take_while(|c| c != b'\r' && c != b'\n')(input)
}

/// Status-Line = SIP-Version SP Status-Code SP Reason-Phrase
///
/// A missing reason phrase (no trailing SP) is tolerated.
pub fn status_line(input: &[u8]) -> ParseResult<(Version, StatusCode, String)> {
    map_res(
        tuple((
            terminated(sip_version, tag(b" ")),
            status_code,
            opt(preceded(tag(b" "), reason_phrase)),
        )),
        |(version, status, reason): (Version, StatusCode, Option<&[u8]>)| -> Result<(Version, StatusCode, String)> {
            let reason = reason.map(str::from_utf8).transpose()?.unwrap_or("");
            Ok((version, status, reason.to_string()))
        },
    )(input)
}
