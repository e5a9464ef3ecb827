// CSeq = 1*DIGIT LWS Method

use std::str::{self, FromStr};

use nom::{
    character::complete::digit1,
    combinator::map_res,
    sequence::tuple,
};

use crate::error::{Error, Result};
use crate::types::cseq::CSeq;
use crate::types::method::Method;

use super::common::token;
use super::whitespace::{lws, sws};
use super::ParseResult;

pub fn cseq(input: &[u8]) -> ParseResult<CSeq> {
    map_res(
        tuple((sws, digit1, lws, token, sws)),
        |(_, seq, _, method, _): (&[u8], &[u8], &[u8], &[u8], &[u8])| -> Result<CSeq> {
            let seq = str::from_utf8(seq)?
                .parse::<u32>()
                .map_err(|e| Error::invalid_header("CSeq", e.to_string()))?;
            let method = Method::from_str(str::from_utf8(method)?)?;
            Ok(CSeq::new(seq, method))
        },
    )(input)
}
