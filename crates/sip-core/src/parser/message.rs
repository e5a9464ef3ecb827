//! Whole-message parsing.
//!
//! The header block is split into logical lines first (unfolding
//! continuations, accepting bare LF), each header value is stored as text
//! and list headers are split into their elements. The mandatory headers
//! are then validated with the grammar rules, and the body is cut out
//! according to Content-Length.

use std::str::{self, FromStr};

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::headers::{HeaderAccess, HeaderName, Headers};
use crate::types::message::Message;
use crate::types::sip_request::Request;
use crate::types::sip_response::Response;
use crate::types::version::Version;

use super::request::request_line;
use super::response::status_line;
use super::utils::{split_list_values, unfold_lines};
use super::{complete, parse_address};

/// Parses a complete SIP message
pub fn parse_message(data: &[u8]) -> Result<Message> {
    // Leading CRLFs are keep-alives
    let start = data
        .iter()
        .position(|b| *b != b'\r' && *b != b'\n')
        .ok_or_else(|| Error::ParseError("Empty message".to_string()))?;
    let data = &data[start..];

    let (head_end, body_start) = find_header_end(data)
        .ok_or_else(|| Error::ParseError("Missing blank line after headers".to_string()))?;
    let head = str::from_utf8(&data[..head_end])?;
    let rest = &data[body_start..];

    let mut lines = unfold_lines(head).into_iter();
    let start_line = lines
        .next()
        .ok_or_else(|| Error::ParseError("Missing start line".to_string()))?;

    let mut headers = Headers::new();
    for line in lines {
        parse_header_line(&line, &mut headers)?;
    }
    let body = extract_body(&mut headers, rest)?;

    let is_response = start_line
        .get(..4)
        .map(|p| p.eq_ignore_ascii_case("SIP/"))
        .unwrap_or(false);

    let message = if is_response {
        let (version, status, reason) = complete(status_line, &start_line)
            .map_err(|_| Error::ParseError(format!("Invalid status line: {}", start_line)))?;
        check_version(version)?;
        Message::Response(Response {
            version,
            status,
            reason,
            headers,
            body,
        })
    } else {
        let (method, uri, version) = complete(request_line, &start_line)
            .map_err(|_| Error::ParseError(format!("Invalid request line: {}", start_line)))?;
        check_version(version)?;
        Message::Request(Request {
            method,
            uri,
            version,
            headers,
            body,
        })
    };

    validate(&message)?;
    trace!(start_line = %start_line, "parsed SIP message");
    Ok(message)
}

/// Offset of the end of the header block and of the body start.
///
/// The block ends at the first empty line (CRLF CRLF, LF LF or LF CRLF).
/// A message that simply ends after its last header line has an empty body.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    for (i, b) in data.iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\n'), _) => return Some((i, i + 2)),
            (Some(b'\r'), Some(b'\n')) => return Some((i, i + 3)),
            _ => {}
        }
    }
    if data.ends_with(b"\n") {
        Some((data.len(), data.len()))
    } else {
        None
    }
}

fn parse_header_line(line: &str, headers: &mut Headers) -> Result<()> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::ParseError(format!("Header line without colon: {}", line)))?;
    let name = HeaderName::from_str(name.trim_end_matches([' ', '\t']))?;
    let value = value.trim_matches([' ', '\t']);

    if name.is_list_header() {
        for element in split_list_values(value) {
            headers.push(name.clone(), element);
        }
    } else {
        headers.push(name, value);
    }
    Ok(())
}

fn extract_body(headers: &mut Headers, rest: &[u8]) -> Result<Bytes> {
    let length = match headers.get(&HeaderName::ContentLength) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::invalid_header("Content-Length", raw))?,
        None => rest.len(),
    };
    if length > rest.len() {
        return Err(Error::IncompleteBody {
            expected: length,
            actual: rest.len(),
        });
    }
    headers.set(HeaderName::ContentLength, length.to_string());
    Ok(Bytes::copy_from_slice(&rest[..length]))
}

fn check_version(version: Version) -> Result<()> {
    if version != Version::sip_2_0() {
        return Err(Error::ParseError(format!("Unsupported version: {}", version)));
    }
    Ok(())
}

fn validate(message: &Message) -> Result<()> {
    let headers = message.headers();

    let vias = message
        .vias()
        .map_err(|e| Error::invalid_header("Via", e.to_string()))?;
    if vias.is_empty() {
        return Err(Error::MissingHeader("Via".to_string()));
    }
    message
        .from_address()
        .map_err(|e| wrap("From", e))?;
    message.to_address().map_err(|e| wrap("To", e))?;
    match message.call_id() {
        Some(id) if !id.is_empty() => {}
        Some(_) => return Err(Error::invalid_header("Call-ID", "empty value")),
        None => return Err(Error::MissingHeader("Call-ID".to_string())),
    }
    let cseq = message.cseq().map_err(|e| wrap("CSeq", e))?;
    if let Message::Request(request) = message {
        if cseq.method != request.method {
            return Err(Error::invalid_header(
                "CSeq",
                format!("method {} does not match request method {}", cseq.method, request.method),
            ));
        }
    }

    if let Some(raw) = headers.get(&HeaderName::MaxForwards) {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| Error::invalid_header("Max-Forwards", raw))?;
    }
    for name in [HeaderName::Contact, HeaderName::Route, HeaderName::RecordRoute] {
        for raw in headers.get_all(&name) {
            if name == HeaderName::Contact && raw == "*" {
                continue;
            }
            parse_address(raw).map_err(|e| Error::invalid_header(name.as_str(), e.to_string()))?;
        }
    }
    Ok(())
}

fn wrap(header: &str, err: Error) -> Error {
    match err {
        Error::MissingHeader(_) => err,
        other => Error::invalid_header(header, other.to_string()),
    }
}
