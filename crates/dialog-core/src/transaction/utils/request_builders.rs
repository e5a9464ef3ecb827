//! Requests the transaction layer builds on its own behalf.

use sipflow_sip_core::prelude::*;

use crate::errors::{DialogError, DialogResult};

/// ACK for a non-2xx final response (RFC 3261 Section 17.1.1.3)
///
/// Shares the INVITE's branch through its single Via, so it never creates a
/// transaction of its own.
pub fn create_ack_for_non_2xx(invite: &Request, response: &Response) -> DialogResult<Request> {
    if response.status.is_success() {
        return Err(DialogError::invalid_state(
            "ACK for a 2xx is built by the dialog, not the transaction",
        ));
    }

    let mut ack = Request::new(Method::Ack, invite.uri.clone());
    ack.headers.push(HeaderName::Via, required(invite, HeaderName::Via)?);
    for route in invite.headers.get_all(&HeaderName::Route) {
        ack.headers.push(HeaderName::Route, route);
    }
    ack.headers.push(HeaderName::MaxForwards, "70");
    ack.headers.push(HeaderName::From, required(invite, HeaderName::From)?);
    ack.headers.push(
        HeaderName::To,
        response
            .header(&HeaderName::To)
            .ok_or_else(|| DialogError::protocol_error("Response missing To header"))?,
    );
    ack.headers.push(HeaderName::CallId, required(invite, HeaderName::CallId)?);
    let cseq = invite.cseq()?;
    ack.headers
        .push(HeaderName::CSeq, CSeq::new(cseq.seq, Method::Ack).to_string());
    Ok(ack)
}

/// CANCEL for a pending INVITE (RFC 3261 Section 9.1)
pub fn create_cancel(invite: &Request) -> DialogResult<Request> {
    if !invite.method.is_invite() {
        return Err(DialogError::invalid_state("Only INVITE requests can be cancelled"));
    }

    let mut cancel = Request::new(Method::Cancel, invite.uri.clone());
    cancel.headers.push(HeaderName::Via, required(invite, HeaderName::Via)?);
    for route in invite.headers.get_all(&HeaderName::Route) {
        cancel.headers.push(HeaderName::Route, route);
    }
    cancel.headers.push(HeaderName::MaxForwards, "70");
    cancel.headers.push(HeaderName::From, required(invite, HeaderName::From)?);
    cancel.headers.push(HeaderName::To, required(invite, HeaderName::To)?);
    cancel.headers.push(HeaderName::CallId, required(invite, HeaderName::CallId)?);
    let cseq = invite.cseq()?;
    cancel
        .headers
        .push(HeaderName::CSeq, CSeq::new(cseq.seq, Method::Cancel).to_string());
    Ok(cancel)
}

/// Response built by the core itself, with an optional To tag
pub fn create_response(request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
    let mut response = Response::from_request(request, status);
    if let Some(tag) = to_tag {
        add_to_tag(&mut response, tag);
    }
    response
}

/// Adds `tag` to the To header unless it already carries one
pub fn add_to_tag(response: &mut Response, tag: &str) {
    let Ok(mut to) = response.to_address() else {
        return;
    };
    if to.tag().is_none() {
        to.set_tag(tag);
        response.headers.set(HeaderName::To, to.to_string());
    }
}

fn required(request: &Request, name: HeaderName) -> DialogResult<String> {
    request
        .header(&name)
        .map(str::to_string)
        .ok_or_else(|| DialogError::protocol_error(&format!("Request missing {} header", name)))
}

/// A complete request for tests
#[cfg(test)]
pub(crate) fn create_test_request(method: Method) -> Request {
    let mut builder = SimpleRequestBuilder::new(method.clone(), "sip:bob@biloxi.example.com")
        .and_then(|b| b.from("Alice", "sip:alice@atlanta.example.com", Some("1928301774")))
        .and_then(|b| b.to("Bob", "sip:bob@biloxi.example.com", None))
        .unwrap()
        .call_id("a84b4c76e66710@pc33.atlanta.example.com")
        .cseq(314159)
        .via(
            "SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds"
                .parse()
                .unwrap(),
        )
        .max_forwards(70);
    if method.is_invite() {
        builder = builder.contact("sip:alice@pc33.atlanta.example.com".parse().unwrap());
    }
    builder.build()
}
