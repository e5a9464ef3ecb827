//! Dialog implementation for RFC 3261 SIP dialogs
//!
//! Handles creation from the request/response pair that establishes a To
//! tag, the per-direction sequence numbers, target refresh and construction
//! of in-dialog requests along the route set.

use serde::{Deserialize, Serialize};
use tracing::debug;

use sipflow_sip_core::{
    Address, CSeq, HeaderAccess, HeaderName, Method, Request, Response, Uri,
};

use super::dialog_id::DialogId;
use super::dialog_state::DialogState;
use super::method_profile::MethodProfile;
use crate::errors::{DialogError, DialogResult};

/// A SIP dialog as defined in RFC 3261
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: DialogId,

    pub state: DialogState,

    /// Our party, with the local tag
    pub local_address: Address,

    /// The peer, with the remote tag
    pub remote_address: Address,

    /// CSeq of the last request we sent in this dialog
    pub local_seq: u32,

    /// CSeq of the last request accepted from the peer
    pub remote_seq: Option<u32>,

    /// Our Contact
    pub local_target: Uri,

    /// Where in-dialog requests are sent
    pub remote_target: Uri,

    /// Fixed at creation; ordered for requests we send
    pub route_set: Vec<Uri>,

    /// True when this endpoint sent the dialog-forming request
    pub is_initiator: bool,

    /// ACK sent for the most recent INVITE 2xx, with that INVITE's CSeq
    last_ack: Option<(u32, Request)>,
}

impl Dialog {
    /// Dialog created by a response to a request we sent
    ///
    /// A 101-199 response gives an early dialog, a 2xx a confirmed one. The
    /// route set is the response's Record-Route in reverse order.
    pub fn from_uac_response(
        request: &Request,
        response: &Response,
        local_target: Uri,
    ) -> DialogResult<Self> {
        let status = response.status;
        let state = if status.is_provisional() && status.as_u16() > 100 {
            DialogState::Early
        } else if status.is_success() {
            DialogState::Confirmed
        } else {
            return Err(DialogError::protocol_error(&format!(
                "{} does not establish a dialog",
                status.as_u16()
            )));
        };

        let id = DialogId::for_response(response)
            .ok_or_else(|| DialogError::protocol_error("Response lacks Call-ID, From tag or To tag"))?;

        let route_set = response
            .record_routes()?
            .into_iter()
            .rev()
            .map(|address| address.uri)
            .collect();

        let remote_target = response
            .contact()
            .map(|contact| contact.uri)
            .unwrap_or_else(|| request.uri.clone());

        debug!(id = %id, %state, "dialog created from response");
        Ok(Dialog {
            id,
            state,
            local_address: request.from_address()?,
            remote_address: response.to_address()?,
            local_seq: request.cseq()?.seq,
            remote_seq: None,
            local_target,
            remote_target,
            route_set,
            is_initiator: true,
            last_ack: None,
        })
    }

    /// Dialog created by our response to a dialog-forming request
    ///
    /// The route set is the request's Record-Route in order.
    pub fn from_uas_request(
        request: &Request,
        local_tag: &str,
        local_target: Uri,
        state: DialogState,
    ) -> DialogResult<Self> {
        if state == DialogState::Terminated {
            return Err(DialogError::invalid_state("A dialog cannot start terminated"));
        }

        let remote_address = request.from_address()?;
        let remote_tag = remote_address
            .tag()
            .ok_or_else(|| DialogError::protocol_error("Request lacks a From tag"))?
            .to_string();
        let call_id = request
            .call_id()
            .ok_or_else(|| DialogError::protocol_error("Request lacks Call-ID"))?;

        let mut local_address = request.to_address()?;
        local_address.set_tag(local_tag);

        let route_set = request
            .record_routes()?
            .into_iter()
            .map(|address| address.uri)
            .collect();

        let remote_target = request
            .contact()
            .map(|contact| contact.uri)
            .unwrap_or_else(|| remote_address.uri.clone());

        let id = DialogId::new(call_id, local_tag, remote_tag);
        debug!(id = %id, %state, "dialog created from request");
        Ok(Dialog {
            id,
            state,
            local_address,
            remote_address,
            local_seq: 0,
            remote_seq: Some(request.cseq()?.seq),
            local_target,
            remote_target,
            route_set,
            is_initiator: false,
            last_ack: None,
        })
    }

    /// Subscriber side dialog created by a NOTIFY that overtook the 2xx to
    /// our SUBSCRIBE (RFC 6665 4.1.2.4)
    ///
    /// Local identity and CSeq come from the SUBSCRIBE; route set and remote
    /// target come from the NOTIFY as for any dialog-forming request.
    pub fn from_notify(subscribe: &Request, notify: &Request, local_target: Uri) -> DialogResult<Self> {
        let local_address = subscribe.from_address()?;
        let local_tag = local_address
            .tag()
            .ok_or_else(|| DialogError::protocol_error("SUBSCRIBE lacks a From tag"))?
            .to_string();
        if notify.to_tag().as_deref() != Some(local_tag.as_str())
            || notify.call_id() != subscribe.call_id()
        {
            return Err(DialogError::protocol_error("NOTIFY does not match the subscription"));
        }

        let mut dialog = Self::from_uas_request(notify, &local_tag, local_target, DialogState::Confirmed)?;
        dialog.local_address = local_address;
        dialog.local_seq = subscribe.cseq()?.seq;
        dialog.is_initiator = true;
        Ok(dialog)
    }

    pub fn transition(&mut self, to: DialogState) -> DialogResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(DialogError::IllegalDialogTransition {
                from: self.state,
                to,
            });
        }
        debug!(id = %self.id, from = %self.state, %to, "dialog transition");
        self.state = to;
        Ok(())
    }

    pub fn confirm(&mut self) -> DialogResult<()> {
        self.transition(DialogState::Confirmed)
    }

    /// Moves to Terminated; a no-op when already there
    pub fn terminate(&mut self) {
        if self.state != DialogState::Terminated {
            debug!(id = %self.id, from = %self.state, "dialog terminated");
            self.state = DialogState::Terminated;
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == DialogState::Terminated
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == DialogState::Confirmed
    }

    /// Checks and applies an inbound in-dialog request
    ///
    /// The CSeq must exceed the last accepted one; otherwise the request is
    /// refused with `SequenceViolation` and the dialog is left untouched. ACK
    /// and CANCEL reuse the CSeq of their INVITE and are not sequenced.
    pub fn accept_remote_request(&mut self, request: &Request) -> DialogResult<()> {
        if self.is_terminated() {
            return Err(DialogError::invalid_state("Dialog is terminated"));
        }
        if matches!(request.method, Method::Ack | Method::Cancel) {
            return Ok(());
        }

        let seq = request.cseq()?.seq;
        if let Some(last) = self.remote_seq {
            if seq <= last {
                return Err(DialogError::SequenceViolation {
                    id: self.id.clone(),
                    received: seq,
                    last,
                });
            }
        }
        self.remote_seq = Some(seq);

        if MethodProfile::for_method(&request.method).refreshes_target {
            if let Some(contact) = request.contact() {
                self.remote_target = contact.uri;
            }
        }
        Ok(())
    }

    /// Target refresh from a 2xx to a refreshing request we sent
    pub fn refresh_from_response(&mut self, method: &Method, response: &Response) {
        if response.status.is_success() && MethodProfile::for_method(method).refreshes_target {
            if let Some(contact) = response.contact() {
                self.remote_target = contact.uri;
            }
        }
    }

    /// New in-dialog request with the next local CSeq
    ///
    /// Route headers come from the route set in order and Contact from the
    /// local target. Via is left to the transaction layer.
    pub fn create_request(&mut self, method: Method) -> DialogResult<Request> {
        if matches!(method, Method::Ack | Method::Cancel) {
            return Err(DialogError::invalid_state(
                "ACK and CANCEL reuse the CSeq of the request they refer to",
            ));
        }
        if self.is_terminated() {
            return Err(DialogError::invalid_state("Dialog is terminated"));
        }

        self.local_seq = self
            .local_seq
            .checked_add(1)
            .ok_or_else(|| DialogError::invalid_state("Local CSeq space exhausted"))?;
        let mut request = self.routed_request(method.clone());
        request
            .headers
            .push(HeaderName::CSeq, CSeq::new(self.local_seq, method).to_string());
        request
            .headers
            .push(HeaderName::Contact, format!("<{}>", self.local_target));
        Ok(request)
    }

    /// ACK for a 2xx to the INVITE sent with CSeq `invite_seq`
    pub fn create_ack(&self, invite_seq: u32) -> Request {
        let mut ack = self.routed_request(Method::Ack);
        ack.headers
            .push(HeaderName::CSeq, CSeq::new(invite_seq, Method::Ack).to_string());
        ack
    }

    pub fn record_ack(&mut self, invite_seq: u32, ack: Request) {
        self.last_ack = Some((invite_seq, ack));
    }

    /// The ACK already sent for the INVITE with CSeq `invite_seq`
    pub fn ack_for(&self, invite_seq: u32) -> Option<&Request> {
        match &self.last_ack {
            Some((seq, ack)) if *seq == invite_seq => Some(ack),
            _ => None,
        }
    }

    /// Request-URI and Route values for the next request (RFC 3261 12.2.1.1)
    pub fn request_target(&self) -> (Uri, Vec<Uri>) {
        match self.route_set.first() {
            None => (self.remote_target.clone(), Vec::new()),
            Some(first) if first.is_loose_router() => {
                (self.remote_target.clone(), self.route_set.clone())
            }
            Some(first) => {
                // strict router: it becomes the Request-URI and the remote
                // target goes last in Route
                let mut routes: Vec<Uri> = self.route_set[1..].to_vec();
                routes.push(self.remote_target.clone());
                (first.clone(), routes)
            }
        }
    }

    fn routed_request(&self, method: Method) -> Request {
        let (request_uri, routes) = self.request_target();
        let mut request = Request::new(method, request_uri);
        for route in routes {
            request.headers.push(HeaderName::Route, format!("<{}>", route));
        }
        request
            .headers
            .push(HeaderName::From, self.local_address.to_string());
        request
            .headers
            .push(HeaderName::To, self.remote_address.to_string());
        request.headers.push(HeaderName::CallId, self.id.call_id.clone());
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipflow_sip_core::{Message, StatusCode};

    const INVITE: &str = "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
        Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
        Max-Forwards: 70\r\n\
        To: Bob <sip:bob@biloxi.example.com>\r\n\
        From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
        Call-ID: a84b4c76e66710\r\n\
        CSeq: 314159 INVITE\r\n\
        Contact: <sip:alice@pc33.atlanta.example.com>\r\n\
        Record-Route: <sip:p1.example.com;lr>, <sip:p2.example.com;lr>\r\n\
        Content-Length: 0\r\n\r\n";

    const OK: &str = "SIP/2.0 200 OK\r\n\
        Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
        Record-Route: <sip:p1.example.com;lr>, <sip:p2.example.com;lr>\r\n\
        To: Bob <sip:bob@biloxi.example.com>;tag=a6c85cf\r\n\
        From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
        Call-ID: a84b4c76e66710\r\n\
        CSeq: 314159 INVITE\r\n\
        Contact: <sip:bob@192.0.2.4>\r\n\
        Content-Length: 0\r\n\r\n";

    fn request(text: &str) -> Request {
        match Message::parse(text.as_bytes()).unwrap() {
            Message::Request(r) => r,
            _ => unreachable!(),
        }
    }

    fn response(text: &str) -> Response {
        match Message::parse(text.as_bytes()).unwrap() {
            Message::Response(r) => r,
            _ => unreachable!(),
        }
    }

    fn uac_dialog() -> Dialog {
        Dialog::from_uac_response(
            &request(INVITE),
            &response(OK),
            "sip:alice@pc33.atlanta.example.com".parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_uac_dialog_from_2xx() {
        let dialog = uac_dialog();
        assert_eq!(dialog.state, DialogState::Confirmed);
        assert_eq!(dialog.id, DialogId::new("a84b4c76e66710", "1928301774", "a6c85cf"));
        assert_eq!(dialog.local_seq, 314159);
        assert_eq!(dialog.remote_seq, None);
        assert_eq!(dialog.remote_target.to_string(), "sip:bob@192.0.2.4");
        // reversed Record-Route
        let routes: Vec<String> = dialog.route_set.iter().map(|u| u.to_string()).collect();
        assert_eq!(routes, vec!["sip:p2.example.com;lr", "sip:p1.example.com;lr"]);
    }

    #[test]
    fn test_uac_early_dialog_from_provisional() {
        let ringing = response(&OK.replace("200 OK", "180 Ringing"));
        let mut dialog = Dialog::from_uac_response(
            &request(INVITE),
            &ringing,
            "sip:alice@pc33.atlanta.example.com".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(dialog.state, DialogState::Early);
        dialog.confirm().unwrap();
        assert!(dialog.is_confirmed());
        assert!(dialog.confirm().is_err());

        let trying = response(&OK.replace("200 OK", "100 Trying"));
        assert!(Dialog::from_uac_response(&request(INVITE), &trying, dialog.local_target.clone()).is_err());
    }

    #[test]
    fn test_uas_dialog_route_set_in_order() {
        let dialog = Dialog::from_uas_request(
            &request(INVITE),
            "a6c85cf",
            "sip:bob@192.0.2.4".parse().unwrap(),
            DialogState::Confirmed,
        )
        .unwrap();
        assert_eq!(dialog.id, DialogId::new("a84b4c76e66710", "a6c85cf", "1928301774"));
        assert_eq!(dialog.remote_seq, Some(314159));
        assert_eq!(dialog.local_address.tag(), Some("a6c85cf"));
        assert_eq!(dialog.route_set[0].to_string(), "sip:p1.example.com;lr");
        assert_eq!(dialog.remote_target.to_string(), "sip:alice@pc33.atlanta.example.com");
    }

    #[test]
    fn test_in_dialog_request_construction() {
        let mut dialog = uac_dialog();
        let bye = dialog.create_request(Method::Bye).unwrap();
        assert_eq!(bye.uri.to_string(), "sip:bob@192.0.2.4");
        assert_eq!(bye.cseq().unwrap(), CSeq::new(314160, Method::Bye));
        assert_eq!(bye.from_tag().as_deref(), Some("1928301774"));
        assert_eq!(bye.to_tag().as_deref(), Some("a6c85cf"));
        let routes: Vec<String> = bye.routes().unwrap().iter().map(|a| a.uri.to_string()).collect();
        assert_eq!(routes, vec!["sip:p2.example.com;lr", "sip:p1.example.com;lr"]);
        assert_eq!(
            bye.contact().unwrap().uri.to_string(),
            "sip:alice@pc33.atlanta.example.com"
        );

        let info = dialog.create_request(Method::Info).unwrap();
        assert_eq!(info.cseq().unwrap().seq, 314161);

        let ack = dialog.create_ack(314159);
        assert_eq!(ack.cseq().unwrap(), CSeq::new(314159, Method::Ack));
        assert_eq!(dialog.local_seq, 314161);
        assert!(dialog.create_request(Method::Ack).is_err());
    }

    #[test]
    fn test_strict_route_rewrites_request_uri() {
        let mut dialog = uac_dialog();
        dialog.route_set = vec!["sip:strict.example.com".parse().unwrap()];
        let (uri, routes) = dialog.request_target();
        assert_eq!(uri.to_string(), "sip:strict.example.com");
        assert_eq!(routes, vec![dialog.remote_target.clone()]);
    }

    #[test]
    fn test_remote_sequence_is_monotonic() {
        let mut dialog = Dialog::from_uas_request(
            &request(INVITE),
            "a6c85cf",
            "sip:bob@192.0.2.4".parse().unwrap(),
            DialogState::Confirmed,
        )
        .unwrap();

        let reinvite = request(
            &INVITE
                .replace("To: Bob <sip:bob@biloxi.example.com>", "To: Bob <sip:bob@biloxi.example.com>;tag=a6c85cf")
                .replace("314159 INVITE", "314160 INVITE")
                .replace("<sip:alice@pc33.atlanta.example.com>", "<sip:alice@198.51.100.7>"),
        );
        dialog.accept_remote_request(&reinvite).unwrap();
        assert_eq!(dialog.remote_seq, Some(314160));
        assert_eq!(dialog.remote_target.to_string(), "sip:alice@198.51.100.7");

        let before = dialog.clone();
        let err = dialog.accept_remote_request(&reinvite).unwrap_err();
        assert!(matches!(err, DialogError::SequenceViolation { received: 314160, last: 314160, .. }));
        assert_eq!(dialog, before);
    }

    #[test]
    fn test_terminated_dialog_refuses_requests() {
        let mut dialog = uac_dialog();
        dialog.terminate();
        dialog.terminate();
        assert!(dialog.is_terminated());
        assert!(dialog.create_request(Method::Bye).is_err());
        assert!(dialog.transition(DialogState::Confirmed).is_err());
        assert_eq!(
            StatusCode::from_u16(481).unwrap(),
            StatusCode::CallOrTransactionDoesNotExist
        );
    }

    #[test]
    fn test_local_cseq_does_not_wrap() {
        let mut dialog = uac_dialog();
        dialog.local_seq = u32::MAX;
        let before = dialog.clone();
        let err = dialog.create_request(Method::Info).unwrap_err();
        assert!(matches!(err, DialogError::InvalidState(_)));
        assert_eq!(dialog, before);
    }

    const SUBSCRIBE: &str = "SUBSCRIBE sip:presence@biloxi.example.com SIP/2.0\r\n\
        Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bKsub1\r\n\
        Max-Forwards: 70\r\n\
        To: <sip:presence@biloxi.example.com>\r\n\
        From: Alice <sip:alice@atlanta.example.com>;tag=sub-tag\r\n\
        Call-ID: sub-call@pc33.atlanta.example.com\r\n\
        CSeq: 17 SUBSCRIBE\r\n\
        Event: presence\r\n\
        Contact: <sip:alice@pc33.atlanta.example.com>\r\n\
        Content-Length: 0\r\n\r\n";

    const NOTIFY: &str = "NOTIFY sip:alice@pc33.atlanta.example.com SIP/2.0\r\n\
        Via: SIP/2.0/UDP notifier.biloxi.example.com;branch=z9hG4bKnot1\r\n\
        Max-Forwards: 70\r\n\
        To: Alice <sip:alice@atlanta.example.com>;tag=sub-tag\r\n\
        From: <sip:presence@biloxi.example.com>;tag=notifier\r\n\
        Call-ID: sub-call@pc33.atlanta.example.com\r\n\
        CSeq: 1 NOTIFY\r\n\
        Event: presence\r\n\
        Subscription-State: active;expires=600\r\n\
        Contact: <sip:notifier@192.0.2.9>\r\n\
        Record-Route: <sip:p1.example.com;lr>\r\n\
        Content-Length: 0\r\n\r\n";

    #[test]
    fn test_subscriber_dialog_from_early_notify() {
        let local: Uri = "sip:alice@pc33.atlanta.example.com".parse().unwrap();
        let mut dialog = Dialog::from_notify(&request(SUBSCRIBE), &request(NOTIFY), local.clone()).unwrap();
        assert_eq!(dialog.id, DialogId::new("sub-call@pc33.atlanta.example.com", "sub-tag", "notifier"));
        assert_eq!(dialog.state, DialogState::Confirmed);
        assert!(dialog.is_initiator);
        assert_eq!(dialog.remote_seq, Some(1));
        assert_eq!(dialog.remote_target.to_string(), "sip:notifier@192.0.2.9");
        assert_eq!(dialog.route_set.len(), 1);

        let refresh = dialog.create_request(Method::Subscribe).unwrap();
        assert_eq!(refresh.cseq().unwrap(), CSeq::new(18, Method::Subscribe));
        assert_eq!(refresh.from_tag().as_deref(), Some("sub-tag"));

        let other = NOTIFY.replace("tag=sub-tag", "tag=someone-else");
        assert!(Dialog::from_notify(&request(SUBSCRIBE), &request(&other), local).is_err());
    }
}
