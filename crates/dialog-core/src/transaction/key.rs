//! Transaction identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use sipflow_sip_core::{HeaderAccess, Message, Method, Request, Response};

use crate::errors::{DialogError, DialogResult};

/// Which side of the transaction this endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionRole {
    Client,
    Server,
}

/// Identifies a transaction in the transaction table
///
/// Client transactions are keyed by `(branch, method, role)`. Server
/// transactions additionally carry the sent-by of the top Via, since the
/// branch is chosen by the peer. ACK is folded into the INVITE method so a
/// non-2xx ACK finds its INVITE server transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    pub branch: String,
    pub method: Method,
    pub role: TransactionRole,
    /// Top Via sent-by, lower-cased; empty for client transactions
    pub sent_by: String,
}

impl TransactionKey {
    pub fn client(branch: impl Into<String>, method: Method) -> Self {
        TransactionKey {
            branch: branch.into(),
            method: key_method(method),
            role: TransactionRole::Client,
            sent_by: String::new(),
        }
    }

    pub fn server(branch: impl Into<String>, method: Method, sent_by: impl AsRef<str>) -> Self {
        TransactionKey {
            branch: branch.into(),
            method: key_method(method),
            role: TransactionRole::Server,
            sent_by: sent_by.as_ref().to_ascii_lowercase(),
        }
    }

    /// Key of the server transaction an inbound request belongs to
    pub fn from_request(request: &Request) -> DialogResult<Self> {
        let via = request.top_via()?;
        let branch = via
            .branch()
            .ok_or_else(|| DialogError::protocol_error("Top Via has no branch"))?;
        Ok(Self::server(branch, request.method.clone(), via.sent_by()))
    }

    /// Key of the client transaction an inbound response belongs to
    pub fn from_response(response: &Response) -> DialogResult<Self> {
        let via = response.top_via()?;
        let branch = via
            .branch()
            .ok_or_else(|| DialogError::protocol_error("Top Via has no branch"))?;
        let cseq = response.cseq()?;
        Ok(Self::client(branch, cseq.method))
    }

    /// Key an inbound message is matched against
    pub fn from_message(message: &Message) -> DialogResult<Self> {
        match message {
            Message::Request(request) => Self::from_request(request),
            Message::Response(response) => Self::from_response(response),
        }
    }

    pub fn is_server(&self) -> bool {
        self.role == TransactionRole::Server
    }

    pub fn is_invite(&self) -> bool {
        self.method == Method::Invite
    }

    /// Same branch and peer, different method
    pub fn with_method(&self, method: Method) -> Self {
        TransactionKey {
            branch: self.branch.clone(),
            method: key_method(method),
            role: self.role,
            sent_by: self.sent_by.clone(),
        }
    }
}

fn key_method(method: Method) -> Method {
    match method {
        Method::Ack => Method::Invite,
        other => other,
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            TransactionRole::Client => write!(f, "{}:{}:client", self.branch, self.method),
            TransactionRole::Server => {
                write!(f, "{}:{}:server:{}", self.branch, self.method, self.sent_by)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Message {
        Message::parse(text.as_bytes()).unwrap()
    }

    const INVITE: &str = "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
        Via: SIP/2.0/UDP PC33.atlanta.example.com:5060;branch=z9hG4bK776asdhds\r\n\
        Max-Forwards: 70\r\n\
        To: Bob <sip:bob@biloxi.example.com>\r\n\
        From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
        Call-ID: a84b4c76e66710\r\n\
        CSeq: 314159 INVITE\r\n\
        Content-Length: 0\r\n\r\n";

    #[test]
    fn test_ack_matches_invite_server_key() {
        let invite = parse(INVITE);
        let ack = parse(&INVITE.replace("INVITE sip", "ACK sip").replace("314159 INVITE", "314159 ACK"));

        let invite_key = TransactionKey::from_message(&invite).unwrap();
        let ack_key = TransactionKey::from_message(&ack).unwrap();
        assert_eq!(invite_key, ack_key);
        assert!(invite_key.is_server());
        assert_eq!(invite_key.sent_by, "pc33.atlanta.example.com:5060");
    }

    #[test]
    fn test_cancel_has_distinct_key() {
        let invite = parse(INVITE);
        let cancel = parse(&INVITE.replace("INVITE sip", "CANCEL sip").replace("314159 INVITE", "314159 CANCEL"));

        let invite_key = TransactionKey::from_message(&invite).unwrap();
        let cancel_key = TransactionKey::from_message(&cancel).unwrap();
        assert_ne!(invite_key, cancel_key);
        assert_eq!(cancel_key.with_method(Method::Invite), invite_key);
    }

    #[test]
    fn test_response_key_uses_cseq_method() {
        let response = parse(
            "SIP/2.0 180 Ringing\r\n\
             Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
             To: Bob <sip:bob@biloxi.example.com>;tag=a6c85cf\r\n\
             From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
             Call-ID: a84b4c76e66710\r\n\
             CSeq: 314159 INVITE\r\n\
             Content-Length: 0\r\n\r\n",
        );
        let key = TransactionKey::from_message(&response).unwrap();
        assert_eq!(key, TransactionKey::client("z9hG4bK776asdhds", Method::Invite));
        assert_eq!(key.to_string(), "z9hG4bK776asdhds:INVITE:client");
    }
}
