//! Shared harness: a manager on one end of a memory transport pair, with
//! the test playing the peer on the other end.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use sipflow_dialog_core::prelude::*;
use sipflow_dialog_core::transaction::utils::add_to_tag;
use sipflow_sip_transport::{MemoryTransport, TransportEvent};

pub const LOCAL_HOST: &str = "host.example.com";
pub const PEER_CONTACT: &str = "sip:bob@192.0.2.4";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub manager: DialogManager,
    /// The manager's own endpoint, for failure injection
    pub transport: MemoryTransport,
    pub events: mpsc::UnboundedReceiver<CoreEvent>,
    peer_rx: mpsc::Receiver<TransportEvent>,
    _own_rx: mpsc::Receiver<TransportEvent>,
    _peer: MemoryTransport,
}

impl Harness {
    pub fn new(reliable: bool) -> Self {
        Self::with_config(reliable, config())
    }

    pub fn with_config(reliable: bool, config: DialogManagerConfig) -> Self {
        init_tracing();
        let ((transport, own_rx), (peer, peer_rx)) = MemoryTransport::pair(reliable);
        let (delegate, events) = EventChannelDelegate::new();
        let manager = DialogManager::new(config, Arc::new(transport.clone()), Arc::new(delegate))
            .expect("valid config");
        Harness {
            manager,
            transport,
            events,
            peer_rx,
            _own_rx: own_rx,
            _peer: peer,
        }
    }

    /// Messages the manager has put on the wire since the last call
    pub fn sent(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(event) = self.peer_rx.try_recv() {
            if let TransportEvent::MessageReceived { data } = event {
                messages.push(Message::parse(&data).expect("manager sent valid SIP"));
            }
        }
        messages
    }

    pub fn sent_requests(&mut self) -> Vec<Request> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                Message::Request(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn sent_responses(&mut self) -> Vec<Response> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                Message::Response(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Core events reported since the last call
    pub fn events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn receive(&mut self, message: impl Into<Message>) {
        let message: Message = message.into();
        self.manager.handle_message(message.to_bytes()).await;
    }

    pub async fn receive_text(&mut self, text: &str) {
        self.manager
            .handle_message(bytes::Bytes::copy_from_slice(text.as_bytes()))
            .await;
    }

    /// Handles timers until none is armed
    pub async fn run_timers(&mut self) {
        while self.manager.poll_timer().await {}
    }
}

pub fn config() -> DialogManagerConfig {
    DialogManagerConfig::new(LOCAL_HOST)
        .with_local_contact(format!("sip:local@{}", LOCAL_HOST).parse().expect("uri"))
        .with_user_agent("sipflow-test")
}

/// Out-of-dialog request from the manager's side
pub fn outgoing(method: Method) -> Request {
    SimpleRequestBuilder::new(method, "sip:bob@biloxi.example.com")
        .unwrap()
        .from("Alice", "sip:alice@atlanta.example.com", None)
        .unwrap()
        .to("Bob", "sip:bob@biloxi.example.com", None)
        .unwrap()
        .build()
}

/// The peer's response to `request`, with a To tag and Contact when given
pub fn respond(request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
    let mut response = Response::from_request(request, status);
    if let Some(tag) = to_tag {
        add_to_tag(&mut response, tag);
        if !status.is_error() && status.as_u16() > 100 {
            response
                .headers
                .push(HeaderName::Contact, format!("<{}>", PEER_CONTACT));
        }
    }
    response
}

/// Request arriving from the peer
pub fn incoming(method: &str, branch: &str, cseq: u32, to_tag: Option<&str>) -> Request {
    incoming_with(method, branch, cseq, to_tag, "")
}

pub fn incoming_with(
    method: &str,
    branch: &str,
    cseq: u32,
    to_tag: Option<&str>,
    extra_headers: &str,
) -> Request {
    let to_tag = to_tag.map(|t| format!(";tag={}", t)).unwrap_or_default();
    let contact = if extra_headers.contains("Contact:") {
        ""
    } else {
        "Contact: <sip:alice@pc33.atlanta.example.com>\r\n"
    };
    let text = format!(
        "{method} sip:local@{host} SIP/2.0\r\n\
         Via: SIP/2.0/UDP pc33.atlanta.example.com;branch={branch}\r\n\
         Max-Forwards: 70\r\n\
         To: <sip:local@{host}>{to_tag}\r\n\
         From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
         Call-ID: a84b4c76e66710@pc33.atlanta.example.com\r\n\
         CSeq: {cseq} {method}\r\n\
         {contact}\
         {extra_headers}\
         Content-Length: 0\r\n\r\n",
        host = LOCAL_HOST,
    );
    match Message::parse(text.as_bytes()).expect("valid test request") {
        Message::Request(request) => request,
        Message::Response(_) => unreachable!(),
    }
}

pub fn created_dialogs(events: &[CoreEvent]) -> Vec<Dialog> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::DialogCreated { dialog } => Some(dialog.clone()),
            _ => None,
        })
        .collect()
}

pub fn terminated_outcomes(events: &[CoreEvent]) -> Vec<(TransactionKey, TransactionOutcome)> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::TransactionTerminated { key, outcome } => Some((key.clone(), *outcome)),
            _ => None,
        })
        .collect()
}

pub fn new_server_transaction(events: &[CoreEvent]) -> Option<TransactionKey> {
    events.iter().find_map(|e| match e {
        CoreEvent::NewServerTransaction { key, .. } => Some(key.clone()),
        _ => None,
    })
}
