//! Upward interface from the core to the transaction user
//!
//! The manager reports through a [`CoreDelegate`] injected at construction.
//! Four callbacks are required; the rest default to no-ops. Hosts that
//! prefer a stream can use [`EventChannelDelegate`], which turns every call
//! into a [`CoreEvent`].

use tokio::sync::mpsc;
use tracing::trace;

use sipflow_sip_core::{Request, Response};

use crate::dialog::{Dialog, DialogId};
use crate::transaction::{TransactionKey, TransactionOutcome};

/// Callbacks from the [`DialogManager`](crate::manager::DialogManager)
///
/// Called from the manager's single flow of control; implementations
/// should return quickly and hand longer work to their own tasks.
pub trait CoreDelegate: Send + Sync {
    /// An inbound request outside any dialog created a server transaction;
    /// answer it with `send_response(key, ..)`
    fn on_new_server_transaction(&self, key: &TransactionKey, request: &Request);

    fn on_dialog_created(&self, dialog: &Dialog);

    fn on_transaction_terminated(&self, key: &TransactionKey, outcome: TransactionOutcome);

    fn on_transport_error(&self, error: &str);

    /// Any response delivered by a client transaction
    fn on_response(&self, _key: &TransactionKey, _response: &Response) {}

    /// A request inside an existing dialog (other than BYE and ACK)
    fn on_in_dialog_request(&self, _dialog: &DialogId, _key: &TransactionKey, _request: &Request) {}

    fn on_dialog_confirmed(&self, _dialog: &Dialog) {}

    fn on_dialog_terminated(&self, _dialog: &DialogId) {}

    /// A pending INVITE server transaction was answered 487 after a CANCEL
    fn on_request_cancelled(&self, _key: &TransactionKey) {}
}

/// Everything a [`CoreDelegate`] can be told, as a value
#[derive(Debug, Clone)]
pub enum CoreEvent {
    NewServerTransaction {
        key: TransactionKey,
        request: Request,
    },
    DialogCreated {
        dialog: Dialog,
    },
    TransactionTerminated {
        key: TransactionKey,
        outcome: TransactionOutcome,
    },
    TransportError {
        error: String,
    },
    Response {
        key: TransactionKey,
        response: Response,
    },
    InDialogRequest {
        dialog_id: DialogId,
        key: TransactionKey,
        request: Request,
    },
    DialogConfirmed {
        dialog: Dialog,
    },
    DialogTerminated {
        dialog_id: DialogId,
    },
    RequestCancelled {
        key: TransactionKey,
    },
}

/// Delegate forwarding every callback as a [`CoreEvent`]
#[derive(Debug, Clone)]
pub struct EventChannelDelegate {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl EventChannelDelegate {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventChannelDelegate { tx }, rx)
    }

    fn emit(&self, event: CoreEvent) {
        if self.tx.send(event).is_err() {
            trace!("core event dropped, receiver closed");
        }
    }
}

impl CoreDelegate for EventChannelDelegate {
    fn on_new_server_transaction(&self, key: &TransactionKey, request: &Request) {
        self.emit(CoreEvent::NewServerTransaction {
            key: key.clone(),
            request: request.clone(),
        });
    }

    fn on_dialog_created(&self, dialog: &Dialog) {
        self.emit(CoreEvent::DialogCreated {
            dialog: dialog.clone(),
        });
    }

    fn on_transaction_terminated(&self, key: &TransactionKey, outcome: TransactionOutcome) {
        self.emit(CoreEvent::TransactionTerminated {
            key: key.clone(),
            outcome,
        });
    }

    fn on_transport_error(&self, error: &str) {
        self.emit(CoreEvent::TransportError {
            error: error.to_string(),
        });
    }

    fn on_response(&self, key: &TransactionKey, response: &Response) {
        self.emit(CoreEvent::Response {
            key: key.clone(),
            response: response.clone(),
        });
    }

    fn on_in_dialog_request(&self, dialog: &DialogId, key: &TransactionKey, request: &Request) {
        self.emit(CoreEvent::InDialogRequest {
            dialog_id: dialog.clone(),
            key: key.clone(),
            request: request.clone(),
        });
    }

    fn on_dialog_confirmed(&self, dialog: &Dialog) {
        self.emit(CoreEvent::DialogConfirmed {
            dialog: dialog.clone(),
        });
    }

    fn on_dialog_terminated(&self, dialog: &DialogId) {
        self.emit(CoreEvent::DialogTerminated {
            dialog_id: dialog.clone(),
        });
    }

    fn on_request_cancelled(&self, key: &TransactionKey) {
        self.emit(CoreEvent::RequestCancelled { key: key.clone() });
    }
}
