//! Routing of inbound messages to transactions and dialogs
//!
//! Requests are matched first against the server transaction table
//! (retransmissions and non-2xx ACKs), then against the dialog table, and
//! finally handled according to the method's out-of-dialog policy. A 2xx
//! ACK has no transaction of its own and is routed through its dialog.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use sipflow_sip_core::{HeaderAccess, HeaderName, Message, Method, Request, Response, StatusCode};

use super::core::{DialogManager, TransactionEntry};
use crate::dialog::{Dialog, DialogId, DialogState, MethodProfile, OutOfDialogPolicy, ALLOWED_METHODS};
use crate::errors::DialogError;
use crate::transaction::utils::{create_response, generate_tag};
use crate::transaction::{ServerTransaction, Transaction, TransactionKey, TransactionState};

impl DialogManager {
    /// Handles one message received from the transport
    ///
    /// Unparseable input and messages matching nothing are logged and
    /// dropped.
    pub async fn handle_message(&mut self, data: Bytes) {
        if self.closed {
            trace!("message ignored after shutdown");
            return;
        }
        match Message::parse(&data) {
            Ok(Message::Request(request)) => self.handle_request(request).await,
            Ok(Message::Response(response)) => self.handle_response(response).await,
            Err(e) => {
                debug!(error = %e, len = data.len(), "dropping unparseable message");
                return;
            }
        }
        self.drain_upcalls().await;
    }

    async fn handle_response(&mut self, response: Response) {
        let key = match TransactionKey::from_response(&response) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "dropping response without transaction identity");
                return;
            }
        };

        let status = response.status.as_u16();
        let result = match self.transactions.get_mut(&key).map(|entry| &mut entry.tx) {
            Some(Transaction::Client(tx)) => tx.on_response(response),
            _ => {
                debug!(id = %key, status, "stray response dropped");
                return;
            }
        };
        match result {
            Ok(actions) => self.run_actions(&key, actions).await,
            Err(e) => warn!(id = %key, status, error = %e, "response rejected by transaction"),
        }
    }

    async fn handle_request(&mut self, request: Request) {
        let key = match TransactionKey::from_request(&request) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, method = %request.method, "dropping request without transaction identity");
                return;
            }
        };

        if request.method == Method::Ack {
            self.handle_ack(key, request).await;
            return;
        }

        let retransmission = match self.transactions.get_mut(&key).map(|entry| &mut entry.tx) {
            Some(Transaction::Server(tx)) => Some(tx.on_request(&request)),
            Some(Transaction::Client(_)) => Some(Vec::new()),
            None => None,
        };
        if let Some(actions) = retransmission {
            trace!(id = %key, "request matched an existing transaction");
            self.run_actions(&key, actions).await;
            return;
        }

        if request.method == Method::Cancel {
            self.handle_cancel(key, request).await;
            return;
        }

        match DialogId::for_inbound_request(&request) {
            Some(id) => self.handle_in_dialog(key, request, id).await,
            None => self.handle_out_of_dialog(key, request).await,
        }
    }

    /// Non-2xx ACKs match the INVITE server transaction; 2xx ACKs go to the
    /// dialog and end the Accepted INVITE server transaction
    async fn handle_ack(&mut self, key: TransactionKey, request: Request) {
        let non_2xx = match self.transactions.get_mut(&key).map(|entry| &mut entry.tx) {
            Some(Transaction::Server(tx)) if tx.state() == TransactionState::Completed => {
                Some(tx.on_ack())
            }
            _ => None,
        };
        if let Some(result) = non_2xx {
            match result {
                Ok(actions) => self.run_actions(&key, actions).await,
                Err(e) => warn!(id = %key, error = %e, "ACK rejected by transaction"),
            }
            return;
        }

        let Some(id) = DialogId::for_inbound_request(&request) else {
            debug!(id = %key, "ACK outside any dialog dropped");
            return;
        };
        let Some(dialog) = self.dialogs.get_mut(&id) else {
            debug!(dialog = %id, "ACK for unknown dialog dropped");
            return;
        };
        if let Err(e) = dialog.accept_remote_request(&request) {
            debug!(dialog = %id, error = %e, "ACK dropped");
            return;
        }
        let Ok(seq) = request.cseq().map(|cseq| cseq.seq) else {
            return;
        };

        let invite_key = self
            .transactions
            .iter()
            .find(|(candidate, entry)| {
                candidate.is_server()
                    && candidate.is_invite()
                    && entry.dialog.as_ref() == Some(&id)
                    && entry.tx.state() == TransactionState::Accepted
                    && entry.tx.request().cseq().map(|cseq| cseq.seq).ok() == Some(seq)
            })
            .map(|(candidate, _)| candidate.clone());

        let Some(invite_key) = invite_key else {
            trace!(dialog = %id, "ACK absorbed by dialog");
            return;
        };
        let result = match self.transactions.get_mut(&invite_key).map(|entry| &mut entry.tx) {
            Some(Transaction::Server(tx)) => tx.on_2xx_ack(),
            _ => return,
        };
        match result {
            Ok(actions) => self.run_actions(&invite_key, actions).await,
            Err(e) => warn!(id = %invite_key, error = %e, "ACK rejected by transaction"),
        }
    }

    /// CANCEL of a pending INVITE: 200 for the CANCEL, 487 for the INVITE
    async fn handle_cancel(&mut self, key: TransactionKey, request: Request) {
        let invite_key = key.with_method(Method::Invite);
        let (invite_state, tag) = match self.transactions.get_mut(&invite_key) {
            Some(entry) if matches!(entry.tx, Transaction::Server(_)) => (
                entry.tx.state(),
                entry.local_tag.get_or_insert_with(generate_tag).clone(),
            ),
            _ => {
                debug!(id = %key, "CANCEL matches no transaction");
                self.respond_stateless(&request, StatusCode::CallOrTransactionDoesNotExist)
                    .await;
                return;
            }
        };

        let ok = create_response(&request, StatusCode::Ok, Some(&tag));
        self.start_server_transaction(key, request, None, Some(tag.clone()), Some(ok))
            .await;

        if invite_state != TransactionState::Proceeding {
            return;
        }
        let cancelled = match self.transactions.get_mut(&invite_key) {
            Some(entry) => match &mut entry.tx {
                Transaction::Server(tx) => {
                    let terminated =
                        create_response(tx.request(), StatusCode::RequestTerminated, Some(&tag));
                    Some((tx.send_response(terminated), entry.dialog.clone()))
                }
                Transaction::Client(_) => None,
            },
            None => None,
        };
        match cancelled {
            Some((Ok(actions), dialog)) => {
                if let Some(id) = dialog {
                    if self.dialog_state(&id) == Some(DialogState::Early) {
                        self.end_dialog(&id);
                    }
                }
                self.run_actions(&invite_key, actions).await;
                self.delegate.on_request_cancelled(&invite_key);
            }
            Some((Err(e), _)) => warn!(id = %invite_key, error = %e, "cannot answer cancelled INVITE"),
            None => {}
        }
    }

    async fn handle_in_dialog(&mut self, key: TransactionKey, request: Request, id: DialogId) {
        let created = request.method == Method::Notify
            && !self.dialogs.contains_key(&id)
            && self.create_dialog_from_notify(&request, &id);
        let Some(dialog) = self.dialogs.get_mut(&id) else {
            debug!(dialog = %id, method = %request.method, "request for unknown dialog");
            self.respond_stateless(&request, StatusCode::CallOrTransactionDoesNotExist)
                .await;
            return;
        };

        let accepted = if created {
            Ok(())
        } else {
            dialog.accept_remote_request(&request)
        };
        match accepted {
            Ok(()) => {}
            Err(DialogError::SequenceViolation { received, last, .. }) => {
                warn!(dialog = %id, received, last, "out-of-order request discarded");
                self.respond_stateless(&request, StatusCode::ServerInternalError)
                    .await;
                return;
            }
            Err(e) => {
                debug!(dialog = %id, error = %e, "request refused by dialog");
                self.respond_stateless(&request, StatusCode::CallOrTransactionDoesNotExist)
                    .await;
                return;
            }
        }

        let local_tag = Some(id.local_tag.clone());
        if request.method == Method::Bye {
            let ok = create_response(&request, StatusCode::Ok, None);
            self.start_server_transaction(key, request, Some(id.clone()), local_tag, Some(ok))
                .await;
            self.end_dialog(&id);
        } else {
            self.start_server_transaction(
                key.clone(),
                request.clone(),
                Some(id.clone()),
                local_tag,
                None,
            )
            .await;
            self.delegate.on_in_dialog_request(&id, &key, &request);
        }
    }

    /// A NOTIFY may arrive before the 2xx to the SUBSCRIBE it belongs to;
    /// it then creates the subscriber's dialog itself
    fn create_dialog_from_notify(&mut self, notify: &Request, id: &DialogId) -> bool {
        let subscribe = self.transactions.iter().find_map(|(key, entry)| {
            let request = entry.tx.request();
            let pending = !key.is_server()
                && key.method == Method::Subscribe
                && entry.dialog.is_none()
                && request.call_id() == Some(id.call_id.as_str())
                && request.from_tag().as_deref() == Some(id.local_tag.as_str());
            pending.then(|| request.clone())
        });
        let Some(subscribe) = subscribe else {
            return false;
        };

        let dialog = self
            .local_target_for(&subscribe)
            .and_then(|target| Dialog::from_notify(&subscribe, notify, target));
        match dialog {
            Ok(dialog) => {
                debug!(dialog = %id, "NOTIFY created the subscription dialog");
                self.insert_dialog(dialog);
                true
            }
            Err(e) => {
                warn!(dialog = %id, error = %e, "NOTIFY did not create a dialog");
                false
            }
        }
    }

    async fn handle_out_of_dialog(&mut self, key: TransactionKey, request: Request) {
        match MethodProfile::for_method(&request.method).out_of_dialog {
            OutOfDialogPolicy::CreateDialog | OutOfDialogPolicy::Accept => {
                self.start_server_transaction(key.clone(), request.clone(), None, None, None)
                    .await;
                self.delegate.on_new_server_transaction(&key, &request);
            }
            OutOfDialogPolicy::Reject(status) => {
                debug!(id = %key, method = %request.method, status = status.as_u16(), "request rejected");
                self.respond_stateless(&request, status).await;
            }
            OutOfDialogPolicy::Drop => {
                debug!(id = %key, method = %request.method, "request dropped");
            }
        }
    }

    /// Creates a server transaction, optionally answering it straight away
    async fn start_server_transaction(
        &mut self,
        key: TransactionKey,
        request: Request,
        dialog: Option<DialogId>,
        local_tag: Option<String>,
        response: Option<Response>,
    ) {
        let mut tx = ServerTransaction::new(
            key.clone(),
            request,
            self.transport.is_reliable(),
            self.config.timers,
        );
        let mut actions = tx.start();
        if let Some(response) = response {
            match tx.send_response(response) {
                Ok(more) => actions.extend(more),
                Err(e) => warn!(id = %key, error = %e, "core response rejected"),
            }
        }
        self.transactions.insert(
            key.clone(),
            TransactionEntry {
                tx: Transaction::Server(tx),
                dialog,
                local_tag,
            },
        );
        self.run_actions(&key, actions).await;
    }

    /// Answers without creating a transaction
    async fn respond_stateless(&self, request: &Request, status: StatusCode) {
        let mut response = create_response(request, status, Some(&generate_tag()));
        if status == StatusCode::MethodNotAllowed {
            response.headers.push(HeaderName::Allow, ALLOWED_METHODS);
        }
        self.send_raw(response.to_bytes()).await;
    }
}
