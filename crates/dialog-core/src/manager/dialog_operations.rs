//! Dialog creation, confirmation and teardown driven by transactions

use bytes::Bytes;
use tracing::{debug, info, warn};

use sipflow_sip_core::{HeaderAccess, HeaderName, Method, Request, Response, Uri};

use super::core::{DialogManager, TransactionEntry};
use crate::config::DialogManagerConfig;
use crate::dialog::{Dialog, DialogId, DialogState, MethodProfile};
use crate::errors::{DialogError, DialogResult};
use crate::transaction::utils::generate_branch;
use crate::transaction::{TransactionKey, TransactionOutcome};

impl DialogManager {
    /// Sends `method` inside a dialog with the next local CSeq
    pub async fn send_in_dialog(
        &mut self,
        dialog_id: &DialogId,
        method: Method,
        body: Option<(String, Bytes)>,
    ) -> DialogResult<TransactionKey> {
        self.ensure_open()?;
        let dialog = self
            .dialogs
            .get_mut(dialog_id)
            .ok_or_else(|| DialogError::dialog_not_found(&dialog_id.to_string()))?;
        let mut request = dialog.create_request(method)?;
        if let Some((content_type, body)) = body {
            request = request.with_body(&content_type, body);
        }

        let key = self
            .send_request_inner(request, Some(dialog_id.clone()))
            .await?;
        self.drain_upcalls().await;
        Ok(key)
    }

    /// Ends a dialog
    ///
    /// A confirmed dialog is released with a BYE and ends when the BYE
    /// transaction completes; its key is returned. An early dialog is
    /// dropped locally.
    pub async fn terminate_dialog(
        &mut self,
        dialog_id: &DialogId,
    ) -> DialogResult<Option<TransactionKey>> {
        self.ensure_open()?;
        match self.dialog_state(dialog_id) {
            Some(DialogState::Confirmed) => self
                .send_in_dialog(dialog_id, Method::Bye, None)
                .await
                .map(Some),
            Some(_) => {
                self.end_dialog(dialog_id);
                Ok(None)
            }
            None => Err(DialogError::dialog_not_found(&dialog_id.to_string())),
        }
    }

    pub(crate) fn insert_dialog(&mut self, dialog: Dialog) {
        info!(id = %dialog.id, state = %dialog.state, "dialog created");
        self.delegate.on_dialog_created(&dialog);
        if dialog.is_confirmed() {
            self.delegate.on_dialog_confirmed(&dialog);
        }
        self.dialogs.insert(dialog.id.clone(), dialog);
    }

    /// Early -> Confirmed; anything else is left alone
    pub(crate) fn confirm_dialog(&mut self, id: &DialogId) {
        if let Some(dialog) = self.dialogs.get_mut(id) {
            if dialog.state == DialogState::Early && dialog.confirm().is_ok() {
                info!(id = %id, "dialog confirmed");
                self.delegate.on_dialog_confirmed(dialog);
            }
        }
    }

    /// Removes a dialog from the table and reports it terminated
    pub(crate) fn end_dialog(&mut self, id: &DialogId) {
        if let Some(mut dialog) = self.dialogs.remove(id) {
            dialog.terminate();
            info!(id = %id, "dialog terminated");
            self.delegate.on_dialog_terminated(id);
        }
    }

    pub(crate) fn local_target_for(&self, request: &Request) -> DialogResult<Uri> {
        match request.contact() {
            Some(contact) => Ok(contact.uri),
            None => self.config.contact_uri(),
        }
    }

    /// A response delivered by a client transaction
    pub(crate) async fn on_client_response(
        &mut self,
        key: &TransactionKey,
        request: &Request,
        dialog: Option<DialogId>,
        response: Response,
    ) {
        let status = response.status;
        if let Some(id) = dialog {
            if status.is_final() {
                self.on_in_dialog_final(request, &id, &response).await;
            }
            return;
        }

        if key.is_invite() {
            if status.is_provisional() {
                self.on_invite_provisional(key, request, &response);
            } else if status.is_success() {
                self.on_invite_success(key, request, &response).await;
            } else {
                self.end_early_dialogs(key);
            }
        } else if status.is_success() && MethodProfile::for_method(&request.method).creates_dialog {
            // SUBSCRIBE and REFER
            self.establish_uac_dialog(request, &response);
        }
    }

    fn on_invite_provisional(&mut self, key: &TransactionKey, request: &Request, response: &Response) {
        if response.status.as_u16() == 100 {
            return;
        }
        let Some(id) = DialogId::for_response(response) else {
            return;
        };
        if self.dialogs.contains_key(&id) {
            return;
        }

        let dialog = match self
            .local_target_for(request)
            .and_then(|target| Dialog::from_uac_response(request, response, target))
        {
            Ok(dialog) => dialog,
            Err(e) => {
                warn!(id = %key, error = %e, "provisional response did not create a dialog");
                return;
            }
        };
        if let Some(fork) = self.forks.get_mut(key) {
            fork.dialogs.push(id);
        }
        self.insert_dialog(dialog);
    }

    async fn on_invite_success(&mut self, key: &TransactionKey, request: &Request, response: &Response) {
        let Some(id) = DialogId::for_response(response) else {
            warn!(id = %key, "2xx without To tag dropped");
            return;
        };
        let invite_seq = match request.cseq() {
            Ok(cseq) => cseq.seq,
            Err(e) => {
                warn!(id = %key, error = %e, "INVITE without CSeq");
                return;
            }
        };

        let winner = self.forks.get(key).and_then(|fork| fork.confirmed.clone());
        match winner {
            Some(winner) if winner != id => {
                self.release_fork(key, request, response, id, invite_seq)
                    .await;
            }
            Some(_) if !self.dialogs.contains_key(&id) => {
                debug!(id = %id, "2xx for a dialog already ended");
            }
            _ => {
                if self.dialogs.contains_key(&id) {
                    self.confirm_dialog(&id);
                } else {
                    self.establish_uac_dialog(request, response);
                }
                if let Some(fork) = self.forks.get_mut(key) {
                    if !fork.dialogs.contains(&id) {
                        fork.dialogs.push(id.clone());
                    }
                    fork.confirmed = Some(id.clone());
                }
                self.send_dialog_ack(&id, invite_seq).await;
            }
        }
    }

    fn establish_uac_dialog(&mut self, request: &Request, response: &Response) {
        let dialog = self
            .local_target_for(request)
            .and_then(|target| Dialog::from_uac_response(request, response, target));
        match dialog {
            Ok(dialog) if !self.dialogs.contains_key(&dialog.id) => self.insert_dialog(dialog),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "response did not create a dialog"),
        }
    }

    /// ACKs a 2xx from a second fork branch and hangs that branch up
    async fn release_fork(
        &mut self,
        key: &TransactionKey,
        request: &Request,
        response: &Response,
        id: DialogId,
        invite_seq: u32,
    ) {
        let sent = self
            .forks
            .get(key)
            .and_then(|fork| fork.released.get(&id))
            .cloned();
        if let Some(ack) = sent {
            self.send_raw(ack.to_bytes()).await;
            return;
        }

        let mut dialog = match self
            .local_target_for(request)
            .and_then(|target| Dialog::from_uac_response(request, response, target))
        {
            Ok(dialog) => dialog,
            Err(e) => {
                warn!(id = %key, error = %e, "cannot release forked 2xx");
                return;
            }
        };
        info!(id = %id, "releasing second fork branch");

        let mut ack = dialog.create_ack(invite_seq);
        add_ack_headers(&self.config, &mut ack);
        self.send_raw(ack.to_bytes()).await;
        if let Some(fork) = self.forks.get_mut(key) {
            fork.released.insert(id.clone(), ack);
        }
        self.end_dialog(&id);

        match dialog.create_request(Method::Bye) {
            Ok(bye) => {
                if let Err(e) = self.send_request_inner(bye, None).await {
                    warn!(id = %id, error = %e, "BYE for released branch failed");
                }
            }
            Err(e) => warn!(id = %id, error = %e, "cannot build BYE for released branch"),
        }
    }

    /// Sends, or re-sends, the ACK for a 2xx to the INVITE with `invite_seq`
    pub(crate) async fn send_dialog_ack(&mut self, id: &DialogId, invite_seq: u32) {
        let Some(dialog) = self.dialogs.get_mut(id) else {
            return;
        };
        let ack = match dialog.ack_for(invite_seq) {
            Some(ack) => {
                debug!(id = %id, "re-sending ACK for retransmitted 2xx");
                ack.clone()
            }
            None => {
                let mut ack = dialog.create_ack(invite_seq);
                add_ack_headers(&self.config, &mut ack);
                dialog.record_ack(invite_seq, ack.clone());
                ack
            }
        };
        self.send_raw(ack.to_bytes()).await;
    }

    async fn on_in_dialog_final(&mut self, request: &Request, id: &DialogId, response: &Response) {
        let status = response.status;
        if status.is_success() {
            if let Some(dialog) = self.dialogs.get_mut(id) {
                dialog.refresh_from_response(&request.method, response);
            }
            if request.method == Method::Bye {
                self.end_dialog(id);
            } else if request.method.is_invite() {
                if let Ok(cseq) = request.cseq() {
                    self.send_dialog_ack(id, cseq.seq).await;
                }
            }
        } else if matches!(status.as_u16(), 408 | 481) {
            debug!(id = %id, status = status.as_u16(), "dialog gone at the peer");
            self.end_dialog(id);
        }
    }

    fn end_early_dialogs(&mut self, key: &TransactionKey) {
        let early: Vec<DialogId> = self
            .forks
            .get(key)
            .map(|fork| fork.dialogs.clone())
            .unwrap_or_default();
        for id in early {
            if self.dialog_state(&id) == Some(DialogState::Early) {
                self.end_dialog(&id);
            }
        }
    }

    /// Dialog effects of a transaction leaving the table
    pub(crate) fn on_transaction_terminated(
        &mut self,
        key: TransactionKey,
        entry: TransactionEntry,
        outcome: TransactionOutcome,
    ) {
        debug!(id = %key, ?outcome, "transaction terminated");
        self.delegate.on_transaction_terminated(&key, outcome);

        if self.forks.contains_key(&key) {
            // early dialogs that never saw a 2xx end with their INVITE
            self.end_early_dialogs(&key);
            self.forks.remove(&key);
        }

        if let Some(id) = entry.dialog {
            let failed = matches!(
                outcome,
                TransactionOutcome::Timeout | TransactionOutcome::TransportError
            );
            let method = &entry.tx.request().method;
            let early = self.dialog_state(&id) == Some(DialogState::Early);
            if failed && (*method == Method::Bye || (method.is_invite() && early)) {
                self.end_dialog(&id);
            }
        }
    }
}

/// Via and Max-Forwards for an ACK to a 2xx, which has its own branch
fn add_ack_headers(config: &DialogManagerConfig, ack: &mut Request) {
    ack.headers.insert_first(
        HeaderName::Via,
        format!(
            "SIP/2.0/{} {};branch={}",
            config.transport_name,
            config.sent_by,
            generate_branch()
        ),
    );
    ack.headers
        .push(HeaderName::MaxForwards, config.max_forwards.to_string());
}
