//! Responses sent by the transaction user on server transactions

use tracing::{debug, warn};

use sipflow_sip_core::{HeaderAccess, HeaderName, Request, Response, StatusCode, Uri};

use super::core::DialogManager;
use crate::dialog::{Dialog, DialogId, DialogState, MethodProfile};
use crate::errors::{DialogError, DialogResult};
use crate::transaction::utils::{add_to_tag, create_response, generate_tag};
use crate::transaction::{Transaction, TransactionKey};

impl DialogManager {
    /// Response skeleton for the request of server transaction `key`
    ///
    /// Carries the transaction's To tag once one has been chosen.
    pub fn create_response(&self, key: &TransactionKey, status: StatusCode) -> DialogResult<Response> {
        let entry = self
            .transactions
            .get(key)
            .ok_or_else(|| DialogError::TransactionNotFound { key: key.clone() })?;
        Ok(create_response(
            entry.tx.request(),
            status,
            entry.local_tag.as_deref(),
        ))
    }

    /// Sends `response` on server transaction `key`
    ///
    /// Responses above 100 get the transaction's To tag, and one carrying a
    /// different tag is refused. Responses to dialog-forming requests get a
    /// Contact. A 1xx creates an early dialog, a 2xx creates or confirms one
    /// and a failure ends the early dialog.
    /// A response the transaction cannot send in its current state fails
    /// with `IllegalStateTransition` and changes nothing.
    pub async fn send_response(&mut self, key: &TransactionKey, mut response: Response) -> DialogResult<()> {
        self.ensure_open()?;
        let contact = self.config.contact_uri()?;

        let entry = self
            .transactions
            .get_mut(key)
            .ok_or_else(|| DialogError::TransactionNotFound { key: key.clone() })?;
        let Transaction::Server(tx) = &mut entry.tx else {
            return Err(DialogError::invalid_state(
                "Responses are sent on server transactions",
            ));
        };

        let request = tx.request().clone();
        let status = response.status;
        let forms_dialog = request.to_tag().is_none()
            && MethodProfile::for_method(&request.method).creates_dialog;

        let to_tag = if status.as_u16() > 100 {
            let tag = match response.to_tag() {
                Some(tag) if entry.local_tag.as_ref().is_some_and(|local| *local != tag) => {
                    return Err(DialogError::invalid_state(
                        "Response To tag differs from the transaction's tag",
                    ));
                }
                Some(tag) => entry.local_tag.get_or_insert(tag).clone(),
                None => {
                    let tag = entry.local_tag.get_or_insert_with(generate_tag).clone();
                    add_to_tag(&mut response, &tag);
                    tag
                }
            };
            Some(tag)
        } else {
            None
        };
        if forms_dialog && status.as_u16() > 100 && status.as_u16() < 300 && response.contact().is_none() {
            response
                .headers
                .push(HeaderName::Contact, format!("<{}>", contact));
        }

        let actions = tx.send_response(response.clone())?;
        let bound = entry.dialog.clone();
        debug!(id = %key, status = status.as_u16(), "response sent by transaction user");

        if let (true, Some(tag)) = (forms_dialog, to_tag) {
            self.update_uas_dialog(key, &request, &tag, &response, bound, contact);
        }
        self.run_actions(key, actions).await;
        self.drain_upcalls().await;
        Ok(())
    }

    fn update_uas_dialog(
        &mut self,
        key: &TransactionKey,
        request: &Request,
        tag: &str,
        response: &Response,
        bound: Option<DialogId>,
        contact: Uri,
    ) {
        let status = response.status;
        if status.is_provisional() || status.is_success() {
            if let Some(id) = bound.filter(|id| self.dialogs.contains_key(id)) {
                if status.is_success() {
                    self.confirm_dialog(&id);
                }
                return;
            }
            let state = if status.is_success() {
                DialogState::Confirmed
            } else {
                DialogState::Early
            };
            match Dialog::from_uas_request(request, tag, contact, state) {
                Ok(dialog) => {
                    if let Some(entry) = self.transactions.get_mut(key) {
                        entry.dialog = Some(dialog.id.clone());
                    }
                    self.insert_dialog(dialog);
                }
                Err(e) => warn!(id = %key, error = %e, "request did not create a dialog"),
            }
        } else if let Some(id) = bound {
            if self.dialog_state(&id) == Some(DialogState::Early) {
                self.end_dialog(&id);
            }
        }
    }
}
