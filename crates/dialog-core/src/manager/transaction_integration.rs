//! Client transactions and execution of transaction actions

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, warn};

use sipflow_sip_core::{HeaderAccess, HeaderName, Method, Request};

use super::core::{DialogManager, ForkSet, TransactionEntry, Upcall};
use crate::dialog::{DialogId, MethodProfile};
use crate::errors::{DialogError, DialogResult};
use crate::transaction::utils::{create_cancel, generate_branch, generate_call_id, generate_tag};
use crate::transaction::{
    Actions, ClientTransaction, Transaction, TransactionAction, TransactionKey, TransactionState,
};

impl DialogManager {
    /// Sends a request outside any dialog in a new client transaction
    ///
    /// Via, Max-Forwards, User-Agent, the From tag, Call-ID and Contact are
    /// filled in when missing. ACK and CANCEL are built by the core and are
    /// refused here.
    pub async fn send_request(&mut self, request: Request) -> DialogResult<TransactionKey> {
        self.ensure_open()?;
        let key = self.send_request_inner(request, None).await?;
        self.drain_upcalls().await;
        Ok(key)
    }

    /// Sends a CANCEL for the INVITE client transaction `invite_key`
    ///
    /// Only allowed while the INVITE is in Proceeding. Returns the key of the
    /// CANCEL's own transaction.
    pub async fn cancel(&mut self, invite_key: &TransactionKey) -> DialogResult<TransactionKey> {
        self.ensure_open()?;
        let entry = self
            .transactions
            .get(invite_key)
            .ok_or_else(|| DialogError::TransactionNotFound {
                key: invite_key.clone(),
            })?;
        let Transaction::Client(invite) = &entry.tx else {
            return Err(DialogError::invalid_state("Only client INVITEs can be cancelled"));
        };
        if !invite_key.is_invite() || invite.state() != TransactionState::Proceeding {
            return Err(DialogError::invalid_state(
                "CANCEL is only sent for an INVITE in Proceeding",
            ));
        }

        let cancel = create_cancel(invite.request())?;
        let key = invite_key.with_method(Method::Cancel);
        self.start_client_transaction(key.clone(), cancel, None)
            .await?;
        self.drain_upcalls().await;
        Ok(key)
    }

    pub(crate) async fn send_request_inner(
        &mut self,
        mut request: Request,
        dialog: Option<DialogId>,
    ) -> DialogResult<TransactionKey> {
        if matches!(request.method, Method::Ack | Method::Cancel) {
            return Err(DialogError::invalid_state(
                "ACK and CANCEL are generated by the core",
            ));
        }

        self.prepare_request(&mut request, dialog.is_some())?;
        let branch = request
            .top_via()?
            .branch()
            .ok_or_else(|| DialogError::protocol_error("Top Via has no branch"))?
            .to_string();
        let key = TransactionKey::client(branch, request.method.clone());

        let forms_dialog = dialog.is_none()
            && request.method.is_invite()
            && request.to_tag().is_none();
        self.start_client_transaction(key.clone(), request, dialog)
            .await?;
        if forms_dialog {
            self.forks.insert(key.clone(), ForkSet::default());
        }
        Ok(key)
    }

    async fn start_client_transaction(
        &mut self,
        key: TransactionKey,
        request: Request,
        dialog: Option<DialogId>,
    ) -> DialogResult<()> {
        if self.transactions.contains_key(&key) {
            return Err(DialogError::TransactionExists { key });
        }

        debug!(id = %key, method = %request.method, uri = %request.uri, "starting client transaction");
        let mut tx = ClientTransaction::new(
            key.clone(),
            request,
            self.transport.is_reliable(),
            self.config.timers,
        );
        let actions = tx.start();
        self.transactions.insert(
            key.clone(),
            TransactionEntry {
                tx: Transaction::Client(tx),
                dialog,
                local_tag: None,
            },
        );
        self.run_actions(&key, actions).await;
        Ok(())
    }

    /// Fills in the headers the core is responsible for
    fn prepare_request(&self, request: &mut Request, in_dialog: bool) -> DialogResult<()> {
        if !request.headers.contains(&HeaderName::Via) {
            request.headers.insert_first(
                HeaderName::Via,
                format!(
                    "SIP/2.0/{} {};branch={}",
                    self.config.transport_name,
                    self.config.sent_by,
                    generate_branch()
                ),
            );
        }
        if !request.headers.contains(&HeaderName::MaxForwards) {
            request
                .headers
                .push(HeaderName::MaxForwards, self.config.max_forwards.to_string());
        }
        if let Some(agent) = &self.config.user_agent {
            if !request.headers.contains(&HeaderName::UserAgent) {
                request.headers.push(HeaderName::UserAgent, agent.clone());
            }
        }
        if !request.headers.contains(&HeaderName::CallId) {
            request
                .headers
                .push(HeaderName::CallId, generate_call_id(&self.config.sent_by));
        }
        if !request.headers.contains(&HeaderName::CSeq) {
            request
                .headers
                .push(HeaderName::CSeq, format!("1 {}", request.method));
        }

        let mut from = request.from_address()?;
        if from.tag().is_none() {
            from.set_tag(&generate_tag());
            request.headers.set(HeaderName::From, from.to_string());
        }
        request.to_address()?;

        if !in_dialog
            && MethodProfile::for_method(&request.method).creates_dialog
            && request.contact().is_none()
        {
            request
                .headers
                .push(HeaderName::Contact, format!("<{}>", self.config.contact_uri()?));
        }
        Ok(())
    }

    /// Carries out transaction actions in order
    ///
    /// A failed send terminates the owning transaction with a transport
    /// error. Deliveries and terminations are queued as upcalls.
    pub(crate) async fn run_actions(&mut self, key: &TransactionKey, actions: Actions) {
        let mut queue: VecDeque<TransactionAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                TransactionAction::Transmit(data) => {
                    if let Err(error) = self.transport.send(data).await {
                        warn!(id = %key, %error, "send failed");
                        self.delegate.on_transport_error(&error.to_string());
                        if let Some(entry) = self.transactions.get_mut(key) {
                            match entry.tx.on_transport_error() {
                                Ok(more) => queue.extend(more),
                                Err(e) => warn!(id = %key, error = %e, "transport failure rejected"),
                            }
                        }
                    }
                }
                TransactionAction::Schedule(timer, delay) => {
                    if self.transactions.contains_key(key) {
                        self.timers.schedule(key, timer, delay);
                    }
                }
                TransactionAction::CancelTimer(timer) => self.timers.cancel(key, timer),
                TransactionAction::Deliver(response) => {
                    if let Some(entry) = self.transactions.get(key) {
                        self.upcalls.push_back(Upcall::Response {
                            key: key.clone(),
                            request: entry.tx.request().clone(),
                            dialog: entry.dialog.clone(),
                            response,
                        });
                    }
                }
                TransactionAction::Terminated(outcome) => {
                    self.timers.cancel_all(key);
                    if let Some(entry) = self.transactions.remove(key) {
                        debug!(id = %key, ?outcome, "transaction removed");
                        self.upcalls.push_back(Upcall::Terminated {
                            key: key.clone(),
                            entry,
                            outcome,
                        });
                    }
                }
            }
        }
    }

    /// Handles queued upcalls, including any their handlers produce
    pub(crate) async fn drain_upcalls(&mut self) {
        while let Some(upcall) = self.upcalls.pop_front() {
            match upcall {
                Upcall::Response {
                    key,
                    request,
                    dialog,
                    response,
                } => {
                    self.delegate.on_response(&key, &response);
                    self.on_client_response(&key, &request, dialog, response)
                        .await;
                }
                Upcall::Terminated {
                    key,
                    entry,
                    outcome,
                } => self.on_transaction_terminated(key, entry, outcome),
            }
        }
    }

    /// Puts bytes on the transport outside any transaction
    pub(crate) async fn send_raw(&self, data: Bytes) -> bool {
        match self.transport.send(data).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "send failed");
                self.delegate.on_transport_error(&error.to_string());
                false
            }
        }
    }
}
