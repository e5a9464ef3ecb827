//! Core DialogManager implementation

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sipflow_sip_core::{Request, Response};
use sipflow_sip_transport::{Transport, TransportEvent};

use super::handle::{DialogHandle, ManagerCommand};
use crate::config::DialogManagerConfig;
use crate::dialog::{Dialog, DialogId, DialogState};
use crate::errors::{DialogError, DialogResult};
use crate::events::CoreDelegate;
use crate::transaction::{
    Transaction, TransactionKey, TransactionOutcome, TransactionState, TimerFired, TimerManager,
};

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// A live transaction and what it is bound to
#[derive(Debug)]
pub(crate) struct TransactionEntry {
    pub tx: Transaction,
    /// Dialog this transaction runs in, or the dialog it created
    pub dialog: Option<DialogId>,
    /// To tag used in every response of a server transaction
    pub local_tag: Option<String>,
}

/// Dialogs created by one outgoing INVITE
#[derive(Debug, Default)]
pub(crate) struct ForkSet {
    pub dialogs: Vec<DialogId>,
    pub confirmed: Option<DialogId>,
    /// ACKs sent for 2xx responses from branches released with BYE
    pub released: HashMap<DialogId, Request>,
}

/// Work produced by transaction actions, handled after the actions ran
#[derive(Debug)]
pub(crate) enum Upcall {
    Response {
        key: TransactionKey,
        request: Request,
        dialog: Option<DialogId>,
        response: Response,
    },
    Terminated {
        key: TransactionKey,
        entry: TransactionEntry,
        outcome: TransactionOutcome,
    },
}

/// RFC 3261 transaction, dialog and routing core
pub struct DialogManager {
    pub(crate) config: DialogManagerConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) delegate: Arc<dyn CoreDelegate>,
    pub(crate) transactions: HashMap<TransactionKey, TransactionEntry>,
    pub(crate) dialogs: HashMap<DialogId, Dialog>,
    /// Keyed by the INVITE client transaction
    pub(crate) forks: HashMap<TransactionKey, ForkSet>,
    pub(crate) timers: TimerManager,
    pub(crate) timer_rx: Option<mpsc::UnboundedReceiver<TimerFired>>,
    pub(crate) upcalls: VecDeque<Upcall>,
    pub(crate) closed: bool,
}

impl DialogManager {
    /// Creates a manager sending through `transport` and reporting to `delegate`
    ///
    /// Must be called inside a tokio runtime; timers run as tokio tasks.
    pub fn new(
        config: DialogManagerConfig,
        transport: Arc<dyn Transport>,
        delegate: Arc<dyn CoreDelegate>,
    ) -> DialogResult<Self> {
        config.validate()?;
        let (timers, timer_rx) = TimerManager::new();
        info!(
            sent_by = %config.sent_by,
            transport = %config.transport_name,
            reliable = transport.is_reliable(),
            "dialog manager created"
        );
        Ok(DialogManager {
            config,
            transport,
            delegate,
            transactions: HashMap::new(),
            dialogs: HashMap::new(),
            forks: HashMap::new(),
            timers,
            timer_rx: Some(timer_rx),
            upcalls: VecDeque::new(),
            closed: false,
        })
    }

    pub fn config(&self) -> &DialogManagerConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn dialog(&self, id: &DialogId) -> Option<&Dialog> {
        self.dialogs.get(id)
    }

    pub fn dialog_state(&self, id: &DialogId) -> Option<DialogState> {
        self.dialogs.get(id).map(|dialog| dialog.state)
    }

    pub fn dialog_ids(&self) -> Vec<DialogId> {
        self.dialogs.keys().cloned().collect()
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    pub fn transaction_state(&self, key: &TransactionKey) -> Option<TransactionState> {
        self.transactions.get(key).map(|entry| entry.tx.state())
    }

    /// States entered by a live transaction, oldest first
    pub fn transaction_history(&self, key: &TransactionKey) -> Option<Vec<TransactionState>> {
        self.transactions
            .get(key)
            .map(|entry| entry.tx.history().to_vec())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Dialog a live transaction is bound to
    pub fn transaction_dialog(&self, key: &TransactionKey) -> Option<&DialogId> {
        self.transactions.get(key).and_then(|entry| entry.dialog.as_ref())
    }

    pub fn armed_timer_count(&self) -> usize {
        self.timers.armed_count()
    }

    pub(crate) fn ensure_open(&self) -> DialogResult<()> {
        if self.closed {
            Err(DialogError::Closed)
        } else {
            Ok(())
        }
    }

    /// Handles a fired timer; stale and orphaned timers are ignored
    pub async fn handle_timer(&mut self, fired: TimerFired) {
        if self.closed || !self.timers.accept(&fired) {
            debug!(id = %fired.key, timer = %fired.timer, "stale timer ignored");
            return;
        }
        let Some(entry) = self.transactions.get_mut(&fired.key) else {
            debug!(id = %fired.key, timer = %fired.timer, "timer for removed transaction");
            return;
        };
        match entry.tx.on_timer(fired.timer) {
            Ok(actions) => self.run_actions(&fired.key, actions).await,
            Err(e) => warn!(id = %fired.key, error = %e, "timer rejected by transaction"),
        }
        self.drain_upcalls().await;
    }

    /// Waits for the next timer and handles it
    ///
    /// Returns false when no timer is armed or the manager has been started
    /// as an actor.
    pub async fn poll_timer(&mut self) -> bool {
        if self.timers.armed_count() == 0 {
            return false;
        }
        let fired = match self.timer_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        match fired {
            Some(fired) => {
                self.handle_timer(fired).await;
                true
            }
            None => false,
        }
    }

    /// Cancels every timer, drops both tables and ignores later input
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.timers.shutdown();
        info!(
            transactions = self.transactions.len(),
            dialogs = self.dialogs.len(),
            "dialog manager shut down"
        );
        self.transactions.clear();
        self.dialogs.clear();
        self.forks.clear();
        self.upcalls.clear();
    }

    /// Spawns the manager as an actor reading `events` from its transport
    pub fn start(
        self,
        events: mpsc::Receiver<TransportEvent>,
    ) -> (DialogHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(self.run(events, command_rx));
        (DialogHandle::new(command_tx), task)
    }

    /// Serializes transport events, timers and commands until shutdown
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<ManagerCommand>,
    ) {
        let Some(mut timer_rx) = self.timer_rx.take() else {
            warn!("dialog manager already running");
            return;
        };
        info!("dialog manager running");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::MessageReceived { data }) => self.handle_message(data).await,
                    Some(TransportEvent::Error { error }) => {
                        warn!(%error, "transport reported an error");
                        self.delegate.on_transport_error(&error);
                    }
                    Some(TransportEvent::Closed) | None => {
                        info!("transport closed, stopping dialog manager");
                        break;
                    }
                },
                Some(fired) = timer_rx.recv() => self.handle_timer(fired).await,
                command = commands.recv() => match command {
                    Some(ManagerCommand::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all handles dropped, stopping dialog manager");
                        break;
                    }
                },
            }
        }

        self.shutdown();
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::SendRequest { request, reply } => {
                let _ = reply.send(self.send_request(request).await);
            }
            ManagerCommand::SendInDialog {
                dialog_id,
                method,
                body,
                reply,
            } => {
                let _ = reply.send(self.send_in_dialog(&dialog_id, method, body).await);
            }
            ManagerCommand::SendResponse {
                key,
                response,
                reply,
            } => {
                let _ = reply.send(self.send_response(&key, response).await);
            }
            ManagerCommand::Cancel { key, reply } => {
                let _ = reply.send(self.cancel(&key).await);
            }
            ManagerCommand::TerminateDialog { dialog_id, reply } => {
                let _ = reply.send(self.terminate_dialog(&dialog_id).await);
            }
            ManagerCommand::GetDialog { dialog_id, reply } => {
                let _ = reply.send(self.dialogs.get(&dialog_id).cloned());
            }
            ManagerCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }
}

impl std::fmt::Debug for DialogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogManager")
            .field("sent_by", &self.config.sent_by)
            .field("transactions", &self.transactions.len())
            .field("dialogs", &self.dialogs.len())
            .field("closed", &self.closed)
            .finish()
    }
}
