//! Handle to a [`DialogManager`](super::DialogManager) running as an actor

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use sipflow_sip_core::{Method, Request, Response};

use crate::dialog::{Dialog, DialogId};
use crate::errors::{DialogError, DialogResult};
use crate::transaction::TransactionKey;

/// Requests to a running manager; each carries its reply channel
#[derive(Debug)]
pub enum ManagerCommand {
    SendRequest {
        request: Request,
        reply: oneshot::Sender<DialogResult<TransactionKey>>,
    },
    SendInDialog {
        dialog_id: DialogId,
        method: Method,
        /// Content type and body
        body: Option<(String, Bytes)>,
        reply: oneshot::Sender<DialogResult<TransactionKey>>,
    },
    SendResponse {
        key: TransactionKey,
        response: Response,
        reply: oneshot::Sender<DialogResult<()>>,
    },
    Cancel {
        key: TransactionKey,
        reply: oneshot::Sender<DialogResult<TransactionKey>>,
    },
    TerminateDialog {
        dialog_id: DialogId,
        reply: oneshot::Sender<DialogResult<Option<TransactionKey>>>,
    },
    GetDialog {
        dialog_id: DialogId,
        reply: oneshot::Sender<Option<Dialog>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front end for a manager started with
/// [`DialogManager::start`](super::DialogManager::start)
#[derive(Debug, Clone)]
pub struct DialogHandle {
    tx: mpsc::Sender<ManagerCommand>,
}

impl DialogHandle {
    pub(crate) fn new(tx: mpsc::Sender<ManagerCommand>) -> Self {
        DialogHandle { tx }
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand,
    ) -> DialogResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| DialogError::Closed)?;
        rx.await.map_err(|_| DialogError::Closed)
    }

    pub async fn send_request(&self, request: Request) -> DialogResult<TransactionKey> {
        self.call(|reply| ManagerCommand::SendRequest { request, reply })
            .await?
    }

    pub async fn send_in_dialog(
        &self,
        dialog_id: DialogId,
        method: Method,
        body: Option<(String, Bytes)>,
    ) -> DialogResult<TransactionKey> {
        self.call(|reply| ManagerCommand::SendInDialog {
            dialog_id,
            method,
            body,
            reply,
        })
        .await?
    }

    pub async fn send_response(&self, key: TransactionKey, response: Response) -> DialogResult<()> {
        self.call(|reply| ManagerCommand::SendResponse {
            key,
            response,
            reply,
        })
        .await?
    }

    pub async fn cancel(&self, key: TransactionKey) -> DialogResult<TransactionKey> {
        self.call(|reply| ManagerCommand::Cancel { key, reply }).await?
    }

    pub async fn terminate_dialog(&self, dialog_id: DialogId) -> DialogResult<Option<TransactionKey>> {
        self.call(|reply| ManagerCommand::TerminateDialog { dialog_id, reply })
            .await?
    }

    pub async fn dialog(&self, dialog_id: DialogId) -> DialogResult<Option<Dialog>> {
        self.call(|reply| ManagerCommand::GetDialog { dialog_id, reply })
            .await
    }

    /// Stops the manager; fails with `Closed` if it already stopped
    pub async fn shutdown(&self) -> DialogResult<()> {
        self.call(|reply| ManagerCommand::Shutdown { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
