use thiserror::Error;

use crate::dialog::{DialogId, DialogState};
use crate::transaction::{TransactionKey, TransactionKind, TransactionState};

/// Result type for dialog-core operations
pub type DialogResult<T> = Result<T, DialogError>;

/// Errors raised by the transaction layer, the dialog layer and the router
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialogError {
    /// A transaction state machine was asked to leave its transition table
    #[error("Illegal {kind:?} transition {from:?} -> {to:?}")]
    IllegalStateTransition {
        kind: TransactionKind,
        from: TransactionState,
        to: TransactionState,
    },

    /// A dialog state machine was asked to leave its transition table
    #[error("Illegal dialog transition {from:?} -> {to:?}")]
    IllegalDialogTransition {
        from: DialogState,
        to: DialogState,
    },

    #[error("Transaction not found: {key}")]
    TransactionNotFound { key: TransactionKey },

    #[error("Transaction already exists: {key}")]
    TransactionExists { key: TransactionKey },

    #[error("Dialog not found: {id}")]
    DialogNotFound { id: String },

    /// In-dialog request whose CSeq does not advance the remote sequence
    #[error("CSeq {received} does not exceed {last} in dialog {id}")]
    SequenceViolation {
        id: DialogId,
        received: u32,
        last: u32,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The manager has been shut down
    #[error("Dialog manager closed")]
    Closed,
}

impl DialogError {
    pub fn protocol_error(message: &str) -> Self {
        DialogError::Protocol {
            message: message.to_string(),
        }
    }

    pub fn dialog_not_found(id: &str) -> Self {
        DialogError::DialogNotFound { id: id.to_string() }
    }

    pub fn invalid_state(message: &str) -> Self {
        DialogError::InvalidState(message.to_string())
    }

    /// True for errors caused by calling an operation on the wrong thing
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            DialogError::IllegalStateTransition { .. }
                | DialogError::IllegalDialogTransition { .. }
                | DialogError::TransactionNotFound { .. }
                | DialogError::TransactionExists { .. }
                | DialogError::DialogNotFound { .. }
                | DialogError::InvalidState(_)
                | DialogError::Closed
        )
    }
}

impl From<sipflow_sip_core::Error> for DialogError {
    fn from(error: sipflow_sip_core::Error) -> Self {
        DialogError::Parse(error.to_string())
    }
}

impl From<sipflow_sip_transport::Error> for DialogError {
    fn from(error: sipflow_sip_transport::Error) -> Self {
        DialogError::Transport(error.to_string())
    }
}
