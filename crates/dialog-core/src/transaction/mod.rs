//! # Transaction layer
//!
//! Sans-IO implementations of the four RFC 3261 transaction state machines.
//! Each input (response, retransmitted request, ACK, fired timer, transport
//! failure) returns a list of [`TransactionAction`]s; the
//! [`DialogManager`](crate::manager::DialogManager) performs them.
//!
//! ```text
//! INVITE client      Calling ─1xx─▶ Proceeding ─2xx─▶ Accepted ─M─▶ Terminated
//!                       │              │
//!                       └──300-699─────┴──▶ Completed ─D─▶ Terminated
//!
//! INVITE server      Proceeding ─2xx─▶ Accepted ─ACK/L─▶ Terminated
//!                       └─300-699─▶ Completed ─ACK─▶ Confirmed ─I─▶ Terminated
//!                                       └─H─▶ Terminated
//!
//! non-INVITE         Trying ─1xx─▶ Proceeding ─final─▶ Completed ─K/J─▶ Terminated
//! ```

pub mod action;
pub mod client;
pub mod key;
pub mod server;
pub mod state;
pub mod timer;
pub mod utils;

pub use action::{Actions, TransactionAction};
pub use client::ClientTransaction;
pub use key::{TransactionKey, TransactionRole};
pub use server::ServerTransaction;
pub use state::{validate_transition, TransactionKind, TransactionOutcome, TransactionState};
pub use timer::{TimerFired, TimerManager, TimerSettings, TimerType};

/// Either side of a transaction, as stored in the transaction table
#[derive(Debug, Clone)]
pub enum Transaction {
    Client(ClientTransaction),
    Server(ServerTransaction),
}

impl Transaction {
    pub fn key(&self) -> &TransactionKey {
        match self {
            Transaction::Client(tx) => tx.key(),
            Transaction::Server(tx) => tx.key(),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Client(tx) => tx.kind(),
            Transaction::Server(tx) => tx.kind(),
        }
    }

    pub fn state(&self) -> TransactionState {
        match self {
            Transaction::Client(tx) => tx.state(),
            Transaction::Server(tx) => tx.state(),
        }
    }

    pub fn request(&self) -> &sipflow_sip_core::Request {
        match self {
            Transaction::Client(tx) => tx.request(),
            Transaction::Server(tx) => tx.request(),
        }
    }

    pub fn history(&self) -> &[TransactionState] {
        match self {
            Transaction::Client(tx) => tx.history(),
            Transaction::Server(tx) => tx.history(),
        }
    }

    pub fn on_timer(&mut self, timer: TimerType) -> crate::errors::DialogResult<Actions> {
        match self {
            Transaction::Client(tx) => tx.on_timer(timer),
            Transaction::Server(tx) => tx.on_timer(timer),
        }
    }

    pub fn on_transport_error(&mut self) -> crate::errors::DialogResult<Actions> {
        match self {
            Transaction::Client(tx) => tx.on_transport_error(),
            Transaction::Server(tx) => tx.on_transport_error(),
        }
    }
}
