use std::time::Duration;

use bytes::Bytes;
use sipflow_sip_core::Response;

use super::state::TransactionOutcome;
use super::timer::TimerType;

/// Side effects requested by a transaction state machine
///
/// Transactions never touch the transport or the clock themselves; the
/// manager carries these out in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    /// Put wire text on the transport
    Transmit(Bytes),
    /// Arm (or re-arm) a timer
    Schedule(TimerType, Duration),
    CancelTimer(TimerType),
    /// Hand a response up to the transaction user
    Deliver(Response),
    /// The transaction reached Terminated and can be removed
    Terminated(TransactionOutcome),
}

pub type Actions = Vec<TransactionAction>;
