//! Transaction kinds, states and the legal transition table.

use std::fmt;

use serde::{Deserialize, Serialize};
use sipflow_sip_core::Method;

use crate::errors::{DialogError, DialogResult};

/// The four RFC 3261 transaction state machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    InviteClient,
    NonInviteClient,
    InviteServer,
    NonInviteServer,
}

impl TransactionKind {
    pub fn client_for(method: &Method) -> Self {
        if method.is_invite() {
            TransactionKind::InviteClient
        } else {
            TransactionKind::NonInviteClient
        }
    }

    pub fn server_for(method: &Method) -> Self {
        if method.is_invite() {
            TransactionKind::InviteServer
        } else {
            TransactionKind::NonInviteServer
        }
    }

    /// State a freshly created transaction starts in
    pub fn initial_state(&self) -> TransactionState {
        match self {
            TransactionKind::InviteClient => TransactionState::Calling,
            TransactionKind::NonInviteClient => TransactionState::Trying,
            TransactionKind::InviteServer => TransactionState::Proceeding,
            TransactionKind::NonInviteServer => TransactionState::Trying,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, TransactionKind::InviteServer | TransactionKind::NonInviteServer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Calling,
    Trying,
    Proceeding,
    Completed,
    /// A 2xx was sent or received on an INVITE transaction
    Accepted,
    /// ACK received for a non-2xx final response
    Confirmed,
    Terminated,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a transaction ended, as reported to the delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionOutcome {
    /// Final 2xx response
    Accepted,
    /// Final 3xx-6xx response
    Rejected,
    /// Timer B, F or H expired
    Timeout,
    /// A send on the transport failed
    TransportError,
}

/// Checks that `from -> to` is in the transition table of `kind`
///
/// A failed check is a logic error; the caller must leave its state alone.
pub fn validate_transition(
    kind: TransactionKind,
    from: TransactionState,
    to: TransactionState,
) -> DialogResult<()> {
    use TransactionState::*;

    let legal = match kind {
        TransactionKind::InviteClient => matches!(
            (from, to),
            (Calling, Proceeding)
                | (Calling, Completed)
                | (Calling, Accepted)
                | (Calling, Terminated)
                | (Proceeding, Completed)
                | (Proceeding, Accepted)
                | (Proceeding, Terminated)
                | (Completed, Terminated)
                | (Accepted, Terminated)
        ),
        TransactionKind::NonInviteClient | TransactionKind::NonInviteServer => matches!(
            (from, to),
            (Trying, Proceeding)
                | (Trying, Completed)
                | (Trying, Terminated)
                | (Proceeding, Completed)
                | (Proceeding, Terminated)
                | (Completed, Terminated)
        ),
        TransactionKind::InviteServer => matches!(
            (from, to),
            (Proceeding, Completed)
                | (Proceeding, Accepted)
                | (Proceeding, Terminated)
                | (Completed, Confirmed)
                | (Completed, Terminated)
                | (Confirmed, Terminated)
                | (Accepted, Terminated)
        ),
    };

    if legal {
        Ok(())
    } else {
        Err(DialogError::IllegalStateTransition { kind, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionState::*;

    const ALL: [TransactionState; 7] =
        [Calling, Trying, Proceeding, Completed, Accepted, Confirmed, Terminated];

    #[test]
    fn test_terminated_is_final_for_every_kind() {
        for kind in [
            TransactionKind::InviteClient,
            TransactionKind::NonInviteClient,
            TransactionKind::InviteServer,
            TransactionKind::NonInviteServer,
        ] {
            for to in ALL {
                assert!(validate_transition(kind, Terminated, to).is_err());
            }
        }
    }

    #[test]
    fn test_invite_client_table() {
        let kind = TransactionKind::InviteClient;
        assert!(validate_transition(kind, Calling, Proceeding).is_ok());
        assert!(validate_transition(kind, Calling, Completed).is_ok());
        assert!(validate_transition(kind, Proceeding, Accepted).is_ok());
        assert!(validate_transition(kind, Accepted, Terminated).is_ok());
        assert!(validate_transition(kind, Completed, Proceeding).is_err());
        assert!(validate_transition(kind, Proceeding, Calling).is_err());
        assert!(validate_transition(kind, Calling, Trying).is_err());
        assert!(validate_transition(kind, Completed, Confirmed).is_err());
    }

    #[test]
    fn test_invite_server_table() {
        let kind = TransactionKind::InviteServer;
        assert!(validate_transition(kind, Proceeding, Completed).is_ok());
        assert!(validate_transition(kind, Completed, Confirmed).is_ok());
        assert!(validate_transition(kind, Confirmed, Terminated).is_ok());
        assert!(validate_transition(kind, Proceeding, Accepted).is_ok());
        assert!(validate_transition(kind, Accepted, Completed).is_err());
        assert!(validate_transition(kind, Completed, Accepted).is_err());
        assert!(validate_transition(kind, Trying, Proceeding).is_err());
    }

    #[test]
    fn test_non_invite_table() {
        for kind in [TransactionKind::NonInviteClient, TransactionKind::NonInviteServer] {
            assert!(validate_transition(kind, Trying, Completed).is_ok());
            assert!(validate_transition(kind, Proceeding, Completed).is_ok());
            assert!(validate_transition(kind, Completed, Proceeding).is_err());
            assert!(validate_transition(kind, Trying, Accepted).is_err());
            assert!(validate_transition(kind, Calling, Proceeding).is_err());
        }
    }

    #[test]
    fn test_error_reports_attempt() {
        let err = validate_transition(TransactionKind::NonInviteServer, Completed, Completed)
            .unwrap_err();
        assert_eq!(
            err,
            DialogError::IllegalStateTransition {
                kind: TransactionKind::NonInviteServer,
                from: Completed,
                to: Completed,
            }
        );
    }
}
