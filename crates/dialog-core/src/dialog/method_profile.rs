//! Per-method behavior as data.
//!
//! Rather than one handler type per SIP method, the router consults a
//! [`MethodProfile`] to decide whether a request forms a dialog, refreshes
//! the remote target, or must be rejected outside a dialog.

use sipflow_sip_core::{Method, StatusCode};

/// What the router does with a request that matches no dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfDialogPolicy {
    /// New server transaction; a 101-299 response creates a dialog
    CreateDialog,
    /// New server transaction handed to the delegate
    Accept,
    /// Stateless rejection
    Reject(StatusCode),
    /// Discarded without a response
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodProfile {
    pub creates_dialog: bool,
    /// Contact in the request (or its 2xx) replaces the remote target
    pub refreshes_target: bool,
    pub out_of_dialog: OutOfDialogPolicy,
}

/// Methods this core answers, for `Allow`
pub const ALLOWED_METHODS: &str =
    "INVITE, ACK, CANCEL, BYE, OPTIONS, PRACK, UPDATE, INFO, MESSAGE, SUBSCRIBE, NOTIFY, REFER";

impl MethodProfile {
    pub fn for_method(method: &Method) -> Self {
        use OutOfDialogPolicy::*;

        let (creates_dialog, refreshes_target, out_of_dialog) = match method {
            Method::Invite | Method::Subscribe | Method::Refer => (true, true, CreateDialog),
            Method::Update => (false, true, Reject(StatusCode::CallOrTransactionDoesNotExist)),
            Method::Notify => (false, true, Accept),
            Method::Bye | Method::Prack | Method::Info | Method::Cancel => {
                (false, false, Reject(StatusCode::CallOrTransactionDoesNotExist))
            }
            Method::Ack => (false, false, Drop),
            Method::Options | Method::Message => (false, false, Accept),
            Method::Register | Method::Publish => (false, false, Reject(StatusCode::MethodNotAllowed)),
            Method::Extension(_) => (false, false, Reject(StatusCode::NotImplemented)),
        };

        MethodProfile {
            creates_dialog,
            refreshes_target,
            out_of_dialog,
        }
    }
}
