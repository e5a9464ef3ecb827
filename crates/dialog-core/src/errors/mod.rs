//! Error types for dialog-core
//!
//! Protocol-level failures (parse, timeout, transport, sequence) are turned
//! into [`TransactionOutcome`](crate::transaction::TransactionOutcome)
//! values delivered to the delegate. The variants here are what callers see
//! when they misuse the manager.

pub mod dialog_errors;

pub use dialog_errors::{DialogError, DialogResult};
