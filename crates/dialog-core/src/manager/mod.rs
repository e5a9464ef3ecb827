//! Dialog Manager Module
//!
//! The [`DialogManager`] is the core router. It owns the transaction table,
//! the dialog table and the timers, and is driven from one flow of control:
//! either directly through its `async` methods, or as an actor through
//! [`DialogManager::start`] and a cloneable [`DialogHandle`].
//!
//! - `core`: construction, accessors, shutdown and the run loop
//! - `transaction_integration`: client transactions and action execution
//! - `message_routing`: inbound requests and responses
//! - `dialog_operations`: dialog creation, confirmation and teardown
//! - `response_lifecycle`: responses sent on server transactions
//! - `handle`: commands and the handle used to reach a running manager

pub mod core;
pub mod dialog_operations;
pub mod handle;
pub mod message_routing;
pub mod response_lifecycle;
pub mod transaction_integration;

pub use self::core::DialogManager;
pub use handle::{DialogHandle, ManagerCommand};
