//! # sipflow-dialog-core
//!
//! RFC 3261 transaction layer, dialog layer and core router.
//!
//! - [`transaction`]: the four transaction state machines and timers A-M
//! - [`dialog`]: dialog identity, state, route set and sequence numbers
//! - [`manager`]: the [`DialogManager`] that routes messages between the
//!   transport, transactions, dialogs and the application's
//!   [`CoreDelegate`]
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sipflow_dialog_core::prelude::*;
//! use sipflow_sip_transport::MemoryTransport;
//!
//! # async fn example() -> DialogResult<()> {
//! let ((transport, events), _peer) = MemoryTransport::pair(false);
//! let (delegate, mut core_events) = EventChannelDelegate::new();
//! let manager = DialogManager::new(
//!     DialogManagerConfig::new("pc33.atlanta.example.com"),
//!     Arc::new(transport),
//!     Arc::new(delegate),
//! )?;
//! let (handle, _task) = manager.start(events);
//!
//! let invite = SimpleRequestBuilder::new(Method::Invite, "sip:bob@biloxi.example.com")?
//!     .from("Alice", "sip:alice@atlanta.example.com", None)?
//!     .to("Bob", "sip:bob@biloxi.example.com", None)?
//!     .build();
//! let key = handle.send_request(invite).await?;
//! while let Some(event) = core_events.recv().await {
//!     if let CoreEvent::DialogConfirmed { dialog } = event {
//!         handle.terminate_dialog(dialog.id).await?;
//!     }
//! }
//! # let _ = key;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialog;
pub mod errors;
pub mod events;
pub mod logging;
pub mod manager;
pub mod transaction;

pub use config::DialogManagerConfig;
pub use dialog::{Dialog, DialogId, DialogState, MethodProfile, OutOfDialogPolicy};
pub use errors::{DialogError, DialogResult};
pub use events::{CoreDelegate, CoreEvent, EventChannelDelegate};
pub use manager::{DialogHandle, DialogManager, ManagerCommand};
pub use transaction::{
    TimerSettings, TimerType, TransactionKey, TransactionKind, TransactionOutcome,
    TransactionState,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CoreDelegate, CoreEvent, Dialog, DialogError, DialogHandle, DialogId, DialogManager,
        DialogManagerConfig, DialogResult, DialogState, EventChannelDelegate, TimerSettings,
        TransactionKey, TransactionOutcome, TransactionState,
    };
    pub use sipflow_sip_core::prelude::*;
}
