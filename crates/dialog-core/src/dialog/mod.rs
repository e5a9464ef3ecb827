//! Core dialog types
//!
//! - [`DialogId`]: Call-ID plus local and remote tag
//! - [`Dialog`]: route set, sequence numbers and targets
//! - [`DialogState`]: Early, Confirmed, Terminated
//! - [`MethodProfile`]: per-method dialog behavior
//!
//! ```text
//! Early ──2xx──▶ Confirmed ──BYE──▶ Terminated
//!   └────────── failure / fork loser ──────▲
//! ```

pub mod dialog_id;
pub mod dialog_impl;
pub mod dialog_state;
pub mod method_profile;

pub use dialog_id::DialogId;
pub use dialog_impl::Dialog;
pub use dialog_state::DialogState;
pub use method_profile::{MethodProfile, OutOfDialogPolicy, ALLOWED_METHODS};
