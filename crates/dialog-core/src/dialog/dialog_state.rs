use std::fmt;

use serde::{Deserialize, Serialize};

/// Dialog lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogState {
    /// Created by a provisional response carrying a To tag
    Early,
    /// A 2xx established the dialog
    Confirmed,
    Terminated,
}

impl DialogState {
    pub fn can_transition_to(&self, to: DialogState) -> bool {
        matches!(
            (self, to),
            (DialogState::Early, DialogState::Confirmed)
                | (DialogState::Early, DialogState::Terminated)
                | (DialogState::Confirmed, DialogState::Terminated)
        )
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogState::Early => write!(f, "Early"),
            DialogState::Confirmed => write!(f, "Confirmed"),
            DialogState::Terminated => write!(f, "Terminated"),
        }
    }
}
