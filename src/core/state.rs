//! Request slot state

use serde::{Deserialize, Serialize};

/// State of the single physical prompt channel
///
/// ```text
/// Ready --prepare--> Preparing --finish--> Sealed --submit--> Ready
///   ^                    |                    |
///   +------cancel--------+--------cancel------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    /// No request is being assembled
    Ready,

    /// A request is collecting its capability names
    Preparing,

    /// The name set is final and waits to be submitted or cancelled
    Sealed,
}

impl SlotState {
    /// Check if the slot can start a new request
    pub fn is_ready(&self) -> bool {
        matches!(self, SlotState::Ready)
    }

    /// Check if a request is being assembled or waits for submission
    pub fn is_busy(&self) -> bool {
        !self.is_ready()
    }
}

impl Default for SlotState {
    fn default() -> Self {
        SlotState::Ready
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Ready => write!(f, "ready"),
            SlotState::Preparing => write!(f, "preparing"),
            SlotState::Sealed => write!(f, "sealed"),
        }
    }
}
