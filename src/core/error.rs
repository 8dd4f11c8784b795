//! Coordinator error types
//!
//! Grant and deny outcomes are never errors; they travel as
//! [`CapabilityResult`](super::CapabilityResult) values. The variants here
//! cover misuse of the API, protocol violations by the authority and
//! lifecycle problems.

use thiserror::Error;

use super::state::SlotState;

/// Errors that can occur while coordinating capability requests
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// A request was made with no capability names
    #[error("A capability request requires at least one capability name")]
    EmptyRequest,

    /// The authority reported a result for a name nobody is waiting on
    #[error("Result delivered for capability with no pending request: {0}")]
    UnknownCapability(String),

    /// The authority delivered names and grants of different lengths
    #[error("Malformed result: {names} names but {grants} grant values")]
    MalformedResult {
        /// Number of capability names delivered
        names: usize,
        /// Number of grant values delivered
        grants: usize,
    },

    /// A request slot operation was called in the wrong state
    #[error("Cannot {operation} while request slot is {state}")]
    InvalidSlotState {
        /// The operation that was attempted
        operation: &'static str,
        /// The state the slot was in
        state: SlotState,
    },

    /// No capability authority is attached to the anchor
    #[error("No capability authority attached to the anchor")]
    HostDetached,

    /// The anchor was torn down
    #[error("Lifecycle anchor destroyed")]
    AnchorDestroyed,

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// Channel buffer is full
    #[error("Channel full")]
    ChannelFull,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoordinatorError {
    /// Create a slot state error
    pub fn invalid_slot(operation: &'static str, state: SlotState) -> Self {
        CoordinatorError::InvalidSlotState { operation, state }
    }

    /// Whether this error is a programming error of the caller
    /// (as opposed to a protocol or lifecycle problem)
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            CoordinatorError::EmptyRequest | CoordinatorError::InvalidSlotState { .. }
        )
    }
}

/// Result type alias for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
