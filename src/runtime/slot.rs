//! RequestSlot - Guards the single physical prompt channel
//!
//! The platform shows one prompt dialog at a time, so a request is assembled
//! in three steps: `prepare_request` opens the slot and hands out a fresh
//! request code, `finish_request` seals the name set, and `submit_request`
//! turns it into a `PromptRequest`. `cancel_request` aborts at any point.
//! Calling a step out of order is a programming error and fails fast.

use crate::core::{CoordinatorError, CoordinatorResult, PromptRequest, SlotState};

/// Request code counter plus the slot's state
#[derive(Debug, Default)]
pub struct RequestSlot {
    /// Code of the most recently prepared request (0 = none yet)
    request_code: u32,

    /// Current state
    state: SlotState,
}

impl RequestSlot {
    /// Create a ready slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Get the code of the most recently prepared request
    pub fn request_code(&self) -> u32 {
        self.request_code
    }

    /// Ready -> Preparing
    ///
    /// Returns the new request code.
    pub fn prepare_request(&mut self) -> CoordinatorResult<u32> {
        if !self.state.is_ready() {
            return Err(CoordinatorError::invalid_slot("prepare a request", self.state));
        }
        self.request_code = self.request_code.wrapping_add(1);
        self.state = SlotState::Preparing;
        Ok(self.request_code)
    }

    /// Preparing -> Sealed
    pub fn finish_request(&mut self) -> CoordinatorResult<()> {
        if self.state != SlotState::Preparing {
            return Err(CoordinatorError::invalid_slot("finish a request", self.state));
        }
        self.state = SlotState::Sealed;
        Ok(())
    }

    /// Sealed -> Ready, producing the prompt for the sealed request
    pub fn submit_request(&mut self, names: Vec<String>) -> CoordinatorResult<PromptRequest> {
        if self.state != SlotState::Sealed {
            return Err(CoordinatorError::invalid_slot("submit a request", self.state));
        }
        self.state = SlotState::Ready;
        Ok(PromptRequest::new(self.request_code, names))
    }

    /// Preparing | Sealed -> Ready
    pub fn cancel_request(&mut self) -> CoordinatorResult<()> {
        if !self.state.is_busy() {
            return Err(CoordinatorError::invalid_slot("cancel a request", self.state));
        }
        self.state = SlotState::Ready;
        Ok(())
    }

    /// Force the slot back to ready (hard teardown)
    pub(crate) fn reset(&mut self) {
        self.state = SlotState::Ready;
    }
}
