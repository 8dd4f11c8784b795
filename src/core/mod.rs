//! Core types for the grant coordinator
//!
//! This module provides the fundamental types used throughout the crate:
//! - `CapabilityResult` - The answer for one capability
//! - `PromptRequest` / `AuthorityEvent` - Messages to and from the authority
//! - `SlotState` - State of the single physical prompt channel
//! - `CoordinatorError` - Error types

pub mod error;
pub mod output;
pub mod state;

pub use error::{CoordinatorError, CoordinatorResult};
pub use output::{AuthorityEvent, CapabilityResult, PromptRequest};
pub use state::SlotState;
