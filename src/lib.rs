//! Capability request coordination
//!
//! Callers ask for named capabilities; names already pending are joined
//! instead of prompted for again, and every waiting caller receives the same
//! answer. Pending requests live on a lifecycle anchor, so they survive the
//! host being torn down and recreated while a prompt is showing.

pub mod authority;
pub mod core;
pub mod registry;
pub mod runtime;

// Caller-facing API
pub mod coordinator;

// Ambient setup
pub mod config;
pub mod logging;

pub use authority::{ArcAuthority, CapabilityAuthority};
pub use config::{CoordinatorConfig, LoggingConfig};
pub use coordinator::{RequestCoordinator, ResultAggregator, ResultStream};
pub use crate::core::{
    AuthorityEvent, CapabilityResult, CoordinatorError, CoordinatorResult, PromptRequest,
    SlotState,
};
pub use runtime::{AnchorRuntime, EventSender, LifecycleAnchor, WeakAnchor};
