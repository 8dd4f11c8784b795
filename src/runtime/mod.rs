//! Lifecycle anchor and its runtime
//!
//! This module provides the state that survives host recreation:
//! - `LifecycleAnchor` - Owns the pending registry, request slot and prompt queue
//! - `RequestSlot` - Three-state guard for the single physical prompt channel
//! - `AnchorRuntime` - Creates anchors and pumps authority events into them
//! - Channel types for authorities that answer from another task
//!
//! Hosts attach to an anchor and may be detached and replaced at any time;
//! pending requests keep waiting on the anchor, not on the host.

pub mod anchor;
pub mod channels;
pub mod runtime;
pub mod slot;

pub use anchor::{LifecycleAnchor, WeakAnchor};
pub use channels::{create_event_channel, EventReceiver, EventSender};
pub use runtime::AnchorRuntime;
pub use slot::RequestSlot;
