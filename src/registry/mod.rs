//! Pending-request registry
//!
//! Tracks every capability that is waiting on the authority:
//! - **Dedup**: at most one entry per capability name
//! - **Fan-out**: every caller waiting on a name gets the same answer
//! - **Batches**: each entry remembers the physical prompt it belongs to
//!
//! ## Example
//!
//! ```rust,ignore
//! use grant_coordinator::registry::PendingRegistry;
//! use grant_coordinator::core::CapabilityResult;
//!
//! let mut registry = PendingRegistry::new();
//! let (first, created) = registry.lookup_or_create("CAMERA", 1);   // created == true
//! let (second, created) = registry.lookup_or_create("CAMERA", 1);  // created == false
//!
//! registry.resolve(CapabilityResult::granted("CAMERA"))?;
//! assert!(first.wait().await?.granted);
//! assert!(second.wait().await?.granted);
//! ```

mod pending;

pub use pending::{Answer, PendingEntry, PendingRegistry, ResultWaiter};
