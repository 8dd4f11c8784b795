//! Capability Authority trait
//!
//! Abstracts the host surface that knows the current grant state of a
//! capability and can show the user-facing prompt. The coordinator never
//! talks to the platform directly; everything goes through this trait.
//!
//! `prompt` only starts the flow. The authority answers later by calling
//! [`LifecycleAnchor::on_result`](crate::runtime::LifecycleAnchor::on_result)
//! or [`LifecycleAnchor::on_cancelled`](crate::runtime::LifecycleAnchor::on_cancelled),
//! directly or through an [`EventSender`](crate::runtime::EventSender).
//! An authority that answers directly holds a
//! [`WeakAnchor`](crate::runtime::WeakAnchor), not a `LifecycleAnchor` clone;
//! the anchor owns its host, so a strong handle would keep both alive.

use std::sync::Arc;

use crate::core::PromptRequest;

/// Host-provided source of capability state and prompts
///
/// Queries are synchronous and must not have side effects. They may be called
/// while the anchor is assembling a request, so they must not call back into
/// the anchor.
pub trait CapabilityAuthority: Send + Sync {
    /// Whether the capability is currently granted
    fn is_granted(&self, name: &str) -> bool;

    /// Whether a policy has revoked the capability (it can't be asked for)
    fn is_revoked_by_policy(&self, name: &str) -> bool;

    /// Whether a justification should be shown before asking again
    ///
    /// Defaults to false for hosts without a rationale concept.
    fn should_show_rationale(&self, _name: &str) -> bool {
        false
    }

    /// Start the user-facing flow for every name in the request
    ///
    /// Called without any anchor lock held, so the authority may deliver its
    /// answer synchronously from inside this call.
    fn prompt(&self, request: PromptRequest);
}

/// Type alias for a shared authority
pub type ArcAuthority = Arc<dyn CapabilityAuthority>;
