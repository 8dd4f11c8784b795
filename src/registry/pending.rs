//! Pending-request registry implementation
//!
//! One `PendingEntry` per capability name that is waiting on the authority.
//! Each entry owns a write-once broadcast slot (`tokio::sync::watch`); every
//! caller asking for the same name holds a `ResultWaiter` on that slot and
//! wakes up on the single resolution.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::core::{CapabilityResult, CoordinatorError, CoordinatorResult};

/// A capability waiting for its answer
#[derive(Debug)]
pub struct PendingEntry {
    /// Capability name (unique within the registry)
    name: String,

    /// Physical prompt batch this entry was created for
    request_code: u32,

    /// Write-once result slot
    slot: watch::Sender<Option<CapabilityResult>>,
}

impl PendingEntry {
    fn new(name: impl Into<String>, request_code: u32) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            name: name.into(),
            request_code,
            slot,
        }
    }

    /// Get the capability name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the prompt batch this entry belongs to
    pub fn request_code(&self) -> u32 {
        self.request_code
    }

    /// Create a new waiter on this entry's slot
    pub fn subscribe(&self) -> ResultWaiter {
        ResultWaiter {
            name: self.name.clone(),
            rx: self.slot.subscribe(),
        }
    }

    /// Write the answer and wake every waiter
    ///
    /// Consumes the entry so nothing can be written twice. The stored value
    /// stays readable for waiters after the sender is dropped.
    fn complete(self, result: CapabilityResult) -> usize {
        let waiters = self.slot.receiver_count();
        self.slot.send_replace(Some(result));
        waiters
    }
}

/// Read side of a pending entry, held by each interested caller
#[derive(Debug, Clone)]
pub struct ResultWaiter {
    name: String,
    rx: watch::Receiver<Option<CapabilityResult>>,
}

impl ResultWaiter {
    /// Get the capability name this waiter is for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the answer if it has already been written
    pub fn try_result(&self) -> Option<CapabilityResult> {
        self.rx.borrow().clone()
    }

    /// Wait for the answer
    ///
    /// Returns `ChannelClosed` if the entry was dropped without ever being
    /// resolved, which only happens when the anchor's state is released
    /// without a teardown.
    pub async fn wait(mut self) -> CoordinatorResult<CapabilityResult> {
        let value = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        value.clone().ok_or(CoordinatorError::ChannelClosed)
    }
}

/// One capability's answer, either known up front or still pending
#[derive(Debug, Clone)]
pub enum Answer {
    /// Answered without prompting (already granted or revoked)
    Immediate(CapabilityResult),
    /// Waiting on a pending entry
    Pending(ResultWaiter),
}

impl Answer {
    /// Get the capability name
    pub fn name(&self) -> &str {
        match self {
            Answer::Immediate(result) => &result.name,
            Answer::Pending(waiter) => waiter.name(),
        }
    }

    /// Get the answer if it is already known
    pub fn try_result(&self) -> Option<CapabilityResult> {
        match self {
            Answer::Immediate(result) => Some(result.clone()),
            Answer::Pending(waiter) => waiter.try_result(),
        }
    }

    /// Wait for the answer
    pub async fn wait(self) -> CoordinatorResult<CapabilityResult> {
        match self {
            Answer::Immediate(result) => Ok(result),
            Answer::Pending(waiter) => waiter.wait().await,
        }
    }
}

/// Map from capability name to its in-flight entry
///
/// The registry is not synchronized on its own; the lifecycle anchor owns it
/// behind its state lock, which makes `lookup_or_create` and `resolve`
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: HashMap<String, PendingEntry>,
}

impl PendingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get a waiter for `name`, creating the entry if needed
    ///
    /// Returns `true` as the second element when the entry was created by
    /// this call, meaning the name still has to be prompted for.
    pub fn lookup_or_create(&mut self, name: &str, request_code: u32) -> (ResultWaiter, bool) {
        if let Some(entry) = self.entries.get(name) {
            return (entry.subscribe(), false);
        }

        let entry = PendingEntry::new(name, request_code);
        let waiter = entry.subscribe();
        self.entries.insert(name.to_string(), entry);
        tracing::debug!(capability = %name, request_code, "Registered pending capability");
        (waiter, true)
    }

    /// Resolve the entry for `result.name` and remove it
    ///
    /// Returns the number of waiters that were notified. Fails with
    /// `UnknownCapability` when nobody asked for the name.
    pub fn resolve(&mut self, result: CapabilityResult) -> CoordinatorResult<usize> {
        let entry = self
            .entries
            .remove(&result.name)
            .ok_or_else(|| CoordinatorError::UnknownCapability(result.name.clone()))?;

        tracing::debug!(
            capability = %result.name,
            granted = result.granted,
            request_code = entry.request_code(),
            "Resolved pending capability"
        );
        Ok(entry.complete(result))
    }

    /// Resolve every entry of one prompt batch as denied
    ///
    /// Returns the names that were resolved, sorted.
    pub fn cancel_batch(&mut self, request_code: u32) -> Vec<String> {
        let names = self.batch_names(request_code);
        for name in &names {
            if let Some(entry) = self.entries.remove(name) {
                entry.complete(CapabilityResult::denied(name.clone()));
            }
        }
        names
    }

    /// Resolve every entry as denied and clear the registry
    ///
    /// Returns the number of entries that were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        for (name, entry) in self.entries.drain() {
            entry.complete(CapabilityResult::denied(name));
        }
        count
    }

    /// Check if a name is pending
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get the prompt batch a pending name belongs to
    pub fn request_code_of(&self, name: &str) -> Option<u32> {
        self.entries.get(name).map(PendingEntry::request_code)
    }

    /// Get all pending names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the pending names of one prompt batch, sorted
    pub fn batch_names(&self, request_code: u32) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.request_code() == request_code)
            .map(|e| e.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Get the number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
