//! LifecycleAnchor - State that outlives the host context
//!
//! The anchor owns the pending registry, the request slot and the prompt
//! queue. Host contexts come and go (`attach` / `detach`), but the anchor and
//! everything pending in it stays, so an authority answer that arrives after
//! the host was recreated still reaches the callers that asked.
//!
//! All mutable state sits behind one lock. The authority is only ever called
//! after that lock is released, so it may answer synchronously from inside
//! `prompt`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

use crate::authority::ArcAuthority;
use crate::config::CoordinatorConfig;
use crate::core::{
    AuthorityEvent, CapabilityResult, CoordinatorError, CoordinatorResult, PromptRequest,
    SlotState,
};
use crate::registry::{Answer, PendingRegistry, ResultWaiter};

use super::slot::RequestSlot;

/// Everything the anchor guards with its lock
#[derive(Default)]
struct AnchorState {
    /// In-flight capabilities
    registry: PendingRegistry,

    /// Assembly state of the next physical prompt
    slot: RequestSlot,

    /// Currently attached host
    host: Option<ArcAuthority>,

    /// Request code of the prompt the authority is showing
    in_flight: Option<u32>,

    /// Submitted prompts waiting for the authority to become free
    queue: VecDeque<PromptRequest>,

    /// Total physical prompts handed to an authority
    prompts_issued: u64,

    /// Set by hard teardown
    destroyed: bool,
}

impl AnchorState {
    fn ensure_alive(&self) -> CoordinatorResult<()> {
        if self.destroyed {
            Err(CoordinatorError::AnchorDestroyed)
        } else {
            Ok(())
        }
    }

    /// Pop the next prompt if the authority is free
    ///
    /// Names that were resolved while the prompt sat in the queue are
    /// dropped from it; a prompt with nothing left is skipped.
    fn take_next_prompt(&mut self) -> Option<(ArcAuthority, PromptRequest)> {
        if self.in_flight.is_some() {
            return None;
        }
        let host = self.host.clone()?;

        while let Some(mut prompt) = self.queue.pop_front() {
            let code = prompt.request_code;
            prompt
                .names
                .retain(|name| self.registry.request_code_of(name) == Some(code));
            if prompt.names.is_empty() {
                tracing::debug!(
                    request_code = code,
                    "Skipping queued prompt with nothing left to ask"
                );
                continue;
            }
            self.in_flight = Some(code);
            self.prompts_issued += 1;
            return Some((host, prompt));
        }
        None
    }

    /// Run one request through the slot and queue its new names
    fn register(&mut self, names: &[String]) -> CoordinatorResult<Vec<ResultWaiter>> {
        let code = self.slot.prepare_request()?;

        let mut waiters = Vec::with_capacity(names.len());
        let mut unrequested = Vec::new();
        for name in names {
            let (waiter, created) = self.registry.lookup_or_create(name, code);
            if created {
                unrequested.push(name.clone());
            }
            waiters.push(waiter);
        }

        self.slot.finish_request()?;
        if unrequested.is_empty() {
            self.cancel()?;
        } else {
            self.submit(unrequested)?;
        }
        Ok(waiters)
    }

    /// Queue the sealed request's prompt
    ///
    /// Every name registered under the request code is asked for, even if
    /// the caller's list leaves it out.
    fn submit(&mut self, mut names: Vec<String>) -> CoordinatorResult<u32> {
        let code = self.slot.request_code();
        if self.slot.state() == SlotState::Sealed {
            for name in self.registry.batch_names(code) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        let prompt = self.slot.submit_request(names)?;
        self.queue.push_back(prompt);
        Ok(code)
    }

    /// Abort the request in the slot, denying the names registered for it
    fn cancel(&mut self) -> CoordinatorResult<Vec<String>> {
        let code = self.slot.request_code();
        self.slot.cancel_request()?;
        Ok(self.registry.cancel_batch(code))
    }

    /// Mark a prompt as finished if it is the one in flight
    fn complete_prompt(&mut self, request_code: u32) -> bool {
        if self.in_flight == Some(request_code) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

pub(crate) struct AnchorInner {
    id: Uuid,
    verbose: bool,
    state: Mutex<AnchorState>,
}

impl Drop for AnchorInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.destroyed {
            return;
        }
        let cancelled = state.registry.cancel_all();
        if cancelled > 0 {
            tracing::warn!(
                anchor_id = %self.id,
                cancelled,
                "Anchor dropped with pending capabilities"
            );
        }
    }
}

/// Handle to the state shared by every host incarnation
///
/// Cheap to clone; all clones refer to the same anchor. Dropping the last
/// clone is a hard teardown, the same as calling [`destroy`](Self::destroy).
/// An authority that calls back into the anchor must hold a [`WeakAnchor`]
/// instead of a clone, otherwise the anchor keeps itself alive and only an
/// explicit `destroy` tears it down.
#[derive(Clone)]
pub struct LifecycleAnchor {
    inner: Arc<AnchorInner>,
}

/// Non-owning handle to a [`LifecycleAnchor`]
///
/// Held by authorities and event pumps so they never keep the anchor alive.
#[derive(Clone, Default)]
pub struct WeakAnchor {
    inner: Weak<AnchorInner>,
}

impl WeakAnchor {
    /// Get a strong handle if the anchor is still alive
    pub fn upgrade(&self) -> Option<LifecycleAnchor> {
        self.inner.upgrade().map(|inner| LifecycleAnchor { inner })
    }
}

impl std::fmt::Debug for WeakAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakAnchor")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl LifecycleAnchor {
    /// Create an anchor with default settings
    pub fn new() -> Self {
        Self::with_config(&CoordinatorConfig::default())
    }

    /// Create an anchor from configuration
    pub fn with_config(config: &CoordinatorConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(anchor_id = %id, "Created lifecycle anchor");
        Self {
            inner: Arc::new(AnchorInner {
                id,
                verbose: config.verbose,
                state: Mutex::new(AnchorState::default()),
            }),
        }
    }

    /// Get the anchor ID
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Get a handle that doesn't keep the anchor alive
    pub fn downgrade(&self) -> WeakAnchor {
        WeakAnchor {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnchorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, message: impl std::fmt::Display) {
        if self.inner.verbose {
            tracing::debug!(anchor_id = %self.inner.id, "{}", message);
        }
    }

    // =========================================================================
    // Host Methods
    // =========================================================================

    /// Attach a (re)created host
    ///
    /// Replaces any previous host. Queued prompts are dispatched to the new
    /// host if nothing is in flight.
    pub fn attach(&self, authority: ArcAuthority) -> CoordinatorResult<()> {
        let next = {
            let mut state = self.lock();
            state.ensure_alive()?;
            state.host = Some(authority);
            state.take_next_prompt()
        };
        tracing::debug!(anchor_id = %self.inner.id, "Host attached");
        self.dispatch(next);
        Ok(())
    }

    /// Detach the current host
    ///
    /// Pending capabilities and the in-flight prompt are kept; the answer
    /// can still be delivered through `on_result`.
    pub fn detach(&self) -> Option<ArcAuthority> {
        let previous = self.lock().host.take();
        if previous.is_some() {
            tracing::debug!(anchor_id = %self.inner.id, "Host detached");
        }
        previous
    }

    /// Check if a host is attached
    pub fn is_attached(&self) -> bool {
        self.lock().host.is_some()
    }

    /// Get the attached host
    pub fn authority(&self) -> CoordinatorResult<ArcAuthority> {
        let state = self.lock();
        state.ensure_alive()?;
        state.host.clone().ok_or(CoordinatorError::HostDetached)
    }

    // =========================================================================
    // Request Slot Methods
    // =========================================================================

    /// Open the slot for a new request, returning its request code
    pub fn prepare_request(&self) -> CoordinatorResult<u32> {
        let mut state = self.lock();
        state.ensure_alive()?;
        state.slot.prepare_request()
    }

    /// Register a name with the request being prepared
    ///
    /// Returns the waiter and whether the name is new (needs prompting).
    pub fn lookup_or_create(&self, name: &str) -> CoordinatorResult<(ResultWaiter, bool)> {
        let mut state = self.lock();
        state.ensure_alive()?;
        if state.slot.state() != SlotState::Preparing {
            return Err(CoordinatorError::invalid_slot(
                "register a capability",
                state.slot.state(),
            ));
        }
        let code = state.slot.request_code();
        Ok(state.registry.lookup_or_create(name, code))
    }

    /// Seal the request being prepared
    pub fn finish_request(&self) -> CoordinatorResult<()> {
        self.lock().slot.finish_request()
    }

    /// Submit the sealed request to the authority
    ///
    /// The prompt carries `names` plus any name registered for this request
    /// that the list leaves out. It is shown right away if the authority is
    /// free, otherwise it waits until the current prompt completes. Returns
    /// the request code.
    pub fn submit_request(&self, names: Vec<String>) -> CoordinatorResult<u32> {
        let (code, next) = {
            let mut state = self.lock();
            state.ensure_alive()?;
            let code = state.submit(names)?;
            (code, state.take_next_prompt())
        };
        self.dispatch(next);
        Ok(code)
    }

    /// Abort the request being prepared or sealed
    ///
    /// Names registered for it resolve as denied, so a later request for
    /// them prompts afresh. Returns how many names were denied.
    pub fn cancel_request(&self) -> CoordinatorResult<usize> {
        let cancelled = self.lock().cancel()?;
        if !cancelled.is_empty() {
            tracing::info!(
                anchor_id = %self.inner.id,
                capabilities = ?cancelled,
                "Request cancelled before submission"
            );
        }
        Ok(cancelled.len())
    }

    /// Get the slot state
    pub fn slot_state(&self) -> SlotState {
        self.lock().slot.state()
    }

    /// Register pending names and submit the new ones as one prompt
    ///
    /// Runs the whole prepare / finish / submit-or-cancel sequence under a
    /// single lock, so concurrent callers can't interleave.
    pub(crate) fn register(&self, names: &[String]) -> CoordinatorResult<Vec<ResultWaiter>> {
        let (waiters, next) = {
            let mut state = self.lock();
            state.ensure_alive()?;
            let waiters = state.register(names)?;
            (waiters, state.take_next_prompt())
        };
        self.dispatch(next);
        Ok(waiters)
    }

    /// Answer what the host already knows and register the rest
    ///
    /// Granted names answer as granted and revoked names as denied without
    /// touching the registry; everything else goes through `register`. The
    /// host is queried under the same lock, so the split can't race with a
    /// concurrent delivery. Fails with `HostDetached` if no host is attached.
    pub(crate) fn request(&self, names: &[String]) -> CoordinatorResult<Vec<Answer>> {
        let (answers, next) = {
            let mut state = self.lock();
            state.ensure_alive()?;
            let host = state.host.clone().ok_or(CoordinatorError::HostDetached)?;

            let mut known = Vec::with_capacity(names.len());
            let mut unknown = Vec::new();
            for name in names {
                self.log(format!("Requesting capability {}", name));
                if host.is_granted(name) {
                    known.push(Some(CapabilityResult::granted(name.clone())));
                } else if host.is_revoked_by_policy(name) {
                    known.push(Some(CapabilityResult::denied(name.clone())));
                } else {
                    known.push(None);
                    unknown.push(name.clone());
                }
            }

            let mut waiters = if unknown.is_empty() {
                Vec::new()
            } else {
                state.register(&unknown)?
            }
            .into_iter();

            let answers: Vec<Answer> = known
                .into_iter()
                .filter_map(|result| match result {
                    Some(result) => Some(Answer::Immediate(result)),
                    None => waiters.next().map(Answer::Pending),
                })
                .collect();
            (answers, state.take_next_prompt())
        };
        self.dispatch(next);
        Ok(answers)
    }

    fn dispatch(&self, next: Option<(ArcAuthority, PromptRequest)>) {
        if let Some((authority, prompt)) = next {
            tracing::info!(
                anchor_id = %self.inner.id,
                request_code = prompt.request_code,
                capabilities = ?prompt.names,
                "Prompting for capabilities"
            );
            authority.prompt(prompt);
        }
    }

    // =========================================================================
    // Authority Callbacks
    // =========================================================================

    /// Deliver the authority's answer for one prompt
    ///
    /// `names` and `granted` must be index-aligned. An empty answer means the
    /// flow was interrupted and is handled like `on_cancelled`. Names nobody
    /// is waiting on are logged and skipped. Returns how many names were
    /// resolved.
    pub fn on_result(
        &self,
        request_code: u32,
        names: Vec<String>,
        granted: Vec<bool>,
    ) -> CoordinatorResult<usize> {
        if names.len() != granted.len() {
            tracing::error!(
                anchor_id = %self.inner.id,
                request_code,
                names = names.len(),
                grants = granted.len(),
                "Ignoring malformed capability result"
            );
            return Err(CoordinatorError::MalformedResult {
                names: names.len(),
                grants: granted.len(),
            });
        }
        if names.is_empty() {
            return Ok(self.on_cancelled(request_code));
        }

        // Rationale is read from the host before taking the lock
        let host = self.lock().host.clone();
        let results: Vec<CapabilityResult> = names
            .into_iter()
            .zip(granted)
            .map(|(name, granted)| {
                let rationale = !granted
                    && host
                        .as_ref()
                        .map(|h| h.should_show_rationale(&name))
                        .unwrap_or(false);
                CapabilityResult::new(name, granted, rationale)
            })
            .collect();

        let (resolved, next) = {
            let mut state = self.lock();
            let mut resolved = 0;
            for result in results {
                self.log(format!("onResult {}", result));
                match state.registry.resolve(result) {
                    Ok(_) => resolved += 1,
                    Err(e) => {
                        tracing::error!(
                            anchor_id = %self.inner.id,
                            request_code,
                            error = %e,
                            "Dropping stray capability result"
                        );
                    }
                }
            }

            if state.complete_prompt(request_code) {
                let unanswered = state.registry.cancel_batch(request_code);
                if !unanswered.is_empty() {
                    tracing::warn!(
                        anchor_id = %self.inner.id,
                        request_code,
                        capabilities = ?unanswered,
                        "Prompt completed without an answer for some capabilities; denying them"
                    );
                }
            } else {
                tracing::warn!(
                    anchor_id = %self.inner.id,
                    request_code,
                    "Result delivered for a prompt that is not in flight"
                );
            }
            (resolved, state.take_next_prompt())
        };

        self.dispatch(next);
        Ok(resolved)
    }

    /// The authority abandoned a prompt
    ///
    /// Every capability of that prompt resolves as denied. Returns how many
    /// were resolved.
    pub fn on_cancelled(&self, request_code: u32) -> usize {
        let (cancelled, next) = {
            let mut state = self.lock();
            let cancelled = state.registry.cancel_batch(request_code);
            state.queue.retain(|p| p.request_code != request_code);
            state.complete_prompt(request_code);
            (cancelled, state.take_next_prompt())
        };

        tracing::info!(
            anchor_id = %self.inner.id,
            request_code,
            capabilities = ?cancelled,
            "Prompt cancelled"
        );
        self.dispatch(next);
        cancelled.len()
    }

    /// Route an authority event to the matching callback
    pub fn handle_event(&self, event: AuthorityEvent) -> CoordinatorResult<usize> {
        match event {
            AuthorityEvent::Delivered {
                request_code,
                names,
                granted,
            } => self.on_result(request_code, names, granted),
            AuthorityEvent::Cancelled { request_code } => Ok(self.on_cancelled(request_code)),
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Hard teardown with no successor
    ///
    /// Every pending capability resolves as denied so no caller waits
    /// forever. Later requests fail with `AnchorDestroyed`. Returns how many
    /// capabilities were cancelled.
    pub fn destroy(&self) -> usize {
        let mut state = self.lock();
        if state.destroyed {
            return 0;
        }
        state.destroyed = true;
        state.host = None;
        state.queue.clear();
        state.in_flight = None;
        state.slot.reset();
        let cancelled = state.registry.cancel_all();
        tracing::info!(anchor_id = %self.inner.id, cancelled, "Lifecycle anchor destroyed");
        cancelled
    }

    /// Check if the anchor was torn down
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Check if a capability is pending
    pub fn is_pending(&self, name: &str) -> bool {
        self.lock().registry.contains(name)
    }

    /// Get all pending capability names, sorted
    pub fn pending_names(&self) -> Vec<String> {
        self.lock().registry.names()
    }

    /// Get the pending names of one prompt, sorted
    pub fn batch_names(&self, request_code: u32) -> Vec<String> {
        self.lock().registry.batch_names(request_code)
    }

    /// Get the number of pending capabilities
    pub fn pending_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Get the request code of the prompt currently shown
    pub fn in_flight(&self) -> Option<u32> {
        self.lock().in_flight
    }

    /// Get the number of prompts waiting for the authority
    pub fn queued_prompts(&self) -> usize {
        self.lock().queue.len()
    }

    /// Get the total number of physical prompts issued
    pub fn prompts_issued(&self) -> u64 {
        self.lock().prompts_issued
    }
}

impl Default for LifecycleAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LifecycleAnchor")
            .field("id", &self.inner.id)
            .field("pending", &state.registry.len())
            .field("in_flight", &state.in_flight)
            .field("queued", &state.queue.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
