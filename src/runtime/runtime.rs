//! AnchorRuntime - Creates anchors and pumps authority events into them
//!
//! The `AnchorRuntime` is responsible for:
//! - Creating lifecycle anchors from shared configuration
//! - Spawning an event pump task per anchor
//! - Tracking live anchors by ID
//! - Hard teardown of one or all anchors

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CoordinatorConfig;

use super::anchor::{LifecycleAnchor, WeakAnchor};
use super::channels::{create_event_channel, EventReceiver, EventSender};

/// Runtime for anchors whose authority answers through a channel
#[derive(Clone)]
pub struct AnchorRuntime {
    /// Map of anchor_id -> LifecycleAnchor for live anchors
    anchors: Arc<RwLock<HashMap<Uuid, LifecycleAnchor>>>,

    /// Configuration applied to every anchor
    config: CoordinatorConfig,
}

impl AnchorRuntime {
    /// Create a runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create a runtime with the given configuration
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            anchors: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Create an anchor and spawn its event pump
    ///
    /// Returns the anchor and the sender the authority reports through. The
    /// runtime keeps the anchor alive until `destroy` is called.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let runtime = AnchorRuntime::new();
    /// let (anchor, events) = runtime.spawn().await;
    /// anchor.attach(Arc::new(MyAuthority::new(events)))?;
    /// ```
    pub async fn spawn(&self) -> (LifecycleAnchor, EventSender) {
        let anchor = LifecycleAnchor::with_config(&self.config);
        let events = Self::spawn_event_pump(&anchor, self.config.event_channel_size);

        let mut anchors = self.anchors.write().await;
        anchors.insert(anchor.id(), anchor.clone());

        (anchor, events)
    }

    /// Spawn a task that feeds authority events into `anchor`
    ///
    /// The task holds only a weak reference, so it never keeps the anchor
    /// alive. It stops when every sender is dropped or the anchor is gone.
    pub fn spawn_event_pump(anchor: &LifecycleAnchor, channel_size: usize) -> EventSender {
        let (tx, rx) = create_event_channel(channel_size);
        let anchor_id = anchor.id();
        let weak = anchor.downgrade();

        tokio::spawn(run_event_pump(anchor_id, weak, rx));

        tx
    }

    /// Get a live anchor
    pub async fn get(&self, anchor_id: &Uuid) -> Option<LifecycleAnchor> {
        let anchors = self.anchors.read().await;
        anchors.get(anchor_id).cloned()
    }

    /// Get the number of live anchors
    pub async fn count(&self) -> usize {
        let anchors = self.anchors.read().await;
        anchors.len()
    }

    /// List all live anchor IDs
    pub async fn list(&self) -> Vec<Uuid> {
        let anchors = self.anchors.read().await;
        anchors.keys().copied().collect()
    }

    /// Tear down one anchor
    ///
    /// Returns the number of capabilities that were cancelled, or `None` if
    /// the anchor is unknown.
    pub async fn destroy(&self, anchor_id: &Uuid) -> Option<usize> {
        let anchor = {
            let mut anchors = self.anchors.write().await;
            anchors.remove(anchor_id)
        }?;
        Some(anchor.destroy())
    }

    /// Tear down every anchor
    pub async fn destroy_all(&self) -> usize {
        let anchors: Vec<LifecycleAnchor> = {
            let mut anchors = self.anchors.write().await;
            anchors.drain().map(|(_, a)| a).collect()
        };

        let count = anchors.len();
        for anchor in anchors {
            anchor.destroy();
        }
        count
    }
}

impl Default for AnchorRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_event_pump(anchor_id: Uuid, weak: WeakAnchor, mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        let Some(anchor) = weak.upgrade() else {
            tracing::debug!(anchor_id = %anchor_id, "Anchor gone, dropping authority event");
            break;
        };
        if let Err(e) = anchor.handle_event(event) {
            tracing::warn!(anchor_id = %anchor_id, error = %e, "Authority event rejected");
        }
    }
    tracing::debug!(anchor_id = %anchor_id, "Event pump stopped");
}
