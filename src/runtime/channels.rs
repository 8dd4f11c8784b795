//! Channel types for authority-to-anchor communication
//!
//! An authority living on another task or thread reports its answers as
//! `AuthorityEvent`s over an mpsc channel. The receiving end is drained by
//! the event pump spawned by `AnchorRuntime`.

use tokio::sync::mpsc;

use crate::core::{AuthorityEvent, CoordinatorError, CoordinatorResult};

/// Default buffer size for the event channel
pub const EVENT_CHANNEL_SIZE: usize = 32;

/// Receiver half of the event channel (drained by the event pump)
pub type EventReceiver = mpsc::Receiver<AuthorityEvent>;

/// Sender half of the event channel, handed to the authority
///
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<AuthorityEvent>,
}

impl EventSender {
    /// Report the answer for a prompt
    pub async fn deliver(
        &self,
        request_code: u32,
        names: Vec<String>,
        granted: Vec<bool>,
    ) -> CoordinatorResult<()> {
        self.send(AuthorityEvent::delivered(request_code, names, granted))
            .await
    }

    /// Report that a prompt was abandoned
    pub async fn cancel(&self, request_code: u32) -> CoordinatorResult<()> {
        self.send(AuthorityEvent::cancelled(request_code)).await
    }

    /// Send any event to the anchor
    pub async fn send(&self, event: AuthorityEvent) -> CoordinatorResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Try to send an event without waiting (non-blocking)
    ///
    /// Usable from synchronous authority callbacks.
    pub fn try_send(&self, event: AuthorityEvent) -> CoordinatorResult<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CoordinatorError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => CoordinatorError::ChannelClosed,
        })
    }

    /// Check if the event pump has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a new event channel pair
///
/// A size of zero falls back to `EVENT_CHANNEL_SIZE`.
pub fn create_event_channel(size: usize) -> (EventSender, EventReceiver) {
    let size = if size == 0 { EVENT_CHANNEL_SIZE } else { size };
    let (tx, rx) = mpsc::channel(size);
    (EventSender { tx }, rx)
}
