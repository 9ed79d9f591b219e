//! Event bus for broadcasting ledger changes to subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::event::VigilEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast bus delivering [`VigilEvent`]s to all subscribers.
///
/// Publishing never blocks and tolerates having no receivers; a frontend
/// that subscribes late simply misses earlier events and reads current
/// ledger state instead.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<Arc<VigilEvent>>,
    /// Channel capacity.
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that were sent the event.
    pub fn publish(&self, event: VigilEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "publishing event");

        match self.sender.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                debug!(event_type = %event.event_type(), "no receivers for event");
                0
            },
        }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
        }
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of an event-bus subscription.
#[derive(Debug)]
pub struct EventReceiver {
    inner: broadcast::Receiver<Arc<VigilEvent>>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Closed`] when the bus has been dropped, or
    /// [`RecvError::Lagged`] when this receiver fell behind and events
    /// were discarded.
    pub async fn recv(&mut self) -> Result<Arc<VigilEvent>, RecvError> {
        self.inner.recv().await.map_err(RecvError::from)
    }

    /// Poll for an event without waiting.
    ///
    /// Returns `None` when no event is currently queued.
    pub fn try_recv(&mut self) -> Option<Arc<VigilEvent>> {
        self.inner.try_recv().ok()
    }
}

/// Error receiving from the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// All senders were dropped; no further events will arrive.
    Closed,
    /// The receiver lagged and `skipped` events were discarded.
    Lagged {
        /// How many events this receiver missed.
        skipped: u64,
    },
}

impl std::fmt::Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "event bus closed"),
            Self::Lagged { skipped } => write!(f, "receiver lagged, skipped {skipped} events"),
        }
    }
}

impl std::error::Error for RecvError {}

impl From<broadcast::error::RecvError> for RecvError {
    fn from(err: broadcast::error::RecvError) -> Self {
        match err {
            broadcast::error::RecvError::Closed => Self::Closed,
            broadcast::error::RecvError::Lagged(skipped) => Self::Lagged { skipped },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::LocalId;

    fn expired_event() -> VigilEvent {
        VigilEvent::ApprovalExpired {
            local_id: LocalId::new(),
            approval_id: None,
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let sent = bus.publish(expired_event());
        assert_eq!(sent, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "approval_expired");
    }

    #[tokio::test]
    async fn test_publish_without_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(expired_event()), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(expired_event()), 2);
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_none());
        bus.publish(expired_event());
        assert!(receiver.try_recv().is_some());
    }
}
