use super::types::BridgeEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast-based event bus for bridge events.
///
/// Uses `tokio::broadcast` so multiple subscribers can receive the same events.
/// Slow subscribers will miss events (lagged) rather than blocking the publisher;
/// the worker's stream pumps must never stall on a presentation layer.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events. Returns a receiver that will get all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: BridgeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One step of a subscription as seen by a presenter
#[derive(Debug, Clone)]
pub enum Delivery {
    /// The next event
    Event(BridgeEvent),
    /// The subscriber fell behind and this many events were dropped
    Skipped(u64),
}

/// Receive the next event, turning a lag into [`Delivery::Skipped`].
///
/// Returns `None` once every publisher is gone.
pub async fn next_delivery(rx: &mut broadcast::Receiver<BridgeEvent>) -> Option<Delivery> {
    match rx.recv().await {
        Ok(event) => Some(Delivery::Event(event)),
        Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "Subscriber fell behind; events skipped");
            Some(Delivery::Skipped(skipped))
        }
        Err(RecvError::Closed) => None,
    }
}
