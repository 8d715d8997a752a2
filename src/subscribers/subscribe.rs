use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Each subscriber is driven by its own task fed by a bounded queue owned by the
/// [`SubscriberSet`](super::SubscriberSet). A slow subscriber only delays itself.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Events arrive in publish order for a given subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for overflow and panic events).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue. Events are dropped once it is full.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
