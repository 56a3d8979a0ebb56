//! In-process change notifications
//!
//! Mutations of the task store and the settings state publish a [`CoreEvent`]
//! on the [`EventBus`]. The rotation scheduler and the host forwarder are the
//! usual subscribers; publishing never blocks and never fails.

use tokio::sync::broadcast;

/// Capacity of the broadcast ring. A subscriber that falls further behind
/// sees `Lagged` and must resynchronise from current state.
const EVENT_CAPACITY: usize = 32;

/// Change notifications carried by the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreEvent {
    /// A task was added, removed, reordered or edited
    TasksChanged,
    /// The rotation interval changed
    RotationSettingsChanged,
    /// Any setting changed (interval, color or emoji)
    SettingsChanged,
}

/// Broadcast registry owned by the application lifecycle
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget publish; having no subscribers is not an error.
    pub fn publish(&self, event: CoreEvent) {
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(?event, delivered, "Published event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
