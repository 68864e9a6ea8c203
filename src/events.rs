//! Session event bus.
//!
//! Feature code and the session layer emit [`SessionEvent`]s; the delegate
//! registry subscribes and invalidates its contexts on each one. The bus is a
//! thin wrapper over [`tokio::sync::broadcast`]: lossy for lagging
//! subscribers, which is acceptable because invalidation is idempotent and a
//! missed event is covered by the next pass.

use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

/// Events that invalidate cached handler enablement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Login { site_id: String },
    Logout { site_id: String },
    ConfigChanged,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Login { .. } => "login",
            SessionEvent::Logout { .. } => "logout",
            SessionEvent::ConfigChanged => "config changed",
        }
    }
}

/// Multi-producer, multi-consumer event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all current subscribers. An event with no subscribers
    /// is dropped silently.
    pub fn emit(&self, event: SessionEvent) {
        debug!(kind = event.kind(), "Emitting session event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
