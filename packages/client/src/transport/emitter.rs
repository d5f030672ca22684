//! Local fan-out of server events to subscribers.

use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};

use lounge_server::infrastructure::dto::websocket::ServerEvent;
use tokio::sync::mpsc;

/// Server event kinds a subscriber can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ActiveUsers,
    RoomUsers,
    RoomHistory,
    NewMessage,
    UserTyping,
}

impl EventKind {
    pub fn of(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::ActiveUsers(_) => EventKind::ActiveUsers,
            ServerEvent::RoomUsers(_) => EventKind::RoomUsers,
            ServerEvent::RoomHistory(_) => EventKind::RoomHistory,
            ServerEvent::NewMessage(_) => EventKind::NewMessage,
            ServerEvent::UserTyping(_) => EventKind::UserTyping,
        }
    }
}

struct Listener {
    id: u64,
    /// `None` listens to every kind
    kind: Option<EventKind>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<Listener>>,
}

impl Listeners {
    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Event emitter shared by the live session and the local simulation
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<Listeners>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind
    pub fn on(&self, kind: EventKind) -> Subscription {
        self.subscribe(Some(kind))
    }

    /// Subscribe to every event
    pub fn on_any(&self) -> Subscription {
        self.subscribe(None)
    }

    /// Unsubscribe (same as dropping the subscription)
    pub fn off(&self, subscription: Subscription) {
        drop(subscription);
    }

    fn subscribe(&self, kind: Option<EventKind>) -> Subscription {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners.entries().push(Listener { id, kind, sender });
        Subscription {
            id,
            receiver,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver an event to every matching subscriber
    pub fn emit(&self, event: ServerEvent) {
        let kind = EventKind::of(&event);
        let mut entries = self.listeners.entries();
        entries.retain(|listener| {
            if listener.kind.is_some_and(|k| k != kind) {
                return !listener.sender.is_closed();
            }
            listener.sender.send(event.clone()).is_ok()
        });
        tracing::debug!("Emitted '{}' to {} listeners", event.name(), entries.len());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.entries().len()
    }
}

/// Handle of one subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<ServerEvent>,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.entries().retain(|listener| listener.id != self.id);
        }
    }
}
