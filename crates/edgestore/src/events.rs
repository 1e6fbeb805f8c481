//! The in-process event bus: named events (at least `changed`) with
//! register/on/remove/trigger, with no ordering or delivery guarantees
//! beyond synchronous fan-out. [`crate::Session::lock`] fires `changed`
//! once per saved or deleted instance after a successful commit.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

pub type Listener = Arc<dyn Fn(&ChangedEvent) + Send + Sync>;

/// Payload of the `changed` event: the entity that was saved or removed.
#[derive(Debug, Clone)]
pub struct ChangedEvent {
    pub edgetype: edgestore_primitives::EdgeTypeId,
    pub gid1: edgestore_primitives::Gid,
    pub gid2: edgestore_primitives::Gid,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Saved,
    Deleted,
}

/// A minimal named pub/sub bus: register/on/remove/trigger, generalized
/// from a single static event name to an arbitrary name so the store can
/// fire `changed` without precluding future event names.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let mut listeners = HashMap::new();
        listeners.insert("changed".to_string(), Vec::new());
        EventBus {
            listeners: Mutex::new(listeners),
        }
    }

    pub fn register(&self, name: impl Into<String>) {
        self.listeners.lock().entry(name.into()).or_default();
    }

    pub fn on(&self, name: &str, listener: Listener) {
        self.listeners
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(listener);
    }

    pub fn remove(&self, name: &str) {
        self.listeners.lock().remove(name);
    }

    pub fn trigger(&self, name: &str, event: &ChangedEvent) {
        if let Some(listeners) = self.listeners.lock().get(name) {
            for listener in listeners {
                listener(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registered_listener_is_called_on_trigger() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.on(
            "changed",
            Arc::new(move |_event| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.trigger(
            "changed",
            &ChangedEvent {
                edgetype: edgestore_primitives::EdgeTypeId(1),
                gid1: edgestore_primitives::Gid(1),
                gid2: edgestore_primitives::Gid(1),
                kind: ChangeKind::Saved,
            },
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_event_has_no_listeners() {
        let bus = EventBus::new();
        bus.remove("changed");
        // Triggering a removed event name is simply a no-op.
        bus.trigger(
            "changed",
            &ChangedEvent {
                edgetype: edgestore_primitives::EdgeTypeId(1),
                gid1: edgestore_primitives::Gid(1),
                gid2: edgestore_primitives::Gid(1),
                kind: ChangeKind::Deleted,
            },
        );
    }
}
