use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{EventHandler, EventHost, EventKind, GameEvent, HostError, ListenerHandle};

struct Subscription {
    kind: EventKind,
    handler: EventHandler,
}

struct BusState {
    subscriptions: BTreeMap<u64, Subscription>,
    next_id: u64,
}

/// In-process event system that fans game events out to subscribed handlers
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState {
                subscriptions: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Deliver an event to every matching handler, returning how many ran
    ///
    /// Handlers run after the bus lock is released, so a handler may subscribe,
    /// unsubscribe or touch its script without deadlocking.
    pub fn dispatch(&self, event: &GameEvent) -> usize {
        let handlers: Vec<(u64, EventHandler)> = {
            let state = self.state.lock();
            state
                .subscriptions
                .iter()
                .filter(|(_, sub)| sub.kind.matches(event))
                .map(|(id, sub)| (*id, sub.handler.clone()))
                .collect()
        };

        for (id, handler) in &handlers {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event))) {
                error!(target: "scripting", "Listener {} panicked while handling {:?}: {:?}", id, event, e);
            }
        }

        handlers.len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    pub fn is_subscribed(&self, handle: ListenerHandle) -> bool {
        self.state.lock().subscriptions.contains_key(&handle.0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHost for EventBus {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerHandle, HostError> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        debug!(target: "scripting", "Subscribing listener#{} to {:?}", id, kind);
        state.subscriptions.insert(id, Subscription { kind, handler });
        Ok(ListenerHandle(id))
    }

    fn unsubscribe(&self, handle: ListenerHandle) -> Result<(), HostError> {
        match self.state.lock().subscriptions.remove(&handle.0) {
            Some(_) => {
                debug!(target: "scripting", "Unsubscribed {}", handle);
                Ok(())
            }
            None => Err(HostError::UnknownHandle(handle.0)),
        }
    }
}
