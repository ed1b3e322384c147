pub mod packet;
pub mod socketio;

#[cfg(test)]
pub mod fake;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::TransportError;

pub use socketio::SocketIoTransport;

/// Event names on the channel.
pub mod events {
    pub const CONNECT: &str = "connect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const DISCONNECT: &str = "disconnect";
    pub const BOT_RESPONSE: &str = "bot_response";
    pub const ERROR: &str = "error";
    pub const USER_MESSAGE: &str = "user_message";
}

pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Handle to a single long-lived, message-framed, full-duplex connection.
pub trait Transport: Send + Sync {
    /// Register a listener for a named event.
    fn on(&self, event: &str, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn off(&self, id: ListenerId) -> bool;

    /// Emit a named event with a JSON payload. Delivery is best effort.
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;
}

/// Named-event listener table shared by the transport implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
        }
        listeners.retain(|_, entries| !entries.is_empty());
        removed
    }

    pub fn count(&self, event: &str) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Invoke every listener for `event`. Returns how many were called.
    ///
    /// Listeners run outside the lock so they may register or remove
    /// listeners themselves.
    pub fn dispatch(&self, event: &str, payload: Value) -> usize {
        let targets: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .get(event)
                .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default()
        };

        for listener in &targets {
            listener(payload.clone());
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_dispatch_reaches_only_named_listeners() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry.add("bot_response", Arc::new(move |_: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(registry.dispatch("bot_response", Value::Null), 1);
        assert_eq!(registry.dispatch("error", Value::Null), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_only_drops_that_listener() {
        let registry = ListenerRegistry::new();
        let first = registry.add("error", Arc::new(|_: Value| {}));
        let _second = registry.add("error", Arc::new(|_: Value| {}));

        assert!(registry.remove(first));
        assert!(!registry.remove(first));
        assert_eq!(registry.count("error"), 1);
    }

    #[test]
    fn test_listener_may_deregister_itself() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let reg = Arc::clone(&registry);
        let own_id = Arc::clone(&slot);
        let id = registry.add("connect", Arc::new(move |_: Value| {
            if let Some(id) = *own_id.lock().unwrap() {
                reg.remove(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        assert_eq!(registry.dispatch("connect", Value::Null), 1);
        assert_eq!(registry.count("connect"), 0);
    }
}
