use std::sync::Mutex;

use serde_json::Value;

use super::{Listener, ListenerId, ListenerRegistry, Transport};
use crate::error::TransportError;

/// In-memory transport double. Records emissions and lets tests play the
/// server side with [`FakeTransport::deliver`].
#[derive(Default)]
pub struct FakeTransport {
    registry: ListenerRegistry,
    emitted: Mutex<Vec<(String, Value)>>,
    closed: Mutex<bool>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        self.registry.dispatch(event, payload)
    }

    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.count(event)
    }

    /// Make subsequent emits fail as if the socket had dropped.
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

impl Transport for FakeTransport {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.registry.add(event, listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if *self.closed.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        self.emitted.lock().unwrap().push((event.to_string(), payload));
        Ok(())
    }
}
