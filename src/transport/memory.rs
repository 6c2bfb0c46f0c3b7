//! # In-process hub.
//!
//! [`MemoryHub`] plays the remote side of a hub connection without sockets.
//! Clients connect through [`MemoryTransport`]; the hub can then push
//! broadcasts and named calls to them, drop them, and inspect what they
//! invoked.
//!
//! ## Scripting
//! - [`MemoryHub::fail_next`] queues connect failures: each queued reason fails one `start()`.
//! - [`MemoryHub::reject_invokes`] makes every `invoke` fail with a reason.
//! - [`MemoryHub::drop_all`] simulates the server closing every connection.
//!
//! Handlers are called on the thread that drives the hub (the caller of
//! `broadcast`, `call_client`, `drop_all`), never while a hub lock is held.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransportError;

use super::{
    BroadcastHandler, Connection, Endpoint, ErrorHandler, HandlerSlots, NamedCallHandler,
    StateChangeHandler, Transport, TransportState,
};

/// One outbound call received by the hub.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub connection_id: String,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct HubInner {
    connected: Mutex<BTreeMap<String, Arc<HandlerSlots>>>,
    failures: Mutex<VecDeque<String>>,
    rejection: Mutex<Option<String>>,
    invocations: Mutex<Vec<Invocation>>,
    next_id: AtomicU64,
}

/// Server side of the in-process transport. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-side transport connected to this hub.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { hub: self.clone() }
    }

    /// Makes the next `start()` fail with `reason`. Calls queue up.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.inner.failures.lock().push_back(reason.into());
    }

    /// Makes every `invoke` fail with `reason` (`None` accepts them again).
    pub fn reject_invokes(&self, reason: Option<String>) {
        *self.inner.rejection.lock() = reason;
    }

    /// Sends a broadcast message to every connected client. Returns the recipient count.
    pub fn broadcast(&self, message: &str) -> usize {
        let targets = self.connected();
        for slots in &targets {
            slots.deliver_broadcast(message);
        }
        targets.len()
    }

    /// Sends a named call to every connected client. Returns the recipient count.
    pub fn call_client(&self, method: &str, data: &str) -> usize {
        let targets = self.connected();
        for slots in &targets {
            slots.deliver_call(method, data);
        }
        targets.len()
    }

    /// Closes every connection from the server side. Returns how many were closed.
    pub fn drop_all(&self) -> usize {
        let dropped: Vec<_> = std::mem::take(&mut *self.inner.connected.lock())
            .into_values()
            .collect();
        for slots in &dropped {
            slots.transition(TransportState::Disconnected);
        }
        dropped.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connected.lock().len()
    }

    /// Every invocation received so far, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.inner.invocations.lock().clone()
    }

    fn connected(&self) -> Vec<Arc<HandlerSlots>> {
        self.inner.connected.lock().values().cloned().collect()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("connected", &self.connection_count())
            .finish()
    }
}

/// Client side of the in-process transport.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
}

impl Transport for MemoryTransport {
    fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>, TransportError> {
        Ok(Arc::new(MemoryConnection {
            hub: self.hub.clone(),
            endpoint: endpoint.clone(),
            slots: Arc::new(HandlerSlots::new()),
        }))
    }
}

struct MemoryConnection {
    hub: MemoryHub,
    endpoint: Endpoint,
    slots: Arc<HandlerSlots>,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn connection_id(&self) -> Option<String> {
        self.slots.connection_id()
    }

    fn state(&self) -> TransportState {
        self.slots.state()
    }

    fn on_broadcast(&self, handler: BroadcastHandler) {
        self.slots.set_broadcast(handler);
    }

    fn on_named_call(&self, handler: NamedCallHandler) {
        self.slots.set_named_call(handler);
    }

    fn on_state_change(&self, handler: StateChangeHandler) {
        self.slots.set_state_change(handler);
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.slots.set_error(handler);
    }

    fn clear_handlers(&self) {
        self.slots.clear();
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.slots.state() == TransportState::Connected {
            return Ok(());
        }
        self.slots.transition(TransportState::Connecting);

        let scripted = self.hub.inner.failures.lock().pop_front();
        if let Some(reason) = scripted {
            self.slots.transition(TransportState::Disconnected);
            return Err(TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                reason,
            });
        }

        let id = format!(
            "mem-{}",
            self.hub.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
        );
        self.slots.set_connection_id(Some(id.clone()));
        self.hub
            .inner
            .connected
            .lock()
            .insert(id, Arc::clone(&self.slots));
        self.slots.transition(TransportState::Connected);
        Ok(())
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError> {
        let connection_id = match (self.slots.state(), self.slots.connection_id()) {
            (TransportState::Connected, Some(id)) => id,
            _ => return Err(TransportError::Closed),
        };
        if let Some(reason) = self.hub.inner.rejection.lock().clone() {
            return Err(TransportError::Invoke {
                method: method.to_string(),
                reason,
            });
        }
        self.hub.inner.invocations.lock().push(Invocation {
            connection_id,
            method: method.to_string(),
            args,
        });
        Ok(())
    }

    async fn dispose(&self) {
        if let Some(id) = self.slots.connection_id() {
            self.hub.inner.connected.lock().remove(&id);
        }
        self.slots.transition(TransportState::Disconnected);
    }
}
