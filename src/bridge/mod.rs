//! # Method bridge: named inbound calls and the outbound callback path.
//!
//! A [`MethodBridge`] maps call-names to handlers. The hub client hands every
//! inbound named call to [`MethodBridge::invoke`]; unknown names are ignored.
//! The table is fixed at [`MethodBridgeBuilder::build`].
//!
//! Handlers talk back to the server through [`ServerCallbacks`], a cloneable
//! handle taken from the builder before the bridge (and the client owning it)
//! exists. Once a client is constructed with the bridge, the handle forwards
//! to that client's live connection.
//!
//! ```text
//! hub ── named call(name, data) ──► HubClient ──► MethodBridge::invoke(name, data)
//!                                                        │
//!                                                        ▼ handler
//! hub ◄── "ServerCallback"(callback, json) ◄── ServerCallbacks::server_callback
//! ```
//!
//! # Example
//! ```
//! use hublink::MethodBridge;
//!
//! let builder = MethodBridge::builder();
//! let callbacks = builder.callbacks();
//! let bridge = builder
//!     .register("ping", move |data| callbacks.server_callback("pong", &[data]))
//!     .build();
//!
//! assert!(bridge.contains("ping"));
//! bridge.invoke("unknown", "ignored");
//! ```

mod callbacks;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::client::ClientCore;
use crate::error::BridgeError;

pub use callbacks::ServerCallbacks;

/// Handler for one call-name; receives the call payload.
pub type CallHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Back-reference to the client a bridge is attached to.
pub(crate) type ClientLink = Arc<RwLock<Weak<ClientCore>>>;

/// Immutable call-name → handler table.
pub struct MethodBridge {
    table: HashMap<String, CallHandler>,
    link: ClientLink,
}

impl MethodBridge {
    pub fn builder() -> MethodBridgeBuilder {
        MethodBridgeBuilder::default()
    }

    /// Runs the handler registered under `name`. Unknown names are a no-op.
    pub fn invoke(&self, name: &str, payload: &str) {
        match self.table.get(name) {
            Some(handler) => handler(payload),
            None => tracing::debug!(method = name, "no handler for inbound call"),
        }
    }

    /// Outbound handle bound to the same client as this bridge.
    pub fn callbacks(&self) -> ServerCallbacks {
        ServerCallbacks::new(Arc::clone(&self.link))
    }

    /// Id of the attached client's live connection.
    pub fn connection_id(&self) -> Option<String> {
        self.callbacks().connection_id()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Attaches the bridge to `client`. A later attach replaces the earlier one.
    pub(crate) fn attach(&self, client: Weak<ClientCore>) {
        *self.link.write() = client;
    }
}

impl fmt::Debug for MethodBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("MethodBridge").field("methods", &names).finish()
    }
}

/// Collects handlers for a [`MethodBridge`].
pub struct MethodBridgeBuilder {
    table: HashMap<String, CallHandler>,
    link: ClientLink,
}

impl Default for MethodBridgeBuilder {
    fn default() -> Self {
        Self {
            table: HashMap::new(),
            link: Arc::new(RwLock::new(Weak::new())),
        }
    }
}

impl MethodBridgeBuilder {
    /// Registers `handler` under `name`. A second registration for the same
    /// name replaces the first.
    pub fn register<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.table.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(method = %name, "call-name registered twice; keeping the last handler");
        }
        self
    }

    /// Like [`register`](Self::register) but rejects a name that is already taken.
    pub fn try_register<F>(self, name: impl Into<String>, handler: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.table.contains_key(&name) {
            return Err(BridgeError::DuplicateMethod { name });
        }
        Ok(self.register(name, handler))
    }

    /// Outbound handle for handlers to capture; live once a client owns the bridge.
    pub fn callbacks(&self) -> ServerCallbacks {
        ServerCallbacks::new(Arc::clone(&self.link))
    }

    pub fn build(self) -> MethodBridge {
        MethodBridge {
            table: self.table,
            link: self.link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording(
        seen: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&str) + Send + Sync + use<> {
        let seen = Arc::clone(seen);
        move |payload| seen.lock().push(format!("{tag}:{payload}"))
    }

    #[test]
    fn dispatches_by_name_and_ignores_unknown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bridge = MethodBridge::builder()
            .register("alpha", recording(&seen, "a"))
            .register("beta", recording(&seen, "b"))
            .build();

        bridge.invoke("beta", "1");
        bridge.invoke("gamma", "2");
        bridge.invoke("alpha", "3");

        assert_eq!(*seen.lock(), vec!["b:1", "a:3"]);
        assert_eq!(bridge.len(), 2);
    }

    #[test]
    fn last_registration_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bridge = MethodBridge::builder()
            .register("dup", recording(&seen, "first"))
            .register("dup", recording(&seen, "second"))
            .build();

        bridge.invoke("dup", "x");
        assert_eq!(*seen.lock(), vec!["second:x"]);
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn try_register_rejects_duplicates() {
        let err = MethodBridge::builder()
            .try_register("dup", |_| {})
            .and_then(|b| b.try_register("dup", |_| {}))
            .err();
        assert_eq!(
            err,
            Some(BridgeError::DuplicateMethod { name: "dup".into() })
        );
    }

    #[test]
    fn detached_bridge_has_no_connection() {
        let bridge = MethodBridge::builder().build();
        assert!(bridge.is_empty());
        assert_eq!(bridge.connection_id(), None);
    }
}
