//! # Handler slots and state cell shared by the bundled transports.
//!
//! [`HandlerSlots`] keeps at most one handler per inbound stream plus the
//! connection state. Handlers are cloned out of their slot before being
//! called, so a handler may clear or replace slots (or dispose the connection)
//! without deadlocking.

use parking_lot::{Mutex, RwLock};

use crate::error::TransportError;

use super::{
    BroadcastHandler, ErrorHandler, NamedCallHandler, StateChange, StateChangeHandler,
    TransportState,
};

pub(crate) struct HandlerSlots {
    state: Mutex<TransportState>,
    connection_id: Mutex<Option<String>>,
    broadcast: RwLock<Option<BroadcastHandler>>,
    named_call: RwLock<Option<NamedCallHandler>>,
    state_change: RwLock<Option<StateChangeHandler>>,
    error: RwLock<Option<ErrorHandler>>,
}

impl HandlerSlots {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TransportState::Disconnected),
            connection_id: Mutex::new(None),
            broadcast: RwLock::new(None),
            named_call: RwLock::new(None),
            state_change: RwLock::new(None),
            error: RwLock::new(None),
        }
    }

    pub(crate) fn state(&self) -> TransportState {
        *self.state.lock()
    }

    pub(crate) fn connection_id(&self) -> Option<String> {
        self.connection_id.lock().clone()
    }

    pub(crate) fn set_connection_id(&self, id: Option<String>) {
        *self.connection_id.lock() = id;
    }

    pub(crate) fn set_broadcast(&self, handler: BroadcastHandler) {
        *self.broadcast.write() = Some(handler);
    }

    pub(crate) fn set_named_call(&self, handler: NamedCallHandler) {
        *self.named_call.write() = Some(handler);
    }

    pub(crate) fn set_state_change(&self, handler: StateChangeHandler) {
        *self.state_change.write() = Some(handler);
    }

    pub(crate) fn set_error(&self, handler: ErrorHandler) {
        *self.error.write() = Some(handler);
    }

    pub(crate) fn clear(&self) {
        *self.broadcast.write() = None;
        *self.named_call.write() = None;
        *self.state_change.write() = None;
        *self.error.write() = None;
    }

    /// Moves to `new` and notifies the state handler if the state changed.
    pub(crate) fn transition(&self, new: TransportState) {
        let old = std::mem::replace(&mut *self.state.lock(), new);
        if old == new {
            return;
        }
        let handler = self.state_change.read().clone();
        if let Some(handler) = handler {
            handler(StateChange { old, new });
        }
    }

    pub(crate) fn deliver_broadcast(&self, message: &str) {
        let handler = self.broadcast.read().clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    pub(crate) fn deliver_call(&self, method: &str, data: &str) {
        let handler = self.named_call.read().clone();
        if let Some(handler) = handler {
            handler(method, data);
        }
    }

    pub(crate) fn report_error(&self, err: &TransportError) {
        let handler = self.error.read().clone();
        match handler {
            Some(handler) => handler(err),
            None => tracing::debug!(error = %err, "transport error without handler"),
        }
    }
}
