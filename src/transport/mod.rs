//! Transport boundary used by the [`HubClient`](crate::HubClient).
//!
//! A [`Transport`] opens [`Connection`]s to an [`Endpoint`]. A connection
//! carries three inbound streams (broadcast messages, named calls, state
//! changes), an error channel, and one outbound primitive (`invoke`).
//!
//! ```text
//!   HubClient                       Connection
//!   ─────────                       ──────────
//!   open(endpoint)  ───────────────► (Disconnected)
//!   on_broadcast / on_named_call /
//!   on_state_change / on_error      (handlers registered)
//!   start()         ───────────────► Connecting ─► Connected
//!                   ◄─── StateChange{old,new}
//!   invoke(method, args) ──────────► remote
//!                   ◄─── broadcast(message) / named_call(method, data)
//!   clear_handlers(); dispose() ───► Disconnected
//! ```
//!
//! Handlers are plain synchronous callbacks invoked from transport tasks; they
//! must not block.
//!
//! Implementations:
//! - [`MemoryTransport`]: in-process hub for tests and demos;
//! - [`TcpTransport`]: newline-delimited JSON frames over TCP.

mod endpoint;
mod memory;
mod slots;
mod tcp;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

pub use endpoint::Endpoint;
pub use memory::{Invocation, MemoryHub, MemoryTransport};
pub(crate) use slots::HandlerSlots;
pub use tcp::{Frame, TcpTransport};

/// Receives broadcast notification messages.
pub type BroadcastHandler = Arc<dyn Fn(&str) + Send + Sync>;
/// Receives named remote calls as `(call-name, payload)`.
pub type NamedCallHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// Receives every connection state transition.
pub type StateChangeHandler = Arc<dyn Fn(StateChange) + Send + Sync>;
/// Receives asynchronous transport errors (read failures, malformed frames).
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// State reported by a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

/// One state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub old: TransportState,
    pub new: TransportState,
}

/// Factory for connections.
pub trait Transport: Send + Sync + 'static {
    /// Creates a connection in the `Disconnected` state. Nothing is sent until
    /// [`Connection::start`].
    fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>, TransportError>;
}

/// A live (or startable) connection to a remote hub.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Identifier assigned by the remote side once connected.
    fn connection_id(&self) -> Option<String>;

    fn state(&self) -> TransportState;

    fn on_broadcast(&self, handler: BroadcastHandler);

    fn on_named_call(&self, handler: NamedCallHandler);

    fn on_state_change(&self, handler: StateChangeHandler);

    fn on_error(&self, handler: ErrorHandler);

    /// Unregisters every handler; later inbound traffic is dropped.
    fn clear_handlers(&self);

    /// Performs the handshake. Reports `Connecting`, then `Connected` or `Disconnected`.
    async fn start(&self) -> Result<(), TransportError>;

    /// Sends one outbound call.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError>;

    /// Releases the connection. Idempotent.
    async fn dispose(&self);
}
