//! # HubClient: auto-reconnecting connection to a remote hub.
//!
//! The client is a [`Runner`] whose iteration keeps one transport connection
//! alive. Transport notifications drive a small state machine:
//!
//! ```text
//! Connecting / Reconnecting ──► attempts += 1
//! Connected                  ──► emit Info "Connected" (attempt snapshot), attempts = 0
//! Disconnected (was up)      ──► spawn teardown ──► emit Info "Disconnected"
//!
//! iteration:
//!   connected?  ── yes ──► nothing (steady pace)
//!       │ no
//!       ▼
//!   discard stale connection, open, wire handlers, start
//!       ├─ Ok  ──► pace = steady_delay
//!       └─ Err ──► pace = connect_delay, emit Error "Connection attempts: n => reason"
//! ```
//!
//! ## Rules
//! - Transport handlers hold weak references; a dropped client never leaks through them.
//! - Teardown only acts on the connection it was raised for, so a late
//!   notification from a replaced connection cannot close its successor.
//! - Nothing here is fatal: every failure is reported as an envelope and retried.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;

use crate::bridge::MethodBridge;
use crate::client::config::ClientConfig;
use crate::client::message::{ClientListener, ClientMessage, ConnectionState};
use crate::error::{ClientError, RunError, TransportError};
use crate::events::Envelope;
use crate::runner::{Pace, RunContext, Runnable, Runner};
use crate::transport::{Connection, Endpoint, StateChange, Transport, TransportState};

/// Connection state shared by the runner iteration, transport handlers and the public handle.
pub(crate) struct ClientCore {
    me: Weak<ClientCore>,
    endpoint: Endpoint,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    bridge: Option<Arc<MethodBridge>>,
    pace: Pace,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU32,
    listener: RwLock<Option<ClientListener>>,
}

impl ClientCore {
    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn current(&self) -> Option<Arc<dyn Connection>> {
        self.connection.lock().clone()
    }

    fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|c| c.state() == TransportState::Connected)
    }

    pub(crate) fn connection_id(&self) -> Option<String> {
        self.current().and_then(|c| c.connection_id())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wraps `envelope` with a snapshot of the client and hands it to the listener.
    fn deliver(&self, envelope: Envelope) {
        let listener = self.listener.read().clone();
        let Some(listener) = listener else {
            return;
        };
        listener(ClientMessage {
            envelope,
            state: self.state(),
            attempts: self.attempts(),
            connection_id: self.connection_id(),
        });
    }

    fn emit(&self, envelope: Envelope) {
        self.deliver(envelope.with_name(self.config.name.as_str()));
    }

    pub(crate) async fn call_server<S: Serialize>(
        &self,
        method: &str,
        args: &[S],
    ) -> Result<(), ClientError> {
        let Some(connection) = self.current() else {
            return Ok(());
        };
        let args = args
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        connection.invoke(method, args).await?;
        Ok(())
    }

    /// Removes the stored connection; with `expected`, only if it is that connection.
    fn take_connection(
        &self,
        expected: Option<&Arc<dyn Connection>>,
    ) -> Option<Arc<dyn Connection>> {
        let mut slot = self.connection.lock();
        match (slot.as_ref(), expected) {
            (Some(current), Some(expected)) if !Arc::ptr_eq(current, expected) => None,
            _ => slot.take(),
        }
    }

    /// Full disconnect of whatever connection is stored. Silent when there is none.
    async fn disconnect(&self) {
        if let Some(connection) = self.take_connection(None) {
            self.teardown(connection).await;
        }
    }

    async fn teardown(&self, connection: Arc<dyn Connection>) {
        connection.clear_handlers();
        if connection.state() == TransportState::Connected {
            let payload = vec![Value::from(self.config.disconnect_payload.as_str())];
            if let Err(err) = connection
                .invoke(&self.config.disconnect_method, payload)
                .await
            {
                tracing::debug!(
                    client = %self.config.name,
                    label = err.as_label(),
                    error = %err,
                    "disconnect notification failed"
                );
            }
        }
        connection.dispose().await;

        self.pace.set(self.config.connect_delay());
        *self.state.lock() = ConnectionState::Disconnected;
        self.emit(Envelope::info("Disconnected"));
    }

    /// Spawns a teardown of `connection` if it is still the stored one.
    fn schedule_teardown(&self, connection: &Weak<dyn Connection>) {
        let (Some(core), Some(connection)) = (self.me.upgrade(), connection.upgrade()) else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(client = %self.config.name, "no tokio runtime; teardown skipped");
            return;
        };
        handle.spawn(async move {
            if let Some(connection) = core.take_connection(Some(&connection)) {
                core.teardown(connection).await;
            }
        });
    }

    fn on_state_change(&self, change: StateChange, connection: &Weak<dyn Connection>) {
        *self.state.lock() = change.new.into();
        match change.new {
            TransportState::Connecting | TransportState::Reconnecting => {
                self.attempts.fetch_add(1, Ordering::SeqCst);
            }
            TransportState::Connected => {
                self.emit(Envelope::info("Connected"));
                self.attempts.store(0, Ordering::SeqCst);
            }
            TransportState::Disconnected => {
                // A failed start is handled by the iteration itself.
                if matches!(
                    change.old,
                    TransportState::Connected | TransportState::Reconnecting
                ) {
                    self.schedule_teardown(connection);
                }
            }
        }
    }

    fn on_broadcast(&self, message: &str) {
        self.emit(Envelope::info(format!("Incoming data: {message}")));
    }

    fn on_named_call(&self, method: &str, data: &str) {
        match &self.bridge {
            Some(bridge) => bridge.invoke(method, data),
            None => tracing::debug!(client = %self.config.name, method, "no bridge for inbound call"),
        }
    }

    fn on_error(&self, err: &TransportError, connection: &Weak<dyn Connection>) {
        tracing::warn!(
            client = %self.config.name,
            label = err.as_label(),
            error = %err,
            "transport error; closing connection"
        );
        self.schedule_teardown(connection);
    }

    /// Registers the client's handlers on `connection`.
    fn wire(&self, connection: &Arc<dyn Connection>) {
        let weak_conn = Arc::downgrade(connection);

        let me = self.me.clone();
        connection.on_broadcast(Arc::new(move |message| {
            if let Some(core) = me.upgrade() {
                core.on_broadcast(message);
            }
        }));

        let me = self.me.clone();
        connection.on_named_call(Arc::new(move |method, data| {
            if let Some(core) = me.upgrade() {
                core.on_named_call(method, data);
            }
        }));

        let me = self.me.clone();
        let conn = weak_conn.clone();
        connection.on_state_change(Arc::new(move |change| {
            if let Some(core) = me.upgrade() {
                core.on_state_change(change, &conn);
            }
        }));

        let me = self.me.clone();
        connection.on_error(Arc::new(move |err| {
            if let Some(core) = me.upgrade() {
                core.on_error(err, &weak_conn);
            }
        }));
    }

    async fn connect(&self, ctx: &RunContext) -> Result<(), TransportError> {
        let connection = self.transport.open(&self.endpoint)?;
        *self.state.lock() = ConnectionState::Connecting;
        self.wire(&connection);
        *self.connection.lock() = Some(Arc::clone(&connection));

        if let Err(err) = connection.start().await {
            if let Some(failed) = self.take_connection(Some(&connection)) {
                failed.clear_handlers();
                failed.dispose().await;
            }
            return Err(err);
        }

        // stop() may have taken the connection while the handshake was in flight.
        let held = self
            .current()
            .is_some_and(|current| Arc::ptr_eq(&current, &connection));
        if !held {
            connection.clear_handlers();
            connection.dispose().await;
        } else if ctx.is_cancelled() {
            if let Some(late) = self.take_connection(Some(&connection)) {
                self.teardown(late).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Runnable for ClientCore {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self, ctx: &RunContext) -> Result<(), RunError> {
        if self.is_connected() {
            return Ok(());
        }

        if let Some(stale) = self.take_connection(None) {
            stale.clear_handlers();
            stale.dispose().await;
        }

        match self.connect(ctx).await {
            Ok(()) if self.is_connected() => self.pace.set(self.config.steady_delay()),
            Ok(()) => {}
            Err(err) => {
                self.pace.set(self.config.connect_delay());
                self.emit(Envelope::error(format!(
                    "Connection attempts: {} => {}",
                    self.attempts(),
                    err
                )));
            }
        }
        Ok(())
    }
}

/// Auto-reconnecting client for a remote hub.
///
/// ### Responsibilities
/// - **Connection upkeep**: retries every `connect_delay` until connected, then checks every `steady_delay`
/// - **Inbound dispatch**: named calls go to the [`MethodBridge`], broadcasts to the listener
/// - **Outbound calls**: [`call_server`](Self::call_server) on the live connection
/// - **Reporting**: every lifecycle and failure event reaches the listener as a [`ClientMessage`]
///
/// # Example
/// ```no_run
/// use hublink::{ClientConfig, HubClient, MemoryHub};
///
/// # #[tokio::main] async fn main() -> Result<(), hublink::ClientError> {
/// let hub = MemoryHub::new();
/// let client = HubClient::new("mem://hub", hub.transport(), ClientConfig::default(), None)?;
/// client.set_listener(|msg| println!("{msg}"));
/// client.start();
/// // ...
/// client.stop().await;
/// # Ok(()) }
/// ```
pub struct HubClient {
    core: Arc<ClientCore>,
    runner: Runner,
}

impl HubClient {
    /// Creates a stopped client. Fails if `endpoint` is blank.
    ///
    /// When `bridge` is given it is attached to this client: inbound named
    /// calls are dispatched to it and its [`ServerCallbacks`](crate::ServerCallbacks)
    /// forward to this client's connection.
    pub fn new<T: Transport>(
        endpoint: &str,
        transport: T,
        config: ClientConfig,
        bridge: Option<Arc<MethodBridge>>,
    ) -> Result<Self, ClientError> {
        let endpoint = Endpoint::parse(endpoint)?;
        let pace = Pace::new(config.connect_delay());

        let core = Arc::new_cyclic(|me| ClientCore {
            me: me.clone(),
            endpoint,
            config,
            transport: Arc::new(transport),
            bridge,
            pace: pace.clone(),
            connection: Mutex::new(None),
            state: Mutex::new(ConnectionState::Off),
            attempts: AtomicU32::new(0),
            listener: RwLock::new(None),
        });
        if let Some(bridge) = &core.bridge {
            bridge.attach(Arc::downgrade(&core));
        }

        let runner = Runner::with_pace(core.clone(), pace);
        let weak = Arc::downgrade(&core);
        runner.set_sink(Arc::new(move |envelope| {
            if let Some(core) = weak.upgrade() {
                core.deliver(envelope);
            }
        }));

        Ok(Self { core, runner })
    }

    /// Starts the connection loop on the ambient tokio runtime. No-op if running.
    pub fn start(&self) {
        self.runner.start();
    }

    /// Disconnects (notifying the hub when connected), then stops the loop.
    pub async fn stop(&self) {
        self.core.disconnect().await;
        self.runner.stop();
    }

    /// Stops the client and waits for the transport to be released.
    pub async fn dispose(self) {
        self.stop().await;
    }

    /// Sends `method` with each of `args` serialized to JSON.
    ///
    /// Without a live connection this is a no-op returning `Ok(())`.
    pub async fn call_server<S: Serialize>(
        &self,
        method: &str,
        args: &[S],
    ) -> Result<(), ClientError> {
        self.core.call_server(method, args).await
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    pub fn connection_id(&self) -> Option<String> {
        self.core.connection_id()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.core.state()
    }

    /// Attempts since the last successful connection.
    pub fn connection_attempts(&self) -> u32 {
        self.core.attempts()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.core.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.core.config
    }

    /// Current inter-iteration delay (`connect_delay` or `steady_delay`).
    pub fn pace(&self) -> &Pace {
        self.runner.pace()
    }

    /// Replaces the listener. It is called synchronously and must not block.
    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(ClientMessage) + Send + Sync + 'static,
    {
        *self.core.listener.write() = Some(Arc::new(listener));
    }

    pub fn clear_listener(&self) {
        *self.core.listener.write() = None;
    }
}

impl Drop for HubClient {
    fn drop(&mut self) {
        let Some(connection) = self.core.take_connection(None) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let core = Arc::clone(&self.core);
                handle.spawn(async move { core.teardown(connection).await });
            }
            Err(_) => {
                connection.clear_handlers();
                tracing::debug!(client = %self.core.config.name, "dropped outside a runtime; connection not disposed");
            }
        }
    }
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("endpoint", &self.core.endpoint)
            .field("state", &self.core.state())
            .field("attempts", &self.core.attempts())
            .field("running", &self.runner.is_running())
            .finish()
    }
}
