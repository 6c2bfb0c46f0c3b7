//! # hublink
//!
//! **hublink** keeps a long-lived connection to a remote message hub alive in
//! the background and turns everything that happens on it into typed,
//! timestamped envelopes.
//!
//! It provides a cancellable supervised loop ([`Runner`]), an auto-reconnecting
//! client built on it ([`HubClient`]), a call-name dispatch table for inbound
//! remote calls ([`MethodBridge`]) and an in-process typed publish/subscribe
//! registry ([`EventBus`]).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            ┌───────────────────────────────────────────────┐
//!            │  HubClient                                    │
//!            │  - Runner (supervised loop, two-speed pace)   │
//!            │  - connection state machine + attempt counter │
//!            └──────┬──────────────────────┬─────────────────┘
//!                   │ open / start / invoke│ named calls
//!                   ▼                      ▼
//!        ┌──────────────────┐     ┌──────────────────┐
//!        │ Transport        │     │  MethodBridge    │
//!        │ (Memory / Tcp)   │     │ name → handler   │
//!        └────────┬─────────┘     └────────┬─────────┘
//!                 │ state / broadcast      │ ServerCallbacks
//!                 ▼                        ▼
//!          ClientMessage ──► listener ──► EventBus::publisher / LogWriter
//!                                              │
//!                                   ┌──────────┼──────────┐
//!                                   ▼          ▼          ▼
//!                                 sub1       sub2       subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! HubClient::start() ──► Runner::start() ──► emit "<name> started."
//!
//! loop {
//!   ├─► connected? ── yes ──► sleep(steady_delay)
//!   ├─► open + wire handlers + start
//!   │       ├─ Ok  ──► "Connected" (attempt snapshot), pace = steady_delay
//!   │       └─ Err ──► "Connection attempts: n => reason", pace = connect_delay
//!   └─► sleep(pace) (cancellable)
//! }
//!
//! server drop ──► "Disconnected" ──► next iteration reconnects
//! HubClient::stop() ──► ClientDisconnect notification, dispose, "Disconnected", "<name> stopped."
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / traits                         |
//! |-----------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Runner**      | Cancellable loop with failure and panic containment.         | [`Runner`], [`Runnable`], [`Pace`]         |
//! | **Client**      | Auto-reconnecting hub connection with state reporting.       | [`HubClient`], [`ClientConfig`]            |
//! | **Dispatch**    | Inbound named calls and the outbound callback path.          | [`MethodBridge`], [`ServerCallbacks`]      |
//! | **Events**      | Timestamped envelopes and a typed publish/subscribe bus.     | [`Envelope`], [`EventBus`]                 |
//! | **Transports**  | In-process hub for tests and demos, JSON lines over TCP.     | [`MemoryHub`], [`TcpTransport`]            |
//! | **Errors**      | Typed errors with stable labels.                             | [`RunError`], [`ClientError`]              |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders envelopes through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hublink::{ClientConfig, ClientMessage, EventBus, HubClient, MemoryHub, MethodBridge};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = MemoryHub::new();
//!     let bus = EventBus::new();
//!     bus.subscribe(|m: &ClientMessage| println!("{m}"));
//!
//!     let bridge = MethodBridge::builder()
//!         .register("refresh", |data| println!("refresh requested: {data}"))
//!         .build();
//!
//!     let client = HubClient::new(
//!         "mem://hub",
//!         hub.transport(),
//!         ClientConfig::default(),
//!         Some(Arc::new(bridge)),
//!     )?;
//!     client.set_listener(bus.publisher::<ClientMessage>());
//!     client.start();
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     hub.call_client("refresh", "all");
//!     client.call_server("Echo", &["hello"]).await?;
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```
mod bridge;
mod client;
mod error;
mod events;
mod runner;
mod subscribers;
mod transport;

// ---- Public re-exports ----

pub use bridge::{CallHandler, MethodBridge, MethodBridgeBuilder, ServerCallbacks};
pub use client::{ClientConfig, ClientListener, ClientMessage, ConnectionState, HubClient};
pub use error::{BridgeError, ClientError, RunError, TransportError};
pub use events::{Delivery, Envelope, EventBus, EventMessage, Severity, SubscriptionId};
pub use runner::{EventSink, Pace, RunContext, Runnable, Runner};
pub use transport::{
    BroadcastHandler, Connection, Endpoint, ErrorHandler, Frame, Invocation, MemoryHub,
    MemoryTransport, NamedCallHandler, StateChange, StateChangeHandler, TcpTransport, Transport,
    TransportState,
};

// Optional: expose the tracing-backed envelope writer.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
