//! # Example: echo_hub
//!
//! An in-process hub and one client wired into an event bus.
//!
//! Demonstrates how to:
//! - Script connection failures on a [`MemoryHub`] and watch the client retry.
//! - Dispatch named calls through a [`MethodBridge`] and answer with [`ServerCallbacks`].
//! - Fan client messages out through an [`EventBus`] to a [`LogWriter`] and a counter.
//! - Survive a server-side drop and shut down cleanly.
//!
//! ## Flow
//! ```text
//! hub.fail_next × 2 ──► client.start()
//!     ├─► "Connection attempts: 1 => …", "Connection attempts: 2 => …"
//!     ├─► "Connected" (attempts = 3)
//!     ├─► hub.call_client("ping") ──► bridge ──► "ServerCallback"("pong", …)
//!     ├─► hub.broadcast(…) ──► "Incoming data: …"
//!     ├─► hub.drop_all() ──► "Disconnected" ──► reconnect
//!     └─► client.dispose() ──► "ClientDisconnect"("123"), "Disconnected", "echo stopped."
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example echo_hub
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hublink::{
    ClientConfig, ClientMessage, EventBus, HubClient, LogWriter, MemoryHub, MethodBridge,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let hub = MemoryHub::new();
    hub.fail_next("hub warming up");
    hub.fail_next("hub warming up");

    let bus = EventBus::new();
    let writer = LogWriter::new();
    bus.subscribe(move |m: &ClientMessage| writer.write(&m.envelope));
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    bus.subscribe(move |m: &ClientMessage| {
        if m.envelope.is_error() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let builder = MethodBridge::builder();
    let callbacks = builder.callbacks();
    let bridge = builder
        .register("ping", move |data| {
            callbacks.server_callback("pong", &[serde_json::json!({ "echo": data })])
        })
        .build();

    let config = ClientConfig::default().named("echo");
    let client = HubClient::new("mem://demo", hub.transport(), config, Some(Arc::new(bridge)))?;
    client.set_listener(bus.publisher::<ClientMessage>());
    client.start();

    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("connected as {:?}", client.connection_id());

    hub.call_client("ping", "hello");
    hub.broadcast("maintenance at 02:00");
    client.call_server("Echo", &["from client"]).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    hub.drop_all();
    // the steady poll notices the drop on its next tick
    tokio::time::sleep(client.config().steady_delay() + Duration::from_millis(100)).await;
    println!("reconnected as {:?}", client.connection_id());

    client.dispose().await;

    for call in hub.invocations() {
        println!("hub received {} {:?} from {}", call.method, call.args, call.connection_id);
    }
    println!("errors seen: {}", errors.load(Ordering::Relaxed));
    Ok(())
}
