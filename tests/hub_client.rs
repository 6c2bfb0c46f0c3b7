//! End-to-end behaviour of the hub client over both bundled transports.

use std::sync::Arc;
use std::time::Duration;

use hublink::{
    ClientConfig, ClientMessage, ConnectionState, EventBus, Frame, HubClient, MemoryHub,
    MethodBridge, Severity, TcpTransport,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

fn texts(seen: &Mutex<Vec<ClientMessage>>) -> Vec<(Severity, String)> {
    seen.lock()
        .iter()
        .map(|m| (m.envelope.severity(), m.message().to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn retry_connect_then_stop() {
    let hub = MemoryHub::new();
    hub.fail_next("refused");

    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    bus.subscribe(move |m: &ClientMessage| s.lock().push(m.clone()));

    let client = HubClient::new("mem://hub", hub.transport(), ClientConfig::default(), None).unwrap();
    client.set_listener(bus.publisher::<ClientMessage>());
    client.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(client.is_connected());
    assert_eq!(
        texts(&seen),
        vec![
            (Severity::Diagnostic, "HubClient started.".into()),
            (
                Severity::Error,
                "Connection attempts: 1 => connect to mem://hub failed: refused".into()
            ),
            (Severity::Info, "Connected".into()),
        ]
    );
    let connected = seen.lock()[2].clone();
    assert_eq!(connected.attempts, 2);
    assert_eq!(connected.state, ConnectionState::Connected);
    assert_eq!(connected.connection_id.as_deref(), Some("mem-1"));
    assert!(seen.lock().iter().all(|m| m.envelope.name() == Some("HubClient")));

    client.stop().await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    let log = texts(&seen);
    assert_eq!(log[3], (Severity::Info, "Disconnected".into()));
    assert_eq!(log[4], (Severity::Diagnostic, "HubClient stopped.".into()));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(!client.is_running());
}

#[tokio::test(start_paused = true)]
async fn envelopes_are_ordered_by_sequence() {
    let hub = MemoryHub::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let client = HubClient::new("mem://hub", hub.transport(), ClientConfig::default(), None).unwrap();
    client.set_listener(move |m| s.lock().push(m));

    client.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    hub.broadcast("one");
    hub.broadcast("two");
    client.dispose().await;

    let seqs: Vec<u64> = seen.lock().iter().map(|m| m.envelope.seq()).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_reconnects() {
    let hub = MemoryHub::new();
    let client = HubClient::new("mem://hub", hub.transport(), ClientConfig::default(), None).unwrap();

    client.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    client.stop().await;
    assert_eq!(hub.connection_count(), 0);

    client.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(client.is_connected());
    assert_eq!(hub.connection_count(), 1);
    client.stop().await;
}

/// Minimal frame-speaking hub: welcomes one client, sends a named call,
/// then forwards every invoke it receives.
async fn tcp_hub(listener: TcpListener, invokes: mpsc::UnboundedSender<Frame>) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    for frame in [
        Frame::Welcome {
            connection_id: "tcp-1".into(),
        },
        Frame::Call {
            method: "ping".into(),
            data: "42".into(),
        },
    ] {
        let mut line = serde_json::to_string(&frame).unwrap();
        line.push('\n');
        write.write_all(line.as_bytes()).await.unwrap();
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let frame: Frame = serde_json::from_str(&line).unwrap();
        if invokes.send(frame).is_err() {
            break;
        }
    }
}

#[tokio::test]
async fn tcp_round_trip_through_bridge() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}/hub", listener.local_addr().unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(tcp_hub(listener, tx));

    let builder = MethodBridge::builder();
    let callbacks = builder.callbacks();
    let bridge = builder
        .register("ping", move |data| callbacks.server_callback("pong", &[data]))
        .build();
    let client = HubClient::new(
        &endpoint,
        TcpTransport::default(),
        ClientConfig::default(),
        Some(Arc::new(bridge)),
    )
    .unwrap();
    client.start();

    let callback = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        callback,
        Frame::Invoke {
            hub: "CommunicationHub".into(),
            method: "ServerCallback".into(),
            args: vec![json!("pong"), json!("[\"42\"]")],
        }
    );
    assert_eq!(client.connection_id().as_deref(), Some("tcp-1"));

    client.stop().await;
    let goodbye = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        goodbye,
        Frame::Invoke {
            hub: "CommunicationHub".into(),
            method: "ClientDisconnect".into(),
            args: vec![json!("123")],
        }
    );
}

#[tokio::test]
async fn stop_during_handshake_releases_the_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}/hub", listener.local_addr().unwrap());
    let (accepted_tx, accepted_rx) = oneshot::channel();
    let (welcome_tx, welcome_rx) = oneshot::channel::<()>();

    // Holds the welcome back until told, then collects lines until EOF.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        accepted_tx.send(()).unwrap();
        welcome_rx.await.unwrap();

        let mut line = serde_json::to_string(&Frame::Welcome {
            connection_id: "tcp-late".into(),
        })
        .unwrap();
        line.push('\n');
        write.write_all(line.as_bytes()).await.unwrap();

        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            received.push(line);
        }
        received
    });

    let client = HubClient::new(
        &endpoint,
        TcpTransport::default(),
        ClientConfig::default(),
        None,
    )
    .unwrap();
    client.start();
    accepted_rx.await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Connecting);

    client.stop().await;
    welcome_tx.send(()).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server never saw EOF")
        .unwrap();
    assert!(received.is_empty());
    assert!(!client.is_connected());
    assert!(!client.is_running());
    assert_eq!(client.connection_id(), None);
}
