//! # TCP transport: newline-delimited JSON frames.
//!
//! Every line on the socket is one [`Frame`]. The server speaks first:
//!
//! ```text
//! client                          server
//!   connect ───────────────────────►
//!           ◄─── {"type":"welcome","connection_id":"…"}
//!   {"type":"invoke","hub":"CommunicationHub","method":"…","args":[…]} ──►
//!           ◄─── {"type":"notify","message":"…"}
//!           ◄─── {"type":"call","method":"…","data":"…"}
//! ```
//!
//! A reader task dispatches inbound frames to the connection handlers until
//! the socket closes (reported as `Disconnected`) or the connection is
//! disposed. Malformed lines go to the error handler and reading continues.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

use super::{
    BroadcastHandler, Connection, Endpoint, ErrorHandler, HandlerSlots, NamedCallHandler,
    StateChangeHandler, Transport, TransportState,
};

const DEFAULT_HUB: &str = "CommunicationHub";
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// One line of the wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame from the server; assigns the connection id.
    Welcome { connection_id: String },
    /// Client → server call.
    Invoke {
        hub: String,
        method: String,
        args: Vec<Value>,
    },
    /// Server → client broadcast message.
    Notify { message: String },
    /// Server → client named call.
    Call { method: String, data: String },
}

/// Opens [`Frame`]-speaking TCP connections.
///
/// The endpoint's authority (`host:port`) is dialled; scheme and path are ignored.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    hub: Arc<str>,
    handshake_timeout: Duration,
}

impl TcpTransport {
    /// Transport that addresses outbound calls to `hub`.
    pub fn new(hub: impl Into<Arc<str>>) -> Self {
        Self {
            hub: hub.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Maximum wait for the welcome frame.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HUB)
    }
}

impl Transport for TcpTransport {
    fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>, TransportError> {
        Ok(Arc::new(TcpConnection {
            endpoint: endpoint.clone(),
            hub: Arc::clone(&self.hub),
            handshake_timeout: self.handshake_timeout,
            slots: Arc::new(HandlerSlots::new()),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }))
    }
}

type FrameLines = Lines<BufReader<OwnedReadHalf>>;

struct TcpConnection {
    endpoint: Endpoint,
    hub: Arc<str>,
    handshake_timeout: Duration,
    slots: Arc<HandlerSlots>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    /// Cancels the reader task of the current session.
    reader: Mutex<Option<CancellationToken>>,
}

impl TcpConnection {
    fn connect_error(&self, reason: impl Into<String>) -> TransportError {
        TransportError::Connect {
            endpoint: self.endpoint.to_string(),
            reason: reason.into(),
        }
    }

    async fn handshake(&self) -> Result<(FrameLines, OwnedWriteHalf, String), TransportError> {
        let stream = TcpStream::connect(self.endpoint.authority())
            .await
            .map_err(|e| self.connect_error(e.to_string()))?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let first = time::timeout(self.handshake_timeout, lines.next_line())
            .await
            .map_err(|_| self.connect_error("handshake timed out"))?
            .map_err(|e| self.connect_error(e.to_string()))?
            .ok_or_else(|| self.connect_error("closed during handshake"))?;

        match serde_json::from_str::<Frame>(&first)? {
            Frame::Welcome { connection_id } => Ok((lines, write, connection_id)),
            other => Err(self.connect_error(format!("expected welcome, got {other:?}"))),
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
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

        let (lines, write, connection_id) = match self.handshake().await {
            Ok(parts) => parts,
            Err(err) => {
                self.slots.transition(TransportState::Disconnected);
                return Err(err);
            }
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.reader.lock().replace(token.clone()) {
            previous.cancel();
        }
        *self.writer.lock().await = Some(write);
        self.slots.set_connection_id(Some(connection_id));
        self.slots.transition(TransportState::Connected);

        tokio::spawn(read_frames(lines, Arc::clone(&self.slots), token));
        Ok(())
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError> {
        if self.slots.state() != TransportState::Connected {
            return Err(TransportError::Closed);
        }
        let frame = Frame::Invoke {
            hub: self.hub.to_string(),
            method: method.to_string(),
            args,
        };
        let mut line = serde_json::to_string(&frame)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let socket = writer.as_mut().ok_or(TransportError::Closed)?;
        socket.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn dispose(&self) {
        if let Some(token) = self.reader.lock().take() {
            token.cancel();
        }
        if let Some(mut socket) = self.writer.lock().await.take() {
            if let Err(err) = socket.shutdown().await {
                tracing::debug!(error = %err, endpoint = %self.endpoint, "socket shutdown failed");
            }
        }
        self.slots.transition(TransportState::Disconnected);
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if let Some(token) = self.reader.get_mut().take() {
            token.cancel();
        }
    }
}

/// Reader task: dispatches frames until EOF, a read error, or cancellation.
async fn read_frames(mut lines: FrameLines, slots: Arc<HandlerSlots>, token: CancellationToken) {
    loop {
        let next = select! {
            biased;
            _ = token.cancelled() => return,
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => dispatch(&slots, &line),
            Ok(None) => break,
            Err(err) => {
                slots.report_error(&TransportError::Io(err));
                break;
            }
        }
    }
    slots.transition(TransportState::Disconnected);
}

fn dispatch(slots: &HandlerSlots, line: &str) {
    match serde_json::from_str::<Frame>(line) {
        Ok(Frame::Notify { message }) => slots.deliver_broadcast(&message),
        Ok(Frame::Call { method, data }) => slots.deliver_call(&method, &data),
        Ok(other) => tracing::debug!(frame = ?other, "ignoring unexpected frame"),
        Err(err) => slots.report_error(&TransportError::Frame(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn send(socket: &mut OwnedWriteHalf, frame: &Frame) {
        let mut line = serde_json::to_string(frame).unwrap();
        line.push('\n');
        socket.write_all(line.as_bytes()).await.unwrap();
    }

    async fn listen() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, Endpoint::parse(&format!("tcp://{addr}/hub")).unwrap())
    }

    #[test]
    fn frames_are_tagged() {
        let text = serde_json::to_string(&Frame::Notify {
            message: "hi".into(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"notify","message":"hi"}"#);

        let call: Frame =
            serde_json::from_str(r#"{"type":"call","method":"ping","data":"{}"}"#).unwrap();
        assert_eq!(
            call,
            Frame::Call {
                method: "ping".into(),
                data: "{}".into()
            }
        );
    }

    #[tokio::test]
    async fn handshake_invoke_and_inbound_frames() {
        let (listener, endpoint) = listen().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            send(&mut write, &Frame::Welcome { connection_id: "tcp-7".into() }).await;
            let invoke: Frame =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            send(&mut write, &Frame::Notify { message: "hello".into() }).await;
            send(&mut write, &Frame::Call { method: "ping".into(), data: "42".into() }).await;
            invoke
        });

        let conn = TcpTransport::default().open(&endpoint).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let t = tx.clone();
        conn.on_broadcast(Arc::new(move |m| {
            let _ = t.send(format!("b:{m}"));
        }));
        let t = tx.clone();
        conn.on_named_call(Arc::new(move |m, d| {
            let _ = t.send(format!("c:{m}:{d}"));
        }));
        conn.on_state_change(Arc::new(move |c| {
            let _ = tx.send(format!("s:{:?}", c.new));
        }));

        conn.start().await.unwrap();
        assert_eq!(conn.connection_id().as_deref(), Some("tcp-7"));
        conn.invoke("Echo", vec![json!(1)]).await.unwrap();

        let invoke = server.await.unwrap();
        assert_eq!(
            invoke,
            Frame::Invoke {
                hub: "CommunicationHub".into(),
                method: "Echo".into(),
                args: vec![json!(1)],
            }
        );

        let mut seen = Vec::new();
        while seen.len() < 5 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                "s:Connecting",
                "s:Connected",
                "b:hello",
                "c:ping:42",
                "s:Disconnected"
            ]
        );
        assert!(matches!(
            conn.invoke("Echo", vec![]).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn dropping_connection_ends_reader() {
        let (listener, endpoint) = listen().await;
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (_read, mut write) = stream.into_split();
            send(&mut write, &Frame::Welcome { connection_id: "x".into() }).await;
            let _ = go_rx.await;
            send(&mut write, &Frame::Notify { message: "late".into() }).await;
            time::sleep(Duration::from_secs(5)).await;
        });

        let conn = TcpTransport::default().open(&endpoint).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.on_broadcast(Arc::new(move |m| {
            let _ = tx.send(m.to_string());
        }));
        conn.start().await.unwrap();

        drop(conn);
        go_tx.send(()).unwrap();

        // the reader owned the last handler; it is gone once the task exits
        let next = time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn refused_connection_reports_disconnected() {
        let (listener, endpoint) = listen().await;
        drop(listener);

        let conn = TcpTransport::default().open(&endpoint).unwrap();
        let err = conn.start().await.unwrap_err();
        assert_eq!(err.as_label(), "transport_connect");
        assert_eq!(conn.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (listener, endpoint) = listen().await;
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let conn = TcpTransport::default()
            .with_handshake_timeout(Duration::from_millis(50))
            .open(&endpoint)
            .unwrap();
        let err = conn.start().await.unwrap_err();
        assert!(err.to_string().ends_with("handshake timed out"));
    }

    #[tokio::test]
    async fn malformed_line_goes_to_error_handler() {
        let (listener, endpoint) = listen().await;
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (_read, mut write) = stream.into_split();
            send(&mut write, &Frame::Welcome { connection_id: "x".into() }).await;
            write.write_all(b"not json\n").await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
        });

        let conn = TcpTransport::default().open(&endpoint).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.on_error(Arc::new(move |e| {
            let _ = tx.send(e.as_label());
        }));
        conn.start().await.unwrap();

        assert_eq!(rx.recv().await, Some("transport_frame"));
        assert_eq!(conn.state(), TransportState::Connected);
        conn.dispose().await;
        assert_eq!(conn.state(), TransportState::Disconnected);
    }
}
