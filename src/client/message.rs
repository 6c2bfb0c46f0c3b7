//! What a [`HubClient`](crate::HubClient) listener receives.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::events::{Envelope, EventMessage};
use crate::transport::TransportState;

/// Listener installed with [`HubClient::set_listener`](crate::HubClient::set_listener).
pub type ClientListener = Arc<dyn Fn(ClientMessage) + Send + Sync>;

/// Client-level view of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport connection has been created yet.
    #[default]
    Off,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl ConnectionState {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Off => "off",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl From<TransportState> for ConnectionState {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::Connecting => ConnectionState::Connecting,
            TransportState::Connected => ConnectionState::Connected,
            TransportState::Reconnecting => ConnectionState::Reconnecting,
            TransportState::Disconnected => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// An envelope plus a snapshot of the client taken when it was emitted.
///
/// `attempts` on the `"Connected"` message is the number of attempts it took
/// to connect; the counter resets right after.
#[derive(Clone, Debug)]
pub struct ClientMessage {
    pub envelope: Envelope,
    pub state: ConnectionState,
    pub attempts: u32,
    pub connection_id: Option<String>,
}

impl ClientMessage {
    pub fn message(&self) -> &str {
        self.envelope.message()
    }
}

impl EventMessage for ClientMessage {
    fn timestamp(&self) -> SystemTime {
        self.envelope.at()
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (state={} attempts={})", self.envelope, self.state, self.attempts)
    }
}
