//! # Hub client configuration.
//!
//! [`ClientConfig`] holds the client's diagnostic name, its two-speed
//! reconnect cadence and the call-names it uses on the wire.
//!
//! ## Cadence
//! - `connect_delay_ms`: pause between connection attempts while disconnected (fast retry).
//! - `steady_delay_ms`: pause between liveness checks once connected (slow poll).
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use hublink::ClientConfig;
//!
//! let cfg: ClientConfig = serde_json::from_str(r#"{ "name": "edge-7" }"#).unwrap();
//! assert_eq!(cfg.name, "edge-7");
//! assert_eq!(cfg.connect_delay_ms, 10);
//! assert_eq!(cfg.steady_delay().as_millis(), 5000);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`HubClient`](crate::HubClient).
///
/// ## Notes
/// All fields are public. Prefer the `*_delay()` accessors over converting the
/// millisecond fields by hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name carried by every envelope the client emits.
    pub name: String,

    /// Delay between iterations while disconnected.
    pub connect_delay_ms: u64,

    /// Delay between iterations while connected.
    pub steady_delay_ms: u64,

    /// Call-name of the best-effort notification sent before a voluntary disconnect.
    pub disconnect_method: String,

    /// Single argument of the disconnect notification.
    pub disconnect_payload: String,

    /// Call-name used by [`ServerCallbacks::server_callback`](crate::ServerCallbacks::server_callback).
    pub callback_method: String,
}

impl ClientConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn steady_delay(&self) -> Duration {
        Duration::from_millis(self.steady_delay_ms)
    }

    /// Same settings under another name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for ClientConfig {
    /// - `name = "HubClient"`
    /// - `connect_delay_ms = 10`, `steady_delay_ms = 5000`
    /// - `disconnect_method = "ClientDisconnect"`, `disconnect_payload = "123"`
    /// - `callback_method = "ServerCallback"`
    fn default() -> Self {
        Self {
            name: "HubClient".to_string(),
            connect_delay_ms: 10,
            steady_delay_ms: 5000,
            disconnect_method: "ClientDisconnect".to_string(),
            disconnect_payload: "123".to_string(),
            callback_method: "ServerCallback".to_string(),
        }
    }
}
