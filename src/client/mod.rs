//! Auto-reconnecting hub client.
//!
//! Internal modules:
//! - [`hub`]: [`HubClient`] and the connection state it shares with transport handlers;
//! - [`config`]: [`ClientConfig`] (cadence and wire call-names);
//! - [`message`]: [`ClientMessage`] and [`ConnectionState`], what listeners see.

mod config;
mod hub;
mod message;

pub use config::ClientConfig;
pub(crate) use hub::ClientCore;
pub use hub::HubClient;
pub use message::{ClientListener, ClientMessage, ConnectionState};
