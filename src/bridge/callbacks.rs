use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::client::ClientCore;

use super::ClientLink;

/// Cloneable outbound path from call handlers back to the server.
///
/// Calls are fire-and-forget: they are spawned on the ambient tokio runtime
/// and failures are only traced. Before the owning bridge is attached to a
/// client (or after the client is gone) calls are dropped.
#[derive(Clone)]
pub struct ServerCallbacks {
    link: ClientLink,
}

impl ServerCallbacks {
    pub(crate) fn new(link: ClientLink) -> Self {
        Self { link }
    }

    fn client(&self) -> Option<Arc<ClientCore>> {
        self.link.read().upgrade()
    }

    /// Serializes `args` to a JSON array text and sends `[callback, text]`
    /// to the server under the client's callback call-name.
    pub fn server_callback<S: Serialize>(&self, callback: &str, args: &[S]) {
        let data = match serde_json::to_string(args) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(callback, error = %err, "callback arguments not serializable");
                return;
            }
        };
        self.send(vec![Value::from(callback), Value::from(data)]);
    }

    /// Sends `args` under an arbitrary call-name, fire-and-forget.
    pub fn call(&self, method: &str, args: Vec<Value>) {
        let Some(client) = self.client() else {
            tracing::debug!(method, "bridge not attached to a client; dropping call");
            return;
        };
        spawn_call(client, method.to_string(), args);
    }

    /// Id of the attached client's live connection.
    pub fn connection_id(&self) -> Option<String> {
        self.client().and_then(|c| c.connection_id())
    }

    fn send(&self, args: Vec<Value>) {
        let Some(client) = self.client() else {
            tracing::debug!("bridge not attached to a client; dropping callback");
            return;
        };
        let method = client.config().callback_method.clone();
        spawn_call(client, method, args);
    }
}

fn spawn_call(client: Arc<ClientCore>, method: String, args: Vec<Value>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!(method = %method, "no tokio runtime; dropping outbound call");
        return;
    };
    handle.spawn(async move {
        if let Err(err) = client.call_server(&method, args.as_slice()).await {
            tracing::debug!(method = %method, label = err.as_label(), error = %err, "outbound call failed");
        }
    });
}

impl std::fmt::Debug for ServerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCallbacks")
            .field("attached", &self.client().is_some())
            .finish()
    }
}
