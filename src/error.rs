//! Error types used by the runner, the hub client and its transports.
//!
//! This module defines four error enums:
//!
//! - [`RunError`]: a single runner iteration failed (contained by the loop).
//! - [`TransportError`]: a transport could not connect, send or decode.
//! - [`ClientError`]: a [`HubClient`](crate::HubClient) call failed.
//! - [`BridgeError`]: strict registration on a [`MethodBridge`](crate::MethodBridge) failed.
//!
//! Each type provides `as_label` (stable snake_case label for logs).
//! None of them is fatal to the process: the runner loop reports every
//! failure as an [`Envelope`](crate::Envelope) and keeps going.

use thiserror::Error;

/// # Errors produced by one runner iteration.
///
/// Returned from [`Runnable::run`](crate::Runnable::run). The runner catches
/// every variant, reports it as an `Error` envelope and schedules the next
/// iteration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// Iteration failed with a plain reason.
    #[error("{reason}")]
    Fail {
        /// The underlying failure message.
        reason: String,
    },

    /// Iteration failed because the transport failed.
    #[error("transport failure")]
    Transport(#[from] TransportError),

    /// Iteration panicked; the panic was caught by the loop.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl RunError {
    /// Shorthand for [`RunError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        RunError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use hublink::RunError;
    ///
    /// assert_eq!(RunError::fail("boom").as_label(), "run_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::Fail { .. } => "run_failed",
            RunError::Transport(_) => "run_transport",
            RunError::Panicked { .. } => "run_panicked",
        }
    }
}

/// # Errors produced by a transport.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect to {endpoint} failed: {reason}")]
    Connect {
        /// Target endpoint.
        endpoint: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The connection is closed or was never started.
    #[error("connection closed")]
    Closed,

    /// The remote side rejected an invocation.
    #[error("invoke {method} failed: {reason}")]
    Invoke {
        /// Outbound call-name.
        method: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Socket-level failure.
    #[error("i/o error")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("malformed frame")]
    Frame(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Connect { .. } => "transport_connect",
            TransportError::Closed => "transport_closed",
            TransportError::Invoke { .. } => "transport_invoke",
            TransportError::Io(_) => "transport_io",
            TransportError::Frame(_) => "transport_frame",
        }
    }
}

/// # Errors produced by the hub client API.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// Endpoint was empty or whitespace.
    #[error("invalid endpoint {endpoint:?}")]
    InvalidEndpoint {
        /// The rejected endpoint text.
        endpoint: String,
    },

    /// An outbound argument could not be serialized.
    #[error("argument serialization failed")]
    Serialize(#[from] serde_json::Error),

    /// The live connection rejected an outbound call.
    #[error("outbound call failed")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::InvalidEndpoint { .. } => "client_invalid_endpoint",
            ClientError::Serialize(_) => "client_serialize",
            ClientError::Transport(_) => "client_transport",
        }
    }
}

/// # Errors produced by strict bridge registration.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// A handler is already registered under this call-name.
    #[error("call-name {name:?} is already registered")]
    DuplicateMethod {
        /// The conflicting call-name.
        name: String,
    },
}

impl BridgeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::DuplicateMethod { .. } => "bridge_duplicate_method",
        }
    }
}
