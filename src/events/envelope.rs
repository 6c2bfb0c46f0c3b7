//! # Timestamped envelopes emitted by runners and hub clients.
//!
//! The [`Severity`] enum classifies envelopes:
//! - **Lifecycle**: `Diagnostic` (`"<name> started."`, `"<name> stopped."`)
//! - **Connection**: `Info` (`"Connected"`, `"Disconnected"`, `"Incoming data: …"`)
//! - **Failures**: `Error` (iteration exceptions, connection attempts)
//!
//! The [`Envelope`] struct carries the timestamp, an optional sender name and
//! the message text.
//!
//! ## Ordering guarantees
//! Each envelope has a process-wide unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when envelopes are delivered out of order.
//!
//! ## Example
//! ```rust
//! use hublink::{Envelope, Severity};
//!
//! let ev = Envelope::new(Severity::Diagnostic, "poller started.").with_name("poller");
//!
//! assert_eq!(ev.severity(), Severity::Diagnostic);
//! assert_eq!(ev.name(), Some("poller"));
//! assert_eq!(ev.message(), "poller started.");
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for envelope ordering.
static ENVELOPE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Severity of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    /// Informational (connection state, incoming data).
    #[default]
    Info,
    /// Operation completed.
    Ok,
    /// Runner lifecycle diagnostics.
    Diagnostic,
    /// Contained failure; the emitter keeps running.
    Error,
    /// Failure the emitter could not recover from.
    Fatal,
    /// Something expected was absent.
    Missing,
    /// Degraded but working.
    Warning,
}

impl Severity {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Ok => "ok",
            Severity::Diagnostic => "diagnostic",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Missing => "missing",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Message type accepted by the [`EventBus`](crate::EventBus).
///
/// Every message carries the time it was produced.
pub trait EventMessage: Send + Sync + 'static {
    /// When the message was produced.
    fn timestamp(&self) -> SystemTime;
}

/// Immutable timestamped message.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp, never changed after construction
/// - `name` and `severity` are the only mutable fields
///
/// Cloning keeps the original `at` and `seq`, so a relayed envelope still
/// reports when its first sender produced it.
#[derive(Clone, Debug)]
pub struct Envelope {
    seq: u64,
    at: SystemTime,
    name: Option<Arc<str>>,
    message: Arc<str>,
    severity: Severity,
}

impl Envelope {
    /// Creates a new envelope with current timestamp and next sequence number.
    pub fn new(severity: Severity, message: impl Into<Arc<str>>) -> Self {
        Self {
            seq: ENVELOPE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            name: None,
            message: message.into(),
            severity,
        }
    }

    /// `Info` envelope.
    #[inline]
    pub fn info(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// `Diagnostic` envelope.
    #[inline]
    pub fn diagnostic(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Diagnostic, message)
    }

    /// `Error` envelope.
    #[inline]
    pub fn error(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Attaches a sender name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Global sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Construction timestamp.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn set_name(&mut self, name: Option<Arc<str>>) {
        self.name = name;
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Fatal)
    }
}

impl Default for Envelope {
    /// Empty `Info` envelope stamped now.
    fn default() -> Self {
        Self::new(Severity::Info, "")
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "[{}] {}: {}", self.severity, name, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

impl EventMessage for Envelope {
    fn timestamp(&self) -> SystemTime {
        self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty_info() {
        let ev = Envelope::default();
        assert_eq!(ev.severity(), Severity::Info);
        assert_eq!(ev.message(), "");
        assert!(ev.name().is_none());
    }

    #[test]
    fn clone_preserves_timestamp_and_seq() {
        let original = Envelope::error("boom");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let mut relayed = original.clone();
        relayed.set_severity(Severity::Warning);
        relayed.set_name(Some("relay".into()));

        assert_eq!(relayed.at(), original.at());
        assert_eq!(relayed.seq(), original.seq());
        assert_eq!(relayed.message(), "boom");
        assert_eq!(original.severity(), Severity::Error);
    }

    #[test]
    fn seq_is_monotonic() {
        let a = Envelope::info("a");
        let b = Envelope::info("b");
        assert!(b.seq() > a.seq());
    }

    #[test]
    fn display_includes_name_when_set() {
        let ev = Envelope::diagnostic("started.").with_name("poller");
        assert_eq!(ev.to_string(), "[diagnostic] poller: started.");
        assert_eq!(Envelope::info("x").to_string(), "[info] x");
    }
}
