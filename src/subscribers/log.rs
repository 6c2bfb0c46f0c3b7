//! # LogWriter: envelopes rendered through `tracing`
//!
//! A minimal consumer that forwards every envelope to the active `tracing`
//! subscriber. Level follows severity; diagnostics land at `debug`.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! DEBUG hublink: HubClient started. source="HubClient" seq=1
//! ERROR hublink: Connection attempts: 1 => connect to mem://hub failed: refused source="HubClient" seq=2
//!  INFO hublink: Connected source="HubClient" seq=3
//! ```

use std::sync::Arc;

use tracing::Level;

use crate::client::ClientMessage;
use crate::events::{Envelope, Severity};
use crate::runner::EventSink;

/// Envelope writer.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, e: &Envelope) {
        let source = e.name().unwrap_or("-");
        let seq = e.seq();
        let level = level_for(e.severity());
        if level == Level::ERROR {
            tracing::error!(source, seq, "{}", e.message());
        } else if level == Level::WARN {
            tracing::warn!(source, seq, "{}", e.message());
        } else if level == Level::INFO {
            tracing::info!(source, seq, "{}", e.message());
        } else {
            tracing::debug!(source, seq, "{}", e.message());
        }
    }

    /// Runner sink writing every envelope.
    pub fn sink(self) -> EventSink {
        Arc::new(move |e| self.write(&e))
    }

    /// Hub client listener writing the wrapped envelope.
    pub fn listener(self) -> impl Fn(ClientMessage) + Send + Sync + 'static {
        move |m| self.write(&m.envelope)
    }
}

fn level_for(severity: Severity) -> Level {
    match severity {
        Severity::Error | Severity::Fatal => Level::ERROR,
        Severity::Warning | Severity::Missing => Level::WARN,
        Severity::Info | Severity::Ok => Level::INFO,
        Severity::Diagnostic => Level::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_level() {
        assert_eq!(level_for(Severity::Fatal), Level::ERROR);
        assert_eq!(level_for(Severity::Missing), Level::WARN);
        assert_eq!(level_for(Severity::Ok), Level::INFO);
        assert_eq!(level_for(Severity::Diagnostic), Level::DEBUG);
    }

    #[test]
    fn sink_accepts_envelopes_without_subscriber() {
        let sink = LogWriter::new().sink();
        sink(Envelope::error("boom").with_name("worker"));
        sink(Envelope::default());
    }
}
