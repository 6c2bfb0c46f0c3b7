//! # Built-in envelope consumers
//!
//! Small, self-contained consumers for demos and debugging.
//!
//! - [`LogWriter`]: renders envelopes through `tracing` (feature `logging`).

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
