//! Envelopes and the typed event bus.
//!
//! This module groups the message **data model** and the **bus** used to
//! publish/subscribe to it.
//!
//! ## Contents
//! - [`Severity`], [`Envelope`], [`EventMessage`] message classification and payload
//! - [`EventBus`] typed publish/subscribe registry
//!
//! ## Quick reference
//! - **Producers**: `Runner` (lifecycle diagnostics, iteration failures),
//!   `HubClient` (connection state, incoming data).
//! - **Consumers**: whatever the caller wires: a sink closure, a
//!   [`LogWriter`](crate::LogWriter), or [`EventBus::publisher`].

mod bus;
mod envelope;

pub use bus::{Delivery, EventBus, SubscriptionId};
pub use envelope::{Envelope, EventMessage, Severity};
