//! Supervised background loop.
//!
//! Internal modules:
//! - [`core`]: the [`Runner`] handle and its cancellable loop;
//! - [`attempt`]: one iteration with panic containment;
//! - [`runnable`]: the [`Runnable`] work trait and its [`RunContext`];
//! - [`pace`]: the shared inter-iteration delay.

mod attempt;
mod core;
mod pace;
mod runnable;

pub use self::core::{EventSink, Runner};
pub use pace::Pace;
pub use runnable::{RunContext, Runnable};
