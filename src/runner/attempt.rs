//! # Run a single iteration with failure containment.
//!
//! Executes one [`Runnable::run`] call and folds panics into [`RunError::Panicked`],
//! so the caller sees a single `Result` whatever the iteration did.
//!
//! ## Rules
//! - A returned `Err` is passed through unchanged.
//! - A panic is caught with `catch_unwind` and converted to `Panicked`.
//! - The iteration is never interrupted; cancellation stays cooperative.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if the work uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::error::Error as _;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::RunError;
use crate::runner::runnable::{RunContext, Runnable};

/// Executes one iteration of `work`, converting a panic into an error.
pub(crate) async fn run_once(work: &dyn Runnable, ctx: &RunContext) -> Result<(), RunError> {
    match AssertUnwindSafe(work.run(ctx)).catch_unwind().await {
        Ok(res) => res,
        Err(panic_err) => Err(RunError::Panicked {
            info: panic_message(panic_err.as_ref()),
        }),
    }
}

/// Renders an iteration failure as `"<message> <cause>"`.
///
/// The cause is the error's direct source, if any.
pub(crate) fn describe(err: &RunError) -> String {
    match err.source() {
        Some(cause) => format!("{err} {cause}"),
        None => err.to_string(),
    }
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
