//! # Unit of work repeated by a [`Runner`](crate::Runner).
//!
//! A [`Runnable`] supplies one iteration of work. The runner calls
//! [`Runnable::run`] in a loop, sleeping for the current [`Pace`] between
//! iterations, until it is stopped.
//!
//! The work receives a [`RunContext`] exposing the runner's name, its pace (so
//! the work can change the poll interval for the following iterations) and
//! the cancellation token of the current run.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::runner::pace::Pace;

/// # One iteration of supervised work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use hublink::{RunContext, RunError, Runnable};
///
/// struct Poller;
///
/// #[async_trait]
/// impl Runnable for Poller {
///     fn name(&self) -> &str { "poller" }
///
///     async fn run(&self, ctx: &RunContext) -> Result<(), RunError> {
///         if ctx.is_cancelled() {
///             return Ok(());
///         }
///         // poll something...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Stable, human-readable name used in diagnostics.
    ///
    /// The default is the unqualified type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Runs one iteration.
    ///
    /// Errors and panics are contained by the runner and reported as `Error`
    /// envelopes; they never end the loop. Cancellation is cooperative: the
    /// runner never interrupts a running iteration.
    async fn run(&self, ctx: &RunContext) -> Result<(), RunError>;
}

/// Per-run view handed to [`Runnable::run`].
#[derive(Clone, Debug)]
pub struct RunContext {
    name: std::sync::Arc<str>,
    pace: Pace,
    token: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(name: std::sync::Arc<str>, pace: Pace, token: CancellationToken) -> Self {
        Self { name, pace, token }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delay applied after the current iteration.
    pub fn pace(&self) -> &Pace {
        &self.pace
    }

    /// Token cancelled when the runner is stopped.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
