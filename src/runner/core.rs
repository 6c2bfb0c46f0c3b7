//! # Runner: cancellable supervised loop.
//!
//! Repeats one [`Runnable`] with a [`Pace`] delay between iterations until
//! stopped, containing every per-iteration failure.
//!
//! ## Lifecycle
//! ```text
//! start() ──► [lock] new token [unlock] ──► emit "<name> started.", spawn loop
//!
//! loop (while token alive) {
//!   ├─► run_once(work)        ── Err/panic ──► emit Error "<name> exception: …"
//!   └─► select! {
//!         sleep(pace)      → next iteration
//!         token.cancelled  → exit immediately (mid-sleep)
//!       }
//! }
//! exit ──► [lock] release own token [unlock] ──► emit "<name> stopped."
//!
//! stop() ──► [lock] cancel token [unlock] ──► emit "<name> stopped."   (never waits)
//! ```
//!
//! ## Rules
//! - `is_running() == token present && !cancelled`; it flips to `false` as soon as `stop()` returns.
//! - `start()` and `stop()` are idempotent; at most one live loop per runner.
//! - `start()`, `stop()` and loop exit serialize on one per-instance mutex.
//! - A loop that exits after a newer `start()` leaves the newer token in place.
//! - Envelopes are emitted after the mutex is released, so a sink may query
//!   or drive the same runner.
//! - Dropping the runner cancels a live loop.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::events::Envelope;
use crate::runner::attempt::{describe, run_once};
use crate::runner::pace::Pace;
use crate::runner::runnable::{RunContext, Runnable};

/// Diagnostic sink: receives every envelope a runner emits.
pub type EventSink = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Handle slot guarded by the instance mutex.
#[derive(Default)]
struct Lifecycle {
    token: Option<CancellationToken>,
    /// Bumped on every start; lets a loop recognise its own token on exit.
    generation: u64,
}

impl Lifecycle {
    fn is_running(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

struct Shared {
    name: Arc<str>,
    pace: Pace,
    work: Arc<dyn Runnable>,
    lifecycle: Mutex<Lifecycle>,
    sink: RwLock<Option<EventSink>>,
}

impl Shared {
    fn emit(&self, envelope: Envelope) {
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink(envelope.with_name(Arc::clone(&self.name)));
        }
    }

    fn stopped(&self) -> Envelope {
        Envelope::diagnostic(format!("{} stopped.", self.name))
    }

    /// Loop exit path: release the handle (if still ours) and report.
    fn exit(&self, generation: u64) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.generation == generation {
                lifecycle.token = None;
            }
        }
        self.emit(self.stopped());
    }
}

/// Cancellable supervised loop around a [`Runnable`].
///
/// ### Responsibilities
/// - **Lifecycle**: idempotent `start`/`stop`, one live loop at a time
/// - **Containment**: iteration errors and panics become `Error` envelopes
/// - **Pacing**: sleeps for the shared [`Pace`] between iterations, cancellable mid-sleep
/// - **Diagnostics**: `Diagnostic` envelopes on start/stop through the optional sink
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use hublink::{RunContext, RunError, Runnable, Runner};
///
/// struct Tick;
///
/// #[async_trait]
/// impl Runnable for Tick {
///     async fn run(&self, _ctx: &RunContext) -> Result<(), RunError> { Ok(()) }
/// }
///
/// # #[tokio::main] async fn main() {
/// let runner = Runner::new(Arc::new(Tick), 100);
/// runner.set_sink(Arc::new(|ev| println!("{ev}")));
/// runner.start();
/// // ...
/// runner.stop();
/// # }
/// ```
pub struct Runner {
    shared: Arc<Shared>,
}

impl Runner {
    /// Creates a stopped runner with a delay of `delay_ms` (negative clamps to 0).
    ///
    /// The runner name is taken from [`Runnable::name`].
    pub fn new(work: Arc<dyn Runnable>, delay_ms: i64) -> Self {
        Self::with_pace(work, Pace::from_millis(delay_ms))
    }

    /// Creates a stopped runner sharing an existing [`Pace`].
    pub fn with_pace(work: Arc<dyn Runnable>, pace: Pace) -> Self {
        let name: Arc<str> = Arc::from(work.name());
        Self {
            shared: Arc::new(Shared {
                name,
                pace,
                work,
                lifecycle: Mutex::new(Lifecycle::default()),
                sink: RwLock::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn pace(&self) -> &Pace {
        &self.shared.pace
    }

    /// Replaces the diagnostic sink.
    pub fn set_sink(&self, sink: EventSink) {
        *self.shared.sink.write() = Some(sink);
    }

    /// Removes the diagnostic sink; later envelopes are dropped.
    pub fn clear_sink(&self) {
        *self.shared.sink.write() = None;
    }

    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.lock().is_running()
    }

    /// Starts the loop on the ambient tokio runtime. No-op if already running.
    ///
    /// Returns once the loop task is spawned.
    pub fn start(&self) {
        let (token, generation) = {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.is_running() {
                return;
            }
            let token = CancellationToken::new();
            lifecycle.generation += 1;
            lifecycle.token = Some(token.clone());
            (token, lifecycle.generation)
        };

        self.shared
            .emit(Envelope::diagnostic(format!("{} started.", self.shared.name)));
        tokio::spawn(run_loop(Arc::clone(&self.shared), token, generation));
    }

    /// Signals the loop to stop. No-op if not running; never waits for the loop.
    pub fn stop(&self) {
        {
            let lifecycle = self.shared.lifecycle.lock();
            let Some(token) = lifecycle.token.as_ref().filter(|t| !t.is_cancelled()) else {
                return;
            };
            token.cancel();
        }
        self.shared.emit(self.shared.stopped());
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if let Some(token) = self.shared.lifecycle.lock().token.take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.shared.name)
            .field("pace", &self.shared.pace.get())
            .field("running", &self.is_running())
            .finish()
    }
}

/// The supervised loop. Runs until `token` is cancelled.
async fn run_loop(shared: Arc<Shared>, token: CancellationToken, generation: u64) {
    let ctx = RunContext::new(Arc::clone(&shared.name), shared.pace.clone(), token.clone());

    while !token.is_cancelled() {
        if let Err(err) = run_once(shared.work.as_ref(), &ctx).await {
            tracing::debug!(runner = %shared.name, label = err.as_label(), "iteration failed");
            shared.emit(Envelope::error(format!(
                "{} exception: {}",
                shared.name,
                describe(&err)
            )));
        }

        let delay = shared.pace.get();
        if delay.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => {}
            _ = token.cancelled() => { break; }
        }
    }

    shared.exit(generation);
}
