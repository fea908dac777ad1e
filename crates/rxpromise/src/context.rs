use std::sync::{Arc, OnceLock};

use rxpromise_core::{ExecutionContext, Timer};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedSender};

type Thunk = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide multi-worker runtime backing [`Concurrent`] and the
/// default [`Timer`] — lazily initialized on first use so constructing
/// a `Promise` never requires the caller to stand up a runtime first.
fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tracing::debug!("starting rxpromise's default multi-thread runtime");
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("rxpromise-worker")
            .build()
            .expect("failed to start rxpromise's default tokio runtime")
    })
}

/// The library's default execution context: handlers run on tokio's
/// blocking-task pool, with no ordering guarantee between siblings
/// registered via the default context.
#[derive(Clone, Copy, Debug, Default)]
pub struct Concurrent;

impl ExecutionContext for Concurrent {
    fn schedule(&self, thunk: Thunk) {
        runtime().spawn_blocking(thunk);
    }
}

/// A strictly FIFO, single-worker execution context. Every thunk
/// scheduled on the same `Serial` instance runs to completion, in
/// registration order, before the next begins — `thenOn`/`catchOn`
/// callers reach for this when they need ordering the default
/// [`Concurrent`] context does not promise.
pub struct Serial {
    tx: UnboundedSender<Thunk>,
}

impl Serial {
    pub fn new() -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Thunk>();
        std::thread::Builder::new()
            .name("rxpromise-serial".to_string())
            .spawn(move || {
                tracing::trace!("rxpromise serial worker started");
                while let Some(thunk) = rx.blocking_recv() {
                    thunk();
                }
                tracing::trace!("rxpromise serial worker exiting, sender dropped");
            })
            .expect("failed to spawn rxpromise serial worker thread");
        Arc::new(Self { tx })
    }
}

impl ExecutionContext for Serial {
    fn schedule(&self, thunk: Thunk) {
        // The receiver only ever disconnects if the worker thread
        // panicked; a dropped thunk at that point is a dead worker, not
        // a correctness bug this call site can repair.
        let _ = self.tx.send(thunk);
    }
}

/// The process-wide default [`ExecutionContext`] (`Concurrent`).
pub fn default_context() -> Arc<dyn ExecutionContext> {
    static DEFAULT: OnceLock<Arc<dyn ExecutionContext>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(Concurrent)).clone()
}

/// tokio-backed [`Timer`]: arms a `tokio::time::sleep` on the shared
/// runtime and invokes the thunk when it elapses.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn schedule_after(&self, delay: std::time::Duration, thunk: Thunk) {
        runtime().spawn(async move {
            tokio::time::sleep(delay).await;
            thunk();
        });
    }
}

/// The process-wide default [`Timer`].
pub fn default_timer() -> Arc<dyn Timer> {
    static DEFAULT: OnceLock<Arc<dyn Timer>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(TokioTimer)).clone()
}
