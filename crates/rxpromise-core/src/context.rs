use std::time::Duration;

/// An opaque scheduler capable of running a thunk asynchronously, exactly
/// once, eventually.
///
/// A dispatch queue, a thread, an operation queue, whatever — the
/// dispatcher only needs "schedule this thunk for execution." Handlers
/// are always scheduled through a context, even when the promise being
/// observed is already settled — a handler must never run inline on the
/// registering thread's stack.
pub trait ExecutionContext: Send + Sync {
    fn schedule(&self, thunk: Box<dyn FnOnce() + Send + 'static>);
}

/// An abstract timer capable of running a thunk after a delay.
///
/// Kept separate from [`ExecutionContext`] because arming a timeout is a
/// distinct capability from running a handler reaction — only the
/// timer's *interface* is defined here; a concrete implementation lives
/// in the `rxpromise` facade crate.
pub trait Timer: Send + Sync {
    fn schedule_after(&self, delay: Duration, thunk: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs a thunk synchronously on whichever thread calls `schedule`.
///
/// Reserved for the library's own internal plumbing (binding adoption,
/// resolve-with-a-promise chaining) where the thunk is not user code and
/// running it inline on an already-serialized per-cell mutation path is
/// safe. User-registered `then`/`then_on` handlers must never use this —
/// they always go through a caller-supplied [`ExecutionContext`].
pub(crate) struct Immediate;

impl ExecutionContext for Immediate {
    fn schedule(&self, thunk: Box<dyn FnOnce() + Send + 'static>) {
        thunk();
    }
}
