use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use rxpromise_types::{ErrorKind, PromiseError, PromiseId, PromiseState, Value};

use crate::context::{ExecutionContext, Immediate, Timer};
use crate::dispatch::HandlerEntry;
use crate::error::BindError;

/// The mutable, single-lock state a promise owns.
///
/// Every field that must mutate atomically — `state`, `result`,
/// `handler_queue`, `children`, `bound_to` — lives behind one `Mutex`,
/// which is the per-cell realization of a serial sync context: all of a
/// given promise's own mutations are serialized on its own lock, never
/// on a process-wide queue.
pub(crate) struct Inner {
    pub(crate) state: PromiseState,
    pub(crate) value: Option<Value>,
    pub(crate) error: Option<PromiseError>,
    pub(crate) handlers: Vec<HandlerEntry>,
    pub(crate) children: Vec<Weak<Cell>>,
    pub(crate) bound_to: Option<Weak<Cell>>,
    pub(crate) parent: Option<Weak<Cell>>,
    pub(crate) handlers_total: u64,
    pub(crate) handlers_done: u64,
}

pub(crate) struct Cell {
    pub(crate) id: PromiseId,
    pub(crate) inner: Mutex<Inner>,
    pub(crate) condvar: Condvar,
    next_child_seq: AtomicU32,
}

/// A handle to a promise: the public state machine the rest of this crate
/// and the `rxpromise` facade build on.
///
/// Cloning is cheap (an `Arc` bump) and every clone observes the same
/// underlying cell — there is exactly one state machine per promise,
/// shared by every handle to it.
#[derive(Clone)]
pub struct Promise {
    pub(crate) cell: Arc<Cell>,
}

pub(crate) fn settled_snapshot(inner: &Inner) -> Option<Result<Value, PromiseError>> {
    match inner.state {
        PromiseState::Pending => None,
        PromiseState::Fulfilled => Some(Ok(inner.value.clone().expect("fulfilled without value"))),
        PromiseState::Rejected | PromiseState::Cancelled => {
            Some(Err(inner.error.clone().expect("rejected without error")))
        }
    }
}

impl Promise {
    /// A fresh, unparented, Pending promise.
    pub fn new_pending() -> Self {
        Self::new_with_parent(PromiseId::new_root(), None)
    }

    pub(crate) fn new_with_parent(id: PromiseId, parent: Option<&Arc<Cell>>) -> Self {
        let cell = Arc::new(Cell {
            id,
            inner: Mutex::new(Inner {
                state: PromiseState::Pending,
                value: None,
                error: None,
                handlers: Vec::new(),
                children: Vec::new(),
                bound_to: None,
                parent: parent.map(Arc::downgrade),
                handlers_total: 0,
                handlers_done: 0,
            }),
            condvar: Condvar::new(),
            next_child_seq: AtomicU32::new(0),
        });
        Promise { cell }
    }

    /// Allocate an id for the next child of `self` and build its (still
    /// unlinked) Pending cell. The caller is responsible for registering
    /// it in `children` if it should participate in cancellation
    /// propagation (see [`crate::dispatch`]).
    pub(crate) fn new_child_cell(&self) -> Arc<Cell> {
        let seq = self.cell.next_child_seq.fetch_add(1, Ordering::Relaxed);
        // Past MAX_CHAIN_DEPTH, `child()` refuses to extend the path
        // further. The diagnostic id then just stops growing and is
        // reused as-is for every descendant beyond the cap — it no
        // longer uniquely identifies position in the tree, but it still
        // carries the correct root, which `PromiseId::new_root()` would
        // not: that would mint an unrelated tree identity for a node
        // that is very much still a descendant of `self`.
        let id = self.cell.id.child(seq).unwrap_or_else(|_| {
            tracing::warn!(
                promise = %self.cell.id,
                "promise chain exceeded MAX_CHAIN_DEPTH; child id will alias its ancestor"
            );
            self.cell.id.clone()
        });
        Promise::new_with_parent(id, Some(&self.cell)).cell
    }

    pub fn id(&self) -> PromiseId {
        self.cell.id.clone()
    }

    pub fn state(&self) -> PromiseState {
        self.cell.inner.lock().unwrap().state
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state().is_fulfilled()
    }

    pub fn is_rejected(&self) -> bool {
        self.state().is_rejected()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    /// The promise that created this one via `then`/`then_on`, if any.
    /// `None` for root promises and for binding peers (binding is not a
    /// parent/child relationship).
    pub fn parent(&self) -> Option<Promise> {
        let inner = self.cell.inner.lock().unwrap();
        inner.parent.as_ref().and_then(Weak::upgrade).map(|cell| Promise { cell })
    }

    /// Walk `parent` links until one is absent.
    pub fn root(&self) -> Promise {
        let mut current = self.clone();
        while let Some(p) = current.parent() {
            current = p;
        }
        current
    }

    // ---- Promise Cell operations ----

    /// `fulfill(value)`: stores `value` as the result unless `value` is
    /// itself a [`Promise`], in which case the receiver binds to it
    /// instead.
    pub fn fulfill(&self, value: Value) {
        if let Some(inner_promise) = value.downcast_ref::<Promise>().cloned() {
            // Receiver adopts the inner promise's eventual state rather
            // than storing the promise object itself.
            let _ = self.bind_on(Arc::new(Immediate), &inner_promise);
            return;
        }
        self.transition(PromiseState::Fulfilled, Some(value), None);
    }

    /// `reject(reason)`: wraps `reason` in a synthetic `RXPromiseDomain`
    /// error unless it is already error-shaped.
    pub fn reject(&self, reason: Value) {
        let err = match reason.downcast_ref::<PromiseError>() {
            Some(e) => e.clone(),
            None => PromiseError::wrap_reason(reason),
        };
        self.reject_error(err);
    }

    pub(crate) fn reject_error(&self, err: PromiseError) {
        self.transition(PromiseState::Rejected, None, Some(err));
    }

    /// `resolve(result)`: a `Promise` binds, an error-typed value rejects,
    /// anything else fulfills.
    pub fn resolve(&self, result: Value) {
        if let Some(err) = result.downcast_ref::<PromiseError>() {
            self.reject_error(err.clone());
        } else if let Some(inner_promise) = result.downcast_ref::<Promise>().cloned() {
            let _ = self.bind_on(Arc::new(Immediate), &inner_promise);
        } else {
            self.transition(PromiseState::Fulfilled, Some(result), None);
        }
    }

    /// `cancel()`: cancel with the library's default reason.
    pub fn cancel(&self) {
        self.cancel_with_reason(Value::new("cancelled"));
    }

    /// `cancel(reason)`: transitions `self` to Cancelled if Pending, then
    /// unconditionally propagates cancellation down the child graph and
    /// across the binding link — cancelling an already resolved promise
    /// still cascades to its descendants.
    pub fn cancel_with_reason(&self, reason: Value) {
        let err = PromiseError::cancelled(reason.clone());
        self.transition(PromiseState::Cancelled, None, Some(err));
        self.propagate_cancel(reason);
    }

    /// Blocks until resolved; returns the value or error.
    pub fn get(&self) -> Result<Value, PromiseError> {
        let mut inner = self.cell.inner.lock().unwrap();
        while inner.state.is_pending() {
            inner = self.cell.condvar.wait(inner).unwrap();
        }
        settled_snapshot(&inner).expect("settled state without a snapshot")
    }

    /// Like `get`, but returns a timeout error after `timeout` without
    /// mutating state if the promise has not resolved by then.
    pub fn get_with_timeout(&self, timeout: Duration) -> Result<Value, PromiseError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.cell.inner.lock().unwrap();
        loop {
            if let Some(result) = settled_snapshot(&inner) {
                return result;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PromiseError::timeout());
            }
            let (next, _) = self.cell.condvar.wait_timeout(inner, deadline - now).unwrap();
            inner = next;
        }
    }

    /// Blocks until resolved *and* every handler registered before this
    /// call has finished dispatching.
    pub fn wait(&self) {
        let mut inner = self.cell.inner.lock().unwrap();
        let target = inner.handlers_total;
        while inner.state.is_pending() || inner.handlers_done < target {
            inner = self.cell.condvar.wait(inner).unwrap();
        }
    }

    /// Arms `timer` to reject `self` with a timeout error after `delay`
    /// unless it resolves first. Returns `self`.
    pub fn arm_timeout(&self, timer: Arc<dyn Timer>, delay: Duration) -> Promise {
        let target = self.clone();
        timer.schedule_after(
            delay,
            Box::new(move || {
                target.reject_error(PromiseError::timeout());
            }),
        );
        self.clone()
    }

    // ---- internals ----

    /// First-writer-wins transition out of Pending; drains and dispatches
    /// handlers exactly once, only on the transition that actually fired.
    pub(crate) fn transition(
        &self,
        new_state: PromiseState,
        value: Option<Value>,
        error: Option<PromiseError>,
    ) -> bool {
        let settled_result = {
            let mut inner = self.cell.inner.lock().unwrap();
            if !inner.state.is_pending() {
                return false;
            }
            inner.state = new_state;
            inner.value = value.clone();
            inner.error = error.clone();
            settled_snapshot(&inner).expect("just transitioned to a settled state")
        };
        tracing::trace!(promise = %self.cell.id, state = %new_state, "promise settled");
        self.cell.condvar.notify_all();
        self.drain_and_dispatch(settled_result);
        true
    }

    fn drain_and_dispatch(&self, settled: Result<Value, PromiseError>) {
        let handlers = {
            let mut inner = self.cell.inner.lock().unwrap();
            std::mem::take(&mut inner.handlers)
        };
        for entry in handlers {
            crate::dispatch::dispatch_entry(Arc::clone(&self.cell), entry, settled.clone());
        }
    }

    /// Registers `on_settle` to run (via `ctx`) once `self` resolves —
    /// immediately if already settled, queued otherwise. Shared by
    /// `then_on` (child creation) and `bind_on` (state adoption); neither
    /// of those registrations counts as a "child" in the cancellation
    /// graph by itself — callers add to `children` separately when a
    /// real child promise is being created.
    pub(crate) fn register_handler(
        &self,
        ctx: Arc<dyn ExecutionContext>,
        on_settle: Box<dyn FnOnce(Result<Value, PromiseError>) + Send>,
    ) {
        let entry = HandlerEntry {
            ctx,
            on_settle: Some(on_settle),
        };
        let ready = {
            let mut inner = self.cell.inner.lock().unwrap();
            inner.handlers_total += 1;
            match settled_snapshot(&inner) {
                None => {
                    inner.handlers.push(entry);
                    None
                }
                Some(result) => Some((entry, result)),
            }
        };
        if let Some((entry, result)) = ready {
            crate::dispatch::dispatch_entry(Arc::clone(&self.cell), entry, result);
        }
    }

    pub(crate) fn add_child(&self, child: &Arc<Cell>) {
        let mut inner = self.cell.inner.lock().unwrap();
        inner.children.push(Arc::downgrade(child));
    }

    fn links_snapshot(&self) -> (Vec<Weak<Cell>>, Option<Weak<Cell>>) {
        let inner = self.cell.inner.lock().unwrap();
        (inner.children.clone(), inner.bound_to.clone())
    }

    /// Cascades `reason` to every live child and the binding peer (if
    /// any), breadth-first, on a background thread so the original
    /// `cancel` call returns immediately — there is no join point.
    ///
    /// Runs iteratively rather than recursing so a long chain/wide tree
    /// doesn't grow the call stack, and tracks visited cells so a
    /// binding cycle can't loop forever.
    fn propagate_cancel(&self, reason: Value) {
        let (children, bound) = self.links_snapshot();
        if children.is_empty() && bound.is_none() {
            return;
        }
        tracing::trace!(promise = %self.cell.id, children = children.len(), bound = bound.is_some(), "propagating cancel");
        std::thread::spawn(move || {
            let mut queue: VecDeque<(Weak<Cell>, Value)> = VecDeque::new();
            let mut visited: Vec<*const Cell> = Vec::new();
            for w in children {
                queue.push_back((w, reason.clone()));
            }
            if let Some(w) = bound {
                queue.push_back((w, reason));
            }
            while let Some((weak, reason)) = queue.pop_front() {
                let Some(cell) = weak.upgrade() else { continue };
                let ptr = Arc::as_ptr(&cell);
                if visited.contains(&ptr) {
                    continue;
                }
                visited.push(ptr);
                let promise = Promise { cell: Arc::clone(&cell) };
                let err = PromiseError::cancelled(reason.clone());
                promise.transition(PromiseState::Cancelled, None, Some(err));
                let (children, bound) = promise.links_snapshot();
                for w in children {
                    queue.push_back((w, reason.clone()));
                }
                if let Some(w) = bound {
                    queue.push_back((w, reason.clone()));
                }
            }
        });
    }

    /// `bind(other)` realized with an explicit execution context for the
    /// adoption observer — `rxpromise::Promise::bind` supplies the
    /// library default.
    pub fn bind_on(&self, ctx: Arc<dyn ExecutionContext>, other: &Promise) -> Result<(), BindError> {
        {
            let mut inner = self.cell.inner.lock().unwrap();
            if inner.bound_to.is_some() {
                return Err(BindError::AlreadyBound);
            }
            inner.bound_to = Some(Arc::downgrade(&other.cell));
        }
        let target = self.clone();
        other.register_handler(
            ctx,
            Box::new(move |settled| match settled {
                Ok(v) => target.fulfill(v),
                Err(e) => {
                    if let ErrorKind::Cancelled(reason) = e.kind.clone() {
                        target.cancel_with_reason(reason);
                    } else {
                        target.reject_error(e);
                    }
                }
            }),
        );
        Ok(())
    }

    /// `then_on(ctx, on_success, on_failure)`: registers the triple and
    /// returns the new child promise.
    pub fn then_on(
        &self,
        ctx: Arc<dyn ExecutionContext>,
        on_success: Option<Box<dyn FnOnce(Value) -> Value + Send>>,
        on_failure: Option<Box<dyn FnOnce(PromiseError) -> Value + Send>>,
    ) -> Promise {
        let child_cell = self.new_child_cell();
        self.add_child(&child_cell);
        let child = Promise { cell: child_cell };
        let on_settle = crate::dispatch::make_then_observer(child.clone(), on_success, on_failure);
        self.register_handler(ctx, on_settle);
        child
    }
}

