use std::sync::Arc;
use std::time::Duration;

use rxpromise_core::{BindError, ExecutionContext, Timer};
pub use rxpromise_core::{PromiseId, PromiseState};
pub use rxpromise_types::{ErrorKind, PromiseError, Value};

use crate::context::{default_context, default_timer};

/// A handle to the eventual result of an asynchronous computation.
///
/// This is the public facade over [`rxpromise_core::Promise`]: the same
/// state machine, handler dispatcher, and cancellation graph, with
/// Rust-idiomatic naming and default-context sugar (`then`, `catch_on`,
/// `bind`, `set_timeout`) layered on top of the context-explicit core
/// operations (`then_on`, `bind_on`, `arm_timeout`).
#[derive(Clone)]
pub struct Promise {
    pub(crate) core: rxpromise_core::Promise,
}

impl Promise {
    /// A fresh, unparented, Pending promise — the `resolver` side of the
    /// `Promise`/resolver split calls one of `fulfill`/`reject`/`cancel`
    /// on it exactly once.
    pub fn new_pending() -> Self {
        Self {
            core: rxpromise_core::Promise::new_pending(),
        }
    }

    pub(crate) fn from_core(core: rxpromise_core::Promise) -> Self {
        Self { core }
    }

    pub fn id(&self) -> PromiseId {
        self.core.id()
    }

    pub fn state(&self) -> PromiseState {
        self.core.state()
    }

    pub fn is_pending(&self) -> bool {
        self.core.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.core.is_fulfilled()
    }

    pub fn is_rejected(&self) -> bool {
        self.core.is_rejected()
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    pub fn parent(&self) -> Option<Promise> {
        self.core.parent().map(Promise::from_core)
    }

    pub fn root(&self) -> Promise {
        Promise::from_core(self.core.root())
    }

    // ---- resolver-side operations ----

    /// `fulfill(value)`. `value` is unwrapped one layer first: the core
    /// cell's own "fulfilling with a promise binds instead" rule only
    /// recognizes `rxpromise_core::Promise`, so a `Value` carrying the
    /// public-facing [`Promise`] handle is rewritten to carry its inner
    /// core handle before reaching the cell — see [`unwrap_facade_promise`].
    pub fn fulfill(&self, value: Value) {
        self.core.fulfill(unwrap_facade_promise(value));
    }

    pub fn reject(&self, reason: Value) {
        self.core.reject(reason);
    }

    pub fn resolve(&self, result: Value) {
        self.core.resolve(unwrap_facade_promise(result));
    }

    pub fn cancel(&self) {
        self.core.cancel();
    }

    pub fn cancel_with_reason(&self, reason: Value) {
        self.core.cancel_with_reason(reason);
    }

    // ---- blocking, debug-only operations ----

    pub fn get(&self) -> Result<Value, PromiseError> {
        self.core.get()
    }

    pub fn get_with_timeout(&self, timeout: Duration) -> Result<Value, PromiseError> {
        self.core.get_with_timeout(timeout)
    }

    pub fn wait(&self) {
        self.core.wait();
    }

    // ---- composition ----

    /// Registers `on_success`/`on_failure` on the library's default
    /// execution context ([`Concurrent`](crate::Concurrent)) and
    /// returns the new child promise.
    pub fn then(
        &self,
        on_success: Option<Box<dyn FnOnce(Value) -> Value + Send>>,
        on_failure: Option<Box<dyn FnOnce(PromiseError) -> Value + Send>>,
    ) -> Promise {
        self.then_on(default_context(), on_success, on_failure)
    }

    /// `then`, but on an explicit [`ExecutionContext`].
    pub fn then_on(
        &self,
        ctx: Arc<dyn ExecutionContext>,
        on_success: Option<Box<dyn FnOnce(Value) -> Value + Send>>,
        on_failure: Option<Box<dyn FnOnce(PromiseError) -> Value + Send>>,
    ) -> Promise {
        let on_success = on_success.map(|h| -> Box<dyn FnOnce(Value) -> Value + Send> {
            Box::new(move |v| unwrap_facade_promise(h(v)))
        });
        let on_failure = on_failure.map(|h| -> Box<dyn FnOnce(PromiseError) -> Value + Send> {
            Box::new(move |e| unwrap_facade_promise(h(e)))
        });
        Promise::from_core(self.core.then_on(ctx, on_success, on_failure))
    }

    /// `catchOn`: a `then_on` whose success handler is the identity.
    pub fn catch_on(
        &self,
        ctx: Arc<dyn ExecutionContext>,
        on_failure: Box<dyn FnOnce(PromiseError) -> Value + Send>,
    ) -> Promise {
        self.then_on(ctx, Some(Box::new(|v| v)), Some(on_failure))
    }

    /// `catchOn` on the default context.
    pub fn catch(&self, on_failure: Box<dyn FnOnce(PromiseError) -> Value + Send>) -> Promise {
        self.catch_on(default_context(), on_failure)
    }

    /// Binds `self` and `other` so that `other`'s eventual state is
    /// adopted by `self`, and cancelling `self` forwards to `other`.
    /// Uses the default context for the adoption observer.
    pub fn bind(&self, other: &Promise) -> Result<(), BindError> {
        self.core.bind_on(default_context(), &other.core)
    }

    /// `bind`, but the adoption observer runs on an explicit context.
    pub fn bind_on(&self, ctx: Arc<dyn ExecutionContext>, other: &Promise) -> Result<(), BindError> {
        self.core.bind_on(ctx, &other.core)
    }

    /// Arms the library's default timer to reject `self` with a timeout
    /// error after `delay` unless it resolves first. Returns `self`.
    pub fn set_timeout(&self, delay: Duration) -> Promise {
        Promise::from_core(self.core.arm_timeout(default_timer(), delay))
    }

    /// `setTimeout`, but with an explicit [`Timer`].
    pub fn set_timeout_with(&self, timer: Arc<dyn Timer>, delay: Duration) -> Promise {
        Promise::from_core(self.core.arm_timeout(timer, delay))
    }
}

/// If `value` wraps a public [`Promise`] handle, rewrite it to wrap the
/// inner `rxpromise_core::Promise` instead.
///
/// A resolver (or a `then`/`then_on` handler) only ever has the public
/// [`Promise`] to chain through — `fulfill(Value::new(sub_promise))` is
/// the idiomatic way a caller asks the receiver to adopt `sub_promise`'s
/// eventual state. The core cell's bind-detection in `fulfill`/`resolve`
/// downcasts for `rxpromise_core::Promise` specifically (core has no
/// knowledge of this crate's facade type), so every resolver-facing entry
/// point here unwraps one layer first.
fn unwrap_facade_promise(value: Value) -> Value {
    match value.downcast_ref::<Promise>() {
        Some(p) => Value::new(p.core.clone()),
        None => value,
    }
}

/// `promiseWithResult(value)`: an immediately-settled promise — fulfilled
/// unless `value` is error-shaped (rejects) or is itself a `Promise`
/// (binds), per the `resolve()` dispatcher.
pub fn promise_with_result(value: Value) -> Promise {
    let p = Promise::new_pending();
    p.resolve(value);
    p
}

/// `promiseWithTask(block)`: runs `block` on the default execution
/// context and resolves the returned promise with its result via the
/// `resolve()` dispatcher.
pub fn promise_with_task<F>(block: F) -> Promise
where
    F: FnOnce() -> Value + Send + 'static,
{
    promise_with_queue(default_context(), block)
}

/// `promiseWithQueue(ctx, block)`: like `promise_with_task`, on an
/// explicit execution context.
pub fn promise_with_queue<F>(ctx: Arc<dyn ExecutionContext>, block: F) -> Promise
where
    F: FnOnce() -> Value + Send + 'static,
{
    let p = Promise::new_pending();
    let resolver = p.clone();
    ctx.schedule(Box::new(move || {
        let result = block();
        resolver.resolve(result);
    }));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_with_result_fulfills_non_error_values() {
        let p = promise_with_result(Value::new(5i32));
        assert_eq!(p.get().unwrap().downcast_ref::<i32>(), Some(&5));
    }

    #[test]
    fn promise_with_result_rejects_error_values() {
        let p = promise_with_result(Value::new(PromiseError::parameter_error()));
        assert!(p.is_rejected());
    }

    #[test]
    fn promise_with_task_runs_off_thread_and_resolves() {
        let p = promise_with_task(|| Value::new("done"));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"done"));
    }

    #[test]
    fn then_chain_runs_on_default_context() {
        let p = Promise::new_pending();
        let c = p.then(
            Some(Box::new(|v: Value| {
                let n = *v.downcast_ref::<i32>().unwrap();
                Value::new(n * 2)
            })),
            None,
        );
        p.fulfill(Value::new(21i32));
        assert_eq!(c.get().unwrap().downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn then_returning_a_promise_chains_through_it() {
        // Returning a public `Promise` from a `then` handler must be
        // treated as "adopt this promise's eventual state" (§4.1's
        // fulfill-with-a-promise-binds rule), not as an opaque payload.
        let inner = Promise::new_pending();
        let p = Promise::new_pending();
        let c = p.then(
            Some(Box::new({
                let inner = inner.clone();
                move |_v: Value| Value::new(inner)
            })),
            None,
        );
        p.fulfill(Value::new(()));
        inner.fulfill(Value::new(99i32));
        assert_eq!(c.get().unwrap().downcast_ref::<i32>(), Some(&99));
    }

    #[test]
    fn resolve_with_a_facade_promise_binds() {
        let inner = Promise::new_pending();
        let p = Promise::new_pending();
        p.resolve(Value::new(inner.clone()));
        inner.fulfill(Value::new("adopted"));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"adopted"));
    }

    #[test]
    fn bind_adopts_peer_result() {
        let p = Promise::new_pending();
        let q = Promise::new_pending();
        p.bind(&q).unwrap();
        q.fulfill(Value::new("peer"));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"peer"));
    }

    #[test]
    fn set_timeout_rejects_if_not_settled_first() {
        let p = Promise::new_pending();
        p.set_timeout(Duration::from_millis(30));
        let err = p.get_with_timeout(Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout));
    }

    #[test]
    fn timeout_race_first_writer_wins() {
        // Scenario 7: fulfill before the timeout fires wins.
        let p = Promise::new_pending();
        p.set_timeout(Duration::from_millis(100));
        p.fulfill(Value::new("X"));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"X"));
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"X"));
    }
}
