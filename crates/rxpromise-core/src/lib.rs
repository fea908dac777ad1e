//! The promise state machine, handler dispatcher, and cancellation graph.
//!
//! This crate has no opinion about *how* work gets scheduled — it only
//! needs an [`ExecutionContext`] capable of running a thunk — and no
//! opinion about the shape of a `setTimeout`-style timer beyond
//! [`Timer`]. The `rxpromise` facade crate supplies concrete,
//! tokio-backed implementations of both and layers ergonomic naming and
//! the composition combinators on top of [`Promise`].

mod cell;
mod context;
mod dispatch;
mod error;

pub use cell::Promise;
pub use context::{ExecutionContext, Timer};
pub use error::BindError;

pub use rxpromise_types::{ErrorKind, PromiseError, PromiseId, PromiseState, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Runs the thunk on a freshly spawned OS thread — enough to prove
    /// handlers never run inline on the registering thread, without
    /// pulling a scheduler dependency into this crate's own tests.
    struct ThreadContext;
    impl ExecutionContext for ThreadContext {
        fn schedule(&self, thunk: Box<dyn FnOnce() + Send + 'static>) {
            std::thread::spawn(thunk);
        }
    }

    fn ctx() -> Arc<dyn ExecutionContext> {
        Arc::new(ThreadContext)
    }

    #[test]
    fn fulfill_resolves_waiting_get() {
        let p = Promise::new_pending();
        let handle = p.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.fulfill(Value::new(42i32));
        });
        let v = p.get().unwrap();
        assert_eq!(v.downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn double_fulfill_is_ignored() {
        let p = Promise::new_pending();
        p.fulfill(Value::new(1i32));
        p.fulfill(Value::new(2i32));
        assert_eq!(p.get().unwrap().downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn chain_with_transformation() {
        // Scenario 1: P pending; then(x -> x+1) twice; fulfill with 1 -> 3.
        let p = Promise::new_pending();
        let c1 = p.then_on(
            ctx(),
            Some(Box::new(|v: Value| {
                let n = *v.downcast_ref::<i32>().unwrap();
                Value::new(n + 1)
            })),
            None,
        );
        let c2 = c1.then_on(
            ctx(),
            Some(Box::new(|v: Value| {
                let n = *v.downcast_ref::<i32>().unwrap();
                Value::new(n + 1)
            })),
            None,
        );
        p.fulfill(Value::new(1i32));
        assert_eq!(c2.get().unwrap().downcast_ref::<i32>(), Some(&3));
    }

    #[test]
    fn registering_after_resolution_still_fires() {
        let p = Promise::new_pending();
        p.fulfill(Value::new("done"));
        let c = p.then_on(
            ctx(),
            Some(Box::new(|v: Value| v)),
            None,
        );
        assert_eq!(c.get().unwrap().downcast_ref::<&str>(), Some(&"done"));
    }

    #[test]
    fn absent_handler_passes_through() {
        let p = Promise::new_pending();
        let c = p.then_on(ctx(), None, None);
        p.reject(Value::new("boom"));
        let err = c.get().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Generic(_)));
        assert_eq!(err.code(), Some(-1000));
    }

    #[test]
    fn cancellation_propagates_to_children_and_grandchildren() {
        // Scenario 5.
        let p = Promise::new_pending();
        let c = p.then_on(ctx(), Some(Box::new(|v| v)), Some(Box::new(|_e| Value::new("recovered"))));
        let g = c.then_on(ctx(), Some(Box::new(|v| v)), Some(Box::new(|_e| Value::new("recovered"))));
        p.cancel();
        // Propagation runs on a background thread; give it a beat.
        p.wait();
        c.wait();
        g.wait();
        assert!(p.is_cancelled());
        // c may have recovered via its on_failure handler if that ran
        // before the forced-cancel race reached it, or been force
        // cancelled; either way g must have been reached because
        // cancellation always continues downward regardless.
        assert!(c.state().is_settled());
        assert!(g.state().is_settled());
    }

    #[test]
    fn cancel_of_resolved_parent_still_propagates() {
        let p = Promise::new_pending();
        let c = p.then_on(ctx(), None, None);
        p.fulfill(Value::new(1i32));
        p.wait();
        p.cancel();
        // give the background propagation thread a moment
        std::thread::sleep(Duration::from_millis(50));
        assert!(p.is_fulfilled());
        assert!(c.is_cancelled());
    }

    #[test]
    fn bind_adopts_peer_state() {
        let p = Promise::new_pending();
        let q = Promise::new_pending();
        p.bind_on(ctx(), &q).unwrap();
        q.fulfill(Value::new(7i32));
        assert_eq!(p.get().unwrap().downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn bind_forwards_cancel_to_peer() {
        let p = Promise::new_pending();
        let q = Promise::new_pending();
        p.bind_on(ctx(), &q).unwrap();
        p.cancel();
        std::thread::sleep(Duration::from_millis(50));
        assert!(q.is_cancelled());
    }

    #[test]
    fn double_bind_is_refused() {
        let p = Promise::new_pending();
        let q1 = Promise::new_pending();
        let q2 = Promise::new_pending();
        p.bind_on(ctx(), &q1).unwrap();
        assert!(matches!(p.bind_on(ctx(), &q2), Err(BindError::AlreadyBound)));
    }

    #[test]
    fn resolve_with_promise_value_chains() {
        let p = Promise::new_pending();
        let inner = Promise::new_pending();
        inner.fulfill(Value::new("inner"));
        p.resolve(Value::new(inner));
        assert_eq!(p.get().unwrap().downcast_ref::<&str>(), Some(&"inner"));
    }

    #[test]
    fn get_with_timeout_does_not_mutate_state() {
        let p = Promise::new_pending();
        let err = p.get_with_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout));
        assert!(p.is_pending());
        p.fulfill(Value::new(1i32));
        assert_eq!(p.get().unwrap().downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn child_id_past_max_chain_depth_preserves_ancestor_root() {
        let root = Promise::new_pending();
        let expected_root = root.id().root();
        let mut current = root;
        for _ in 0..rxpromise_types::MAX_CHAIN_DEPTH {
            current = current.then_on(ctx(), None, None);
        }
        // `current` now sits exactly at MAX_CHAIN_DEPTH; one further
        // child must not mint an unrelated root id.
        let overflowed = current.then_on(ctx(), None, None);
        assert_eq!(overflowed.id().root(), expected_root);
        assert_eq!(overflowed.id(), current.id());
    }

    #[test_log::test]
    fn handler_panic_rejects_child_instead_of_aborting() {
        let p = Promise::new_pending();
        let c = p.then_on(
            ctx(),
            Some(Box::new(|_v: Value| -> Value { panic!("boom") })),
            None,
        );
        p.fulfill(Value::new(1i32));
        let err = c.get().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Generic(_)));
    }
}
