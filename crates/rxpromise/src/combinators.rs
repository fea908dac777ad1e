use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rxpromise_types::{ErrorKind, PromiseError, Value};

use crate::context::default_context;
use crate::promise::Promise;

/// One input's outcome, as produced by [`all_settled`].
#[derive(Clone, Debug)]
pub struct SettledResult {
    pub is_fulfilled: bool,
    pub is_rejected: bool,
    /// The fulfilled value, or the rejection wrapped as a `PromiseError`.
    pub result: Value,
}

/// `all(promises)`: fulfills with the ordered results once every input
/// fulfills; rejects with the first rejection. Other inputs are left
/// running, not auto-cancelled — see DESIGN.md for why the non-cancelling
/// reading was chosen. Empty input rejects with a parameter error.
pub fn all(promises: Vec<Promise>) -> Promise {
    let r = Promise::new_pending();
    if promises.is_empty() {
        tracing::trace!("all() called with an empty input, rejecting with parameter error");
        r.reject(Value::new(PromiseError::parameter_error()));
        return r;
    }

    let n = promises.len();
    let results: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(vec![Value::null(); n]));
    let remaining = Arc::new(AtomicUsize::new(n));
    let rejected = Arc::new(AtomicBool::new(false));

    for (i, p) in promises.into_iter().enumerate() {
        let results = Arc::clone(&results);
        let remaining = Arc::clone(&remaining);
        let rejected = Arc::clone(&rejected);
        let r_success = r.clone();
        let r_failure = r.clone();
        let _ = p.then_on(
            default_context(),
            Some(Box::new(move |v: Value| {
                results.lock().unwrap()[i] = v;
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 && !rejected.load(Ordering::Acquire) {
                    let collected = results.lock().unwrap().clone();
                    r_success.fulfill(Value::new(collected));
                }
                Value::null()
            })),
            Some(Box::new(move |e: PromiseError| {
                if !rejected.swap(true, Ordering::AcqRel) {
                    r_failure.reject(Value::new(e));
                }
                Value::null()
            })),
        );
    }
    r
}

/// `allSettled(promises)`: fulfills with one [`SettledResult`] per input,
/// in order, once every input has settled — never rejects on an input's
/// account. Empty input rejects with a parameter error.
pub fn all_settled(promises: Vec<Promise>) -> Promise {
    let r = Promise::new_pending();
    if promises.is_empty() {
        tracing::trace!("all_settled() called with an empty input, rejecting with parameter error");
        r.reject(Value::new(PromiseError::parameter_error()));
        return r;
    }

    let n = promises.len();
    let placeholder = SettledResult {
        is_fulfilled: false,
        is_rejected: false,
        result: Value::null(),
    };
    let results: Arc<Mutex<Vec<SettledResult>>> =
        Arc::new(Mutex::new(vec![placeholder; n]));
    let remaining = Arc::new(AtomicUsize::new(n));

    for (i, p) in promises.into_iter().enumerate() {
        let results = Arc::clone(&results);
        let remaining = Arc::clone(&remaining);
        let r_success = r.clone();
        let r_failure = r.clone();
        let _ = p.then_on(
            default_context(),
            Some(Box::new(move |v: Value| {
                results.lock().unwrap()[i] = SettledResult {
                    is_fulfilled: true,
                    is_rejected: false,
                    result: v,
                };
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let collected = results.lock().unwrap().clone();
                    r_success.fulfill(Value::new(collected));
                }
                Value::null()
            })),
            Some(Box::new(move |e: PromiseError| {
                results.lock().unwrap()[i] = SettledResult {
                    is_fulfilled: false,
                    is_rejected: true,
                    result: Value::new(e),
                };
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let collected = results.lock().unwrap().clone();
                    r_failure.fulfill(Value::new(collected));
                }
                Value::null()
            })),
        );
    }
    r
}

/// `any(promises)`: fulfills with the first input to fulfill; rejects
/// only once every input has rejected. Empty input rejects with a
/// parameter error.
pub fn any(promises: Vec<Promise>) -> Promise {
    let r = Promise::new_pending();
    if promises.is_empty() {
        tracing::trace!("any() called with an empty input, rejecting with parameter error");
        r.reject(Value::new(PromiseError::parameter_error()));
        return r;
    }

    let n = promises.len();
    let remaining = Arc::new(AtomicUsize::new(n));
    let settled_first = Arc::new(AtomicBool::new(false));
    let last_error: Arc<Mutex<Option<PromiseError>>> = Arc::new(Mutex::new(None));

    for p in promises {
        let remaining = Arc::clone(&remaining);
        let settled_first = Arc::clone(&settled_first);
        let last_error = Arc::clone(&last_error);
        let r_success = r.clone();
        let r_failure = r.clone();
        let _ = p.then_on(
            default_context(),
            Some(Box::new(move |v: Value| {
                if !settled_first.swap(true, Ordering::AcqRel) {
                    r_success.fulfill(v);
                }
                Value::null()
            })),
            Some(Box::new(move |e: PromiseError| {
                *last_error.lock().unwrap() = Some(e);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1
                    && !settled_first.load(Ordering::Acquire)
                {
                    let e = last_error.lock().unwrap().take().expect("last rejection recorded");
                    r_failure.reject(Value::new(e));
                }
                Value::null()
            })),
        );
    }
    r
}

/// `sequence(inputs, task)`: runs `task(input_i)` only after
/// `task(input_{i-1})` fulfills, discarding each task's result; stops
/// and rejects on the first task rejection; fulfills with `"OK"` once
/// every input has been processed. Cancelling the returned promise
/// forwards the cancel to whichever task promise is currently running
///.
pub fn sequence<F>(inputs: Vec<Value>, task: F) -> Promise
where
    F: Fn(Value) -> Promise + Send + Sync + 'static,
{
    let r = Promise::new_pending();
    let task = Arc::new(task);
    let current: Arc<Mutex<Option<Promise>>> = Arc::new(Mutex::new(None));

    forward_cancel_to_current(&r, &current);
    sequence_step(inputs.into_iter().collect(), task, r.clone(), current);
    r
}

fn sequence_step(
    mut inputs: std::collections::VecDeque<Value>,
    task: Arc<dyn Fn(Value) -> Promise + Send + Sync>,
    r: Promise,
    current: Arc<Mutex<Option<Promise>>>,
) {
    match inputs.pop_front() {
        None => r.fulfill(Value::new("OK")),
        Some(input) => {
            let running = task(input);
            *current.lock().unwrap() = Some(running.clone());
            let r_success = r.clone();
            let task_next = Arc::clone(&task);
            let current_next = Arc::clone(&current);
            let _ = running.then_on(
                default_context(),
                Some(Box::new(move |_v: Value| {
                    sequence_step(inputs, task_next, r_success, current_next);
                    Value::null()
                })),
                Some(Box::new(move |e: PromiseError| {
                    tracing::trace!(error = %e, "sequence() stopping after task rejection");
                    r.reject(Value::new(e));
                    Value::null()
                })),
            );
        }
    }
}

/// `repeat(block)`: calls `block()` repeatedly, awaiting each returned
/// promise's fulfillment before calling it again; stops and fulfills
/// with `"OK"` once `block()` returns `None`; stops and rejects on any
/// rejection. Cancelling the returned promise forwards the cancel to the
/// currently-running iteration.
pub fn repeat<F>(block: F) -> Promise
where
    F: FnMut() -> Option<Promise> + Send + 'static,
{
    let r = Promise::new_pending();
    let current: Arc<Mutex<Option<Promise>>> = Arc::new(Mutex::new(None));

    forward_cancel_to_current(&r, &current);
    repeat_step(Box::new(block), r.clone(), current);
    r
}

fn repeat_step(
    mut block: Box<dyn FnMut() -> Option<Promise> + Send>,
    r: Promise,
    current: Arc<Mutex<Option<Promise>>>,
) {
    match block() {
        None => r.fulfill(Value::new("OK")),
        Some(running) => {
            *current.lock().unwrap() = Some(running.clone());
            let r_success = r.clone();
            let current_next = Arc::clone(&current);
            let _ = running.then_on(
                default_context(),
                Some(Box::new(move |_v: Value| {
                    repeat_step(block, r_success, current_next);
                    Value::null()
                })),
                Some(Box::new(move |e: PromiseError| {
                    r.reject(Value::new(e));
                    Value::null()
                })),
            );
        }
    }
}

/// Wires `r`'s own cancellation (observed through its `then_on`'s
/// failure slot, since `Cancelled ⊂ Rejected`) to forward onto the
/// *root* of whatever promise `current` holds at the time. This is how
/// `sequence`/`repeat` honor "cancel of R forwards to the currently-running
/// task's root promise" without the combinator's result promise being a
/// parent of the per-step task promises in the cancellation graph.
fn forward_cancel_to_current(r: &Promise, current: &Arc<Mutex<Option<Promise>>>) {
    let current = Arc::clone(current);
    let _ = r.then_on(
        default_context(),
        None,
        Some(Box::new(move |e: PromiseError| {
            if let ErrorKind::Cancelled(reason) = e.kind.clone() {
                if let Some(running) = current.lock().unwrap().clone() {
                    running.root().cancel_with_reason(reason);
                }
            }
            Value::new(e)
        })),
    );
}
