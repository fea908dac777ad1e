use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rxpromise_types::{ErrorKind, PromiseError, Value};

use crate::cell::{Cell, Promise};
use crate::context::ExecutionContext;

/// One registered `{context, on_success?, on_failure?, child?}` triple,
/// collapsed to a single settle callback — see
/// `Promise::register_handler`.
pub(crate) struct HandlerEntry {
    pub(crate) ctx: Arc<dyn ExecutionContext>,
    pub(crate) on_settle: Option<Box<dyn FnOnce(Result<Value, PromiseError>) + Send>>,
}

/// Schedules one handler entry's settle callback on its context, marking
/// the owning cell's handler-done counter afterward so `wait()` can
/// observe completion.
pub(crate) fn dispatch_entry(
    cell: Arc<Cell>,
    entry: HandlerEntry,
    settled: Result<Value, PromiseError>,
) {
    let HandlerEntry { ctx, on_settle } = entry;
    ctx.schedule(Box::new(move || {
        if let Some(on_settle) = on_settle {
            on_settle(settled);
        }
        mark_handler_done(&cell);
    }));
}

fn mark_handler_done(cell: &Arc<Cell>) {
    {
        let mut inner = cell.inner.lock().unwrap();
        inner.handlers_done += 1;
    }
    cell.condvar.notify_all();
}

/// Builds the settle callback for a `then_on`-created child: selects
/// `on_success`/`on_failure` by the parent's settled variant, passes
/// through when the relevant handler is absent, and resolves the child
/// by the `resolve()` dispatcher so a returned promise chains, a
/// returned error rejects, anything else fulfills.
///
/// Handler panics are caught and turned into a rejection of the child
/// carrying an `ErrorKind::Generic` reason (see DESIGN.md — the Rust
/// resolution of the source's "handler throwing" open question).
pub(crate) fn make_then_observer(
    child: Promise,
    on_success: Option<Box<dyn FnOnce(Value) -> Value + Send>>,
    on_failure: Option<Box<dyn FnOnce(PromiseError) -> Value + Send>>,
) -> Box<dyn FnOnce(Result<Value, PromiseError>) + Send> {
    Box::new(move |settled| match settled {
        Ok(value) => match on_success {
            Some(handler) => match invoke_catching(AssertUnwindSafe(move || handler(value))) {
                Ok(result) => child.resolve(result),
                Err(err) => child.reject_error(err),
            },
            None => child.fulfill(value),
        },
        Err(error) => match on_failure {
            Some(handler) => match invoke_catching(AssertUnwindSafe(move || handler(error))) {
                Ok(result) => child.resolve(result),
                Err(err) => child.reject_error(err),
            },
            None => child.reject_error(error),
        },
    })
}

fn invoke_catching(handler: AssertUnwindSafe<impl FnOnce() -> Value>) -> Result<Value, PromiseError> {
    match panic::catch_unwind(handler) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(%message, "handler panicked; rejecting child instead of unwinding further");
            Err(PromiseError {
                kind: ErrorKind::Generic(Value::new(message.clone())),
                message: "handler panicked".to_string(),
                detail: Some(message),
            })
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + 'static)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

