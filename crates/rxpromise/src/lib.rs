//! Public facade: `Promise`, the default execution contexts, the timer,
//! and the composition combinators (`all`, `all_settled`, `any`,
//! `sequence`, `repeat`).
//!
//! `rxpromise-core` owns the state machine, handler dispatcher, and
//! cancellation graph; this crate supplies the tokio-backed default
//! scheduling and an ergonomic, Rust-named public surface on top of it.

mod combinators;
mod context;
mod promise;

pub use combinators::{all, all_settled, any, repeat, sequence, SettledResult};
pub use context::{default_context, default_timer, Concurrent, Serial, TokioTimer};
pub use promise::{promise_with_queue, promise_with_result, promise_with_task, Promise};

pub use rxpromise_core::{BindError, ExecutionContext, PromiseId, PromiseState, Timer};
pub use rxpromise_types::{ErrorKind, PromiseError, Value};
