pub mod error;
pub mod error_kind;
pub mod promise_id;
pub mod state;
pub mod value;

pub use error::PromiseIdError;
pub use error_kind::{ErrorKind, PromiseError};
pub use promise_id::{MAX_CHAIN_DEPTH, PromiseId};
pub use state::PromiseState;
pub use value::Value;
