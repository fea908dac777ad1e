use thiserror::Error;

/// Errors from the cancellation-graph/binding operations that the state
/// machine itself can detect and refuse, rather than leaving undefined.
#[derive(Debug, Error)]
pub enum BindError {
    /// A promise may be bound to at most one peer. The source
    /// calls a second `bind` a programming error with "undefined" behavior;
    /// here it is simply refused.
    #[error("promise is already bound to a peer")]
    AlreadyBound,
}
