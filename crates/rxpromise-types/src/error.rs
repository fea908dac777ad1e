/// Errors that can arise while constructing or navigating a [`crate::PromiseId`] tree.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PromiseIdError {
    #[error("max chain depth of {max} exceeded")]
    MaxChainDepthExceeded { max: usize },
}
