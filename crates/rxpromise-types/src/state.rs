use std::fmt;

/// The four states a promise can occupy.
///
/// `Cancelled` is a refinement of `Rejected` — [`Settled::is_rejected`]
/// answers `true` for both, matching the bit-pattern relationship
/// (`Cancelled` as "Rejected with the cancel flag set") the original
/// implementation encodes directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl PromiseState {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_fulfilled(self) -> bool {
        matches!(self, Self::Fulfilled)
    }

    /// True for `Rejected` *and* `Cancelled` — see the type's doc comment.
    pub fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }

    pub fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Settled == no longer Pending.
    pub fn is_settled(self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Fulfilled => write!(f, "Fulfilled"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_a_rejected_refinement() {
        assert!(PromiseState::Cancelled.is_rejected());
        assert!(PromiseState::Rejected.is_rejected());
        assert!(!PromiseState::Fulfilled.is_rejected());
    }

    #[test]
    fn only_pending_is_unsettled() {
        assert!(!PromiseState::Pending.is_settled());
        assert!(PromiseState::Fulfilled.is_settled());
        assert!(PromiseState::Rejected.is_settled());
        assert!(PromiseState::Cancelled.is_settled());
    }
}
