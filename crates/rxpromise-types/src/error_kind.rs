use crate::value::Value;
use std::fmt;

/// Canonical category for a promise rejection.
///
/// Coarse-grained on purpose: it is what callers branch on to decide
/// whether a rejection is "their" application error, a cancellation, a
/// timeout, or misuse of a combinator's input contract.
#[derive(Clone)]
pub enum ErrorKind {
    /// A rejection reason that was not itself error-shaped and so was
    /// synthetically wrapped into this domain's generic error kind —
    /// spec.md §4.1's "wrap it in a synthetic error of kind
    /// `RXPromiseDomain` code `-1000`" rule. Always reports `code() ==
    /// Some(-1000)`.
    Generic(Value),
    /// An application-supplied rejection that was already error-shaped
    /// (constructed directly via [`PromiseError::user`]). Code is
    /// caller-defined, or absent.
    User(Value),
    /// The promise (or an ancestor) was cancelled. Carries the reason
    /// passed to `cancel`/`cancelWithReason`, or the default reason.
    Cancelled(Value),
    /// `getWithTimeout` or `setTimeout` fired before the promise resolved.
    Timeout,
    /// A combinator (`all`, `allSettled`, `any`, `sequence`) was given an
    /// empty or absent input sequence.
    ParameterError,
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(_) => write!(f, "Generic"),
            Self::User(_) => write!(f, "User"),
            Self::Cancelled(_) => write!(f, "Cancelled"),
            Self::Timeout => write!(f, "Timeout"),
            Self::ParameterError => write!(f, "ParameterError"),
        }
    }
}

/// Structured payload for a promise rejection.
///
/// Every synthesized error carries `domain() == "RXPromise"` and a numeric
/// `code()` for the two well-known synthetic kinds, matching the error
/// object contract external callers may already depend on: classify via
/// `kind`, render via `message`, enrich via optional `detail`.
#[derive(Clone, Debug)]
pub struct PromiseError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl PromiseError {
    /// Wrap an arbitrary non-error rejection reason as a generic
    /// synthetic error (domain `"RXPromise"`, code `-1000`).
    pub fn wrap_reason(reason: Value) -> Self {
        Self {
            kind: ErrorKind::Generic(reason),
            message: "rejected with non-error reason".to_string(),
            detail: None,
        }
    }

    /// An already error-shaped rejection (the handler/resolver supplied
    /// `Err(PromiseError)` directly rather than an opaque `Value`).
    pub fn user(message: impl Into<String>, reason: Value) -> Self {
        Self {
            kind: ErrorKind::User(reason),
            message: message.into(),
            detail: None,
        }
    }

    pub fn cancelled(reason: Value) -> Self {
        Self {
            kind: ErrorKind::Cancelled(reason),
            message: "cancelled".to_string(),
            detail: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: "timed out".to_string(),
            detail: None,
        }
    }

    pub fn parameter_error() -> Self {
        Self {
            kind: ErrorKind::ParameterError,
            message: "parameter error".to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Error domain of every synthesized `PromiseError`. Fixed, per the
    /// error object contract.
    pub fn domain(&self) -> &'static str {
        "RXPromise"
    }

    /// The synthetic kinds (`Generic`, `Cancelled`, `Timeout`) have a fixed
    /// numeric code per the error object contract (spec.md §6/§7); `None`
    /// for `User`/`ParameterError`, whose code is caller-defined (or
    /// absent).
    pub fn code(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::Timeout => Some(-1001),
            ErrorKind::Cancelled(_) | ErrorKind::Generic(_) => Some(-1000),
            ErrorKind::User(_) | ErrorKind::ParameterError => None,
        }
    }

    /// Whether this rejection originated from a cancellation (directly or
    /// via propagation). `Cancelled ⊂ Rejected`, so every query asking
    /// "is this rejected?" must answer yes for these too — callers should
    /// check `is_cancelled` before treating a rejection as an ordinary
    /// application failure if that distinction matters to them.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled(_))
    }
}

impl fmt::Display for PromiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}: {}", self.domain(), self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for PromiseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_has_domain_and_code() {
        let e = PromiseError::timeout();
        assert_eq!(e.domain(), "RXPromise");
        assert_eq!(e.code(), Some(-1001));
    }

    #[test]
    fn cancelled_has_domain_and_code() {
        let e = PromiseError::cancelled(Value::new("stop"));
        assert_eq!(e.code(), Some(-1000));
        assert!(e.is_cancelled());
    }

    #[test]
    fn wrapped_non_error_reason_has_generic_code() {
        let e = PromiseError::wrap_reason(Value::new(42i32));
        assert_eq!(e.domain(), "RXPromise");
        assert_eq!(e.code(), Some(-1000));
        assert!(matches!(e.kind, ErrorKind::Generic(_)));
    }

    #[test]
    fn parameter_error_has_no_numeric_code() {
        let e = PromiseError::parameter_error();
        assert_eq!(e.code(), None);
        assert_eq!(e.message, "parameter error");
    }

    #[test]
    fn display_includes_detail_when_present() {
        let e = PromiseError::timeout().with_detail("after 5s");
        let rendered = format!("{e}");
        assert!(rendered.contains("after 5s"));
    }
}
