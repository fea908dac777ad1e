use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An opaque, dynamically-typed result or rejection reason.
///
/// The library is value-polymorphic: a promise may fulfill with any
/// `Send + Sync + 'static` type, and combinators like [`all`](../rxpromise/fn.all.html)
/// compose promises of heterogeneous payload types. `Value` is the common
/// currency that makes that possible, pairing the opaque payload with a
/// type tag — here the "codec" is simply the Rust type name, kept for
/// `Debug` output.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap any cloneable, thread-safe value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The sentinel used by `all`/`allSettled` in place of an absent
    /// per-item value.
    pub fn null() -> Self {
        Self::new(())
    }

    /// Whether this value is the `null` sentinel.
    pub fn is_null(&self) -> bool {
        self.inner.downcast_ref::<()>().is_some()
    }

    /// Attempt to recover the original typed value.
    ///
    /// Returns `None` if `T` does not match the type the value was
    /// constructed with.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The Rust type name this value was constructed with, for
    /// diagnostics only (not part of any equality or matching contract).
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("type", &self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_downcast() {
        let v = Value::new(42i32);
        assert_eq!(v.downcast_ref::<i32>(), Some(&42));
        assert_eq!(v.downcast_ref::<String>(), None);
    }

    #[test]
    fn null_sentinel_is_recognizable() {
        let v = Value::null();
        assert!(v.is_null());
        assert!(!Value::new(0i32).is_null());
    }

    #[test]
    fn clone_is_cheap_and_shares_payload() {
        let v = Value::new(String::from("hello"));
        let cloned = v.clone();
        assert_eq!(cloned.downcast_ref::<String>(), Some(&"hello".to_string()));
    }
}
