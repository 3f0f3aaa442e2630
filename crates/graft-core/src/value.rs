//! Dynamic values: what the engine converts between.
//!
//! Coercion works on values whose concrete type is only known at
//! runtime, so everything flows through `Box<dyn AnyValue>`. The
//! `Debug` bound exists so a failed conversion can report the
//! offending input.

use std::any::Any;
use std::fmt;

use crate::types::TypeKey;

/// Object-safe view of any coercible value.
///
/// Blanket-implemented for every `Any + Debug + Send + Sync` type;
/// callers never implement this by hand.
pub trait AnyValue: Any + fmt::Debug + Send + Sync {
    /// Borrow as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Consume as `Any` for owned downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// The key of the value's concrete runtime type.
    fn value_type(&self) -> TypeKey;
}

impl<T: Any + fmt::Debug + Send + Sync> AnyValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn value_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// A boxed dynamic value.
pub type DynValue = Box<dyn AnyValue>;

/// The "no value" sentinel.
///
/// Coercing from absence is a distinct case from coercing a typed
/// value: only rules registered with `Null` as their source apply, and
/// an unmapped target resolves to `Null` again rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

/// Check whether a value is the `Null` sentinel.
pub fn is_null(value: &dyn AnyValue) -> bool {
    value.as_any().is::<Null>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_is_concrete() {
        let v: DynValue = Box::new(42i64);
        assert_eq!(v.value_type(), TypeKey::of::<i64>());
        assert_ne!(v.value_type(), TypeKey::of::<i32>());
    }

    #[test]
    fn test_downcast_roundtrip() {
        let v: DynValue = Box::new("hello".to_string());
        let s = v.into_any().downcast::<String>().unwrap();
        assert_eq!(*s, "hello");
    }

    #[test]
    fn test_null_sentinel() {
        let v: DynValue = Box::new(Null);
        assert!(is_null(v.as_ref()));

        let v: DynValue = Box::new(0i64);
        assert!(!is_null(v.as_ref()));
    }
}
