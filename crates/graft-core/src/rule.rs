//! Atomic coercion rules: the tuples the catalog is built from.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::types::TypeKey;
use crate::value::{AnyValue, DynValue};

/// Erased conversion function. Borrows its input so a failure can still
/// report the original value.
pub(crate) type ApplyFn =
    Arc<dyn Fn(&dyn AnyValue) -> Result<DynValue, ApplyError> + Send + Sync>;

/// Chain two conversions head-to-tail.
pub(crate) fn compose(first: ApplyFn, second: ApplyFn) -> ApplyFn {
    Arc::new(move |value| {
        let mid = first(value)?;
        second(mid.as_ref())
    })
}

/// Errors raised by an individual conversion function.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("{0}")]
    Failed(String),

    #[error("expected {expected} input, got {got}")]
    InputMismatch { expected: TypeKey, got: TypeKey },

    #[error("no constant named {value:?} in {enum_type} (expected one of: {})", .expected.join(", "))]
    NoSuchVariant {
        value: String,
        enum_type: TypeKey,
        expected: &'static [&'static str],
    },

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ApplyError {
    /// A failure with a plain message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// A failure wrapping an underlying error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// An atomic conversion rule: source type, target type, and the
/// function between them.
///
/// Rules are contributed to a [`crate::Catalog`] before the engine is
/// built and never change afterward. Identity for search bookkeeping is
/// the `(source, target)` pair.
pub struct CoercionRule {
    source: TypeKey,
    target: TypeKey,
    description: String,
    apply: ApplyFn,
}

impl CoercionRule {
    /// A rule from a fallible conversion function.
    pub fn new<S, T, F>(convert: F) -> Self
    where
        S: Any + fmt::Debug + Send + Sync,
        T: Any + fmt::Debug + Send + Sync,
        F: Fn(&S) -> Result<T, ApplyError> + Send + Sync + 'static,
    {
        let expected = TypeKey::of::<S>();
        let apply: ApplyFn = Arc::new(move |value| {
            let s = value
                .as_any()
                .downcast_ref::<S>()
                .ok_or(ApplyError::InputMismatch {
                    expected,
                    got: value.value_type(),
                })?;
            Ok(Box::new(convert(s)?) as DynValue)
        });
        Self::from_parts(TypeKey::of::<S>(), TypeKey::of::<T>(), apply)
    }

    /// A rule from a conversion that cannot fail.
    pub fn infallible<S, T, F>(convert: F) -> Self
    where
        S: Any + fmt::Debug + Send + Sync,
        T: Any + fmt::Debug + Send + Sync,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self::new(move |s: &S| Ok(convert(s)))
    }

    pub(crate) fn from_parts(source: TypeKey, target: TypeKey, apply: ApplyFn) -> Self {
        let description = format!("{} --> {}", source, target);
        Self {
            source,
            target,
            description,
            apply,
        }
    }

    pub fn source(&self) -> TypeKey {
        self.source
    }

    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// The `(source, target)` identity used by the search to avoid
    /// reconsidering a rule.
    pub fn key(&self) -> (TypeId, TypeId) {
        (self.source.id(), self.target.id())
    }

    /// Human-readable form, e.g. `"String --> i64"`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Apply the conversion to a value.
    pub fn apply(&self, value: &dyn AnyValue) -> Result<DynValue, ApplyError> {
        (self.apply)(value)
    }

    pub(crate) fn apply_fn(&self) -> ApplyFn {
        self.apply.clone()
    }
}

impl fmt::Display for CoercionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl fmt::Debug for CoercionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercionRule")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}
