//! Engine-level errors.

use crate::rule::ApplyError;
use crate::types::TypeKey;

/// Errors surfaced by [`crate::TypeCoercer`].
///
/// All of these are non-retryable: a coercion is a pure function of the
/// type pair plus the value, so repeating a failed call with the same
/// inputs cannot succeed.
#[derive(Debug, thiserror::Error)]
pub enum CoerceError {
    /// No path, direct or compound, exists from source to target. This
    /// signals a missing catalog contribution, so the message carries
    /// the full catalog for the developer to locate the gap.
    #[error("could not find a coercion from {source} to {target}; available coercions:\n{available}")]
    NoRule {
        source: TypeKey,
        target: TypeKey,
        available: String,
    },

    /// A matched conversion function failed on a concrete value.
    #[error("coercion of {value} to {target} (via {path}) failed: {cause}")]
    ApplyFailed {
        /// The offending input, stringified.
        value: String,
        target: TypeKey,
        /// The path description that was being applied.
        path: String,
        #[source]
        cause: ApplyError,
    },

    /// The dynamic result did not downcast to the statically requested
    /// type. Happens only when the type model normalizes the requested
    /// type to a different canonical type.
    #[error("coercion to {requested} produced a {produced} value; check the type model's normalization aliases")]
    TargetMismatch {
        requested: TypeKey,
        produced: TypeKey,
    },
}
