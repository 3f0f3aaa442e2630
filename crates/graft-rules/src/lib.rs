//! Standard scalar coercion rules.
//!
//! The conversions most hosts want out of the box: parsing from
//! `String`, rendering back to `String`, and movement between the
//! scalar types, with `i64` as the integer hub. Narrowing integer
//! conversions are checked and fail on overflow rather than wrapping.
//!
//! Some pairs are deliberately left without a direct rule (`bool` to
//! `f64`, `String` to `i32`): they resolve as compound paths through
//! the hub, so the shipped catalog exercises the engine's search.

use graft_core::{ApplyError, Catalog, CoercionRule, TypeModel};

/// The standard rule set, in contribution order.
pub fn standard_rules() -> Vec<CoercionRule> {
    vec![
        CoercionRule::infallible(|s: &&'static str| s.to_string()),
        // From String: parsing. Numeric input is trimmed first.
        CoercionRule::new(|s: &String| s.trim().parse::<i64>().map_err(ApplyError::other)),
        CoercionRule::new(|s: &String| s.trim().parse::<u64>().map_err(ApplyError::other)),
        CoercionRule::new(|s: &String| s.trim().parse::<f64>().map_err(ApplyError::other)),
        CoercionRule::new(|s: &String| match s.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ApplyError::failed(format!(
                "expected \"true\" or \"false\", got {other:?}"
            ))),
        }),
        CoercionRule::new(|s: &String| {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(ApplyError::failed(format!(
                    "expected a single character, got {s:?}"
                ))),
            }
        }),
        // From i64, the integer hub.
        CoercionRule::infallible(|v: &i64| *v as f64),
        CoercionRule::infallible(|v: &i64| *v != 0),
        CoercionRule::infallible(|v: &i64| v.to_string()),
        CoercionRule::new(|v: &i64| i32::try_from(*v).map_err(ApplyError::other)),
        CoercionRule::new(|v: &i64| u32::try_from(*v).map_err(ApplyError::other)),
        CoercionRule::new(|v: &i64| u64::try_from(*v).map_err(ApplyError::other)),
        // Remaining scalars route through the hub or render directly.
        CoercionRule::new(|v: &u64| i64::try_from(*v).map_err(ApplyError::other)),
        CoercionRule::infallible(|v: &i32| *v as i64),
        CoercionRule::infallible(|v: &u32| *v as i64),
        CoercionRule::infallible(|v: &f64| v.trunc() as i64),
        CoercionRule::infallible(|v: &f64| v.to_string()),
        CoercionRule::infallible(|v: &bool| *v as i64),
        CoercionRule::infallible(|v: &bool| v.to_string()),
        CoercionRule::infallible(|c: &char| c.to_string()),
    ]
}

/// The type model the standard rules assume. Scalars have no hierarchy
/// or normalization aliases, so this is empty; hosts extend it before
/// building the catalog.
pub fn standard_model() -> TypeModel {
    TypeModel::new()
}

/// A ready-to-freeze catalog of the standard rules.
pub fn standard_catalog() -> Catalog {
    let mut catalog = Catalog::new(standard_model());
    catalog.add_all(standard_rules());
    catalog
}
