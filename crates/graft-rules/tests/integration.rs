//! End-to-end coercion scenarios over a host-extended standard catalog.

use graft_core::{
    Catalog, CoerceError, CoercionRule, Enumerated, Null, TypeCoercer, TypeKey, TypeModel,
};
use graft_rules::{standard_model, standard_rules};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Color {
    Red,
    Green,
}

impl Enumerated for Color {
    fn variant_names() -> &'static [&'static str] {
        &["RED", "GREEN"]
    }

    fn from_variant_name(name: &str) -> Option<Self> {
        match name {
            "RED" => Some(Color::Red),
            "GREEN" => Some(Color::Green),
            _ => None,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Color::Red => "RED",
            Color::Green => "GREEN",
        }
    }
}

/// An order id rendered as its numeric text.
#[derive(Debug, Clone)]
struct OrderId(u32);

fn host_coercer() -> TypeCoercer {
    let mut model = standard_model();
    model.register_enum::<Color>();

    let mut catalog = Catalog::new(model);
    catalog.add_all(standard_rules());
    catalog.add(CoercionRule::infallible(|id: &OrderId| id.0.to_string()));
    TypeCoercer::new(catalog)
}

#[test]
fn test_enum_from_string_without_explicit_rule() {
    let coercer = host_coercer();

    let color = coercer
        .coerce::<Color>(Box::new("RED".to_string()))
        .unwrap();
    assert_eq!(color, Some(Color::Red));
}

#[test]
fn test_enum_to_string_without_explicit_rule() {
    let coercer = host_coercer();

    let name = coercer.coerce::<String>(Box::new(Color::Red)).unwrap();
    assert_eq!(name, Some("RED".to_string()));
}

#[test]
fn test_enum_parse_rejects_unknown_name() {
    let coercer = host_coercer();

    let err = coercer
        .coerce::<Color>(Box::new("BLUE".to_string()))
        .expect_err("no such constant");
    let msg = err.to_string();
    assert!(msg.contains("\"BLUE\""), "message was: {msg}");
    assert!(msg.contains("Color"), "message was: {msg}");
}

#[test]
fn test_enum_reachable_through_compound_path() {
    // No i64 rule mentions Color, but i64 --> String plus the
    // synthesized String --> Color compose. (Only "RED"/"GREEN" parse,
    // so drive it through a custom source instead of a number.)
    let coercer = host_coercer();

    let path = coercer
        .explain(TypeKey::of::<i64>(), TypeKey::of::<Color>())
        .unwrap();
    assert_eq!(path, "i64 --> String, String --> Color");
}

#[test]
fn test_custom_source_chains_through_standard_rules() {
    let coercer = host_coercer();

    let n = coercer.coerce::<i64>(Box::new(OrderId(42))).unwrap();
    assert_eq!(n, Some(42));
    assert_eq!(
        coercer
            .explain(TypeKey::of::<OrderId>(), TypeKey::of::<i64>())
            .unwrap(),
        "OrderId --> String, String --> i64"
    );
}

#[test]
fn test_null_passthrough_with_full_catalog() {
    let coercer = host_coercer();

    assert_eq!(coercer.coerce::<String>(Box::new(Null)).unwrap(), None);
    assert_eq!(coercer.coerce::<Color>(Box::new(Null)).unwrap(), None);
}

#[test]
fn test_unknown_coercion_names_both_types() {
    let coercer = host_coercer();

    let err = coercer
        .coerce::<Vec<String>>(Box::new("abc".to_string()))
        .expect_err("no rule produces Vec<String>");
    match err {
        CoerceError::NoRule { source, target, .. } => {
            assert_eq!(source, TypeKey::of::<String>());
            assert_eq!(target, TypeKey::of::<Vec<String>>());
        }
        other => panic!("expected NoRule, got: {other}"),
    }
}

#[test]
fn test_explain_matches_coerce_after_cache_clear() {
    let coercer = host_coercer();

    let before = coercer
        .explain(TypeKey::of::<bool>(), TypeKey::of::<f64>())
        .unwrap();
    coercer.clear_cache();
    let after = coercer
        .explain(TypeKey::of::<bool>(), TypeKey::of::<f64>())
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(coercer.coerce::<f64>(Box::new(true)).unwrap(), Some(1.0));
}

#[test]
fn test_failed_parse_reports_path_and_cause() {
    let coercer = host_coercer();

    let err = coercer
        .coerce::<i32>(Box::new("not a number".to_string()))
        .expect_err("unparseable");
    match &err {
        CoerceError::ApplyFailed { value, path, .. } => {
            assert!(value.contains("not a number"));
            assert_eq!(path, "String --> i64, i64 --> i32");
        }
        other => panic!("expected ApplyFailed, got: {other}"),
    }
    // A rule-level failure never poisons the pair.
    assert_eq!(
        coercer.coerce::<i32>(Box::new("7".to_string())).unwrap(),
        Some(7)
    );
}

#[test]
fn test_extension_rule_wins_over_compound() {
    // A host contributing a direct bool --> f64 rule overrides the
    // compound path through i64.
    let mut model = TypeModel::new();
    model.register_enum::<Color>();
    let mut catalog = Catalog::new(model);
    catalog.add_all(standard_rules());
    catalog.add(CoercionRule::infallible(|b: &bool| {
        if *b { 1.0f64 } else { 0.0 }
    }));
    let coercer = TypeCoercer::new(catalog);

    assert_eq!(
        coercer
            .explain(TypeKey::of::<bool>(), TypeKey::of::<f64>())
            .unwrap(),
        "bool --> f64"
    );
}
